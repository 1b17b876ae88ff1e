//! WebAssembly bridge for `multistrain_core`.
//!
//! Configuration and calibration data come in as plain JS objects, results
//! go back out the same way. Nothing here changes the numerics.

pub mod simulation;

pub use simulation::{run_multistrain, WasmSimulationRunner};
