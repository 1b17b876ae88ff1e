pub mod adaptive;
pub mod climate;
pub mod config;
pub mod error;
pub mod lorenz;
pub mod model;
pub mod noise;
pub mod observation;
pub mod simulation;
pub mod solvers;
pub mod transmission;
/// The `multistrain_core` crate simulates a multi-strain epidemic whose
/// transmission is driven by an external weather signal.
///
/// Key components:
/// - **Traits**: `Scalar`, `DynamicalSystem` (vector fields), `Steppable` (solvers).
/// - **Lorenz / Climate**: a chaotic weather generator and the normalizer that
///   maps it into transmission multipliers using injected historical extrema.
/// - **Weather**: periodic or chaotic forcing behind one `WeatherForcing` interface.
/// - **Model**: the log-space Euler–Maruyama step with cross-immunity and
///   correlated process noise.
/// - **Adaptive**: step-doubling error control for deterministic runs.
/// - **Simulation**: the stepped driver producing the output series.
pub mod traits;
pub mod weather;

pub use climate::{ChannelExtrema, ClimateExtrema};
pub use config::{ChaoticForcingConfig, SimulationConfig};
pub use error::{ConfigViolation, Result, SimulationError};
pub use simulation::{simulate, SimulationOutput, SimulationProgress, SimulationRunner};
