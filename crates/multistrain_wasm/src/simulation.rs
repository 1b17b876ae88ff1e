//! One-shot and stepped simulation runners.

use anyhow::{Context, Result};
use js_sys::Float64Array;
use multistrain_core::climate::ClimateExtrema;
use multistrain_core::config::SimulationConfig;
use multistrain_core::simulation::{SimulationOutput, SimulationRunner};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub(crate) fn build_runner(
    config: &SimulationConfig,
    extrema: Option<&ClimateExtrema>,
) -> Result<SimulationRunner> {
    SimulationRunner::new(config, extrema).context("Simulation init failed")
}

pub(crate) fn run_to_completion(
    config: &SimulationConfig,
    extrema: Option<&ClimateExtrema>,
) -> Result<SimulationOutput> {
    let mut runner = build_runner(config, extrema)?;
    runner
        .run_to_end()
        .with_context(|| format!("Simulation failed (seed {})", runner.random_seed()))?;
    Ok(runner.take_output())
}

fn parse_inputs(
    config_val: JsValue,
    extrema_val: JsValue,
) -> Result<(SimulationConfig, Option<ClimateExtrema>), JsValue> {
    let config: SimulationConfig = from_value(config_val)
        .map_err(|e| JsValue::from_str(&format!("Invalid simulation config: {}", e)))?;
    let extrema = if extrema_val.is_undefined() || extrema_val.is_null() {
        None
    } else {
        Some(
            from_value::<ClimateExtrema>(extrema_val)
                .map_err(|e| JsValue::from_str(&format!("Invalid climate extrema: {}", e)))?,
        )
    };
    Ok((config, extrema))
}

fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", err))
}

/// Runs one realization and returns the full output mapping.
#[wasm_bindgen]
pub fn run_multistrain(config_val: JsValue, extrema_val: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let (config, extrema) = parse_inputs(config_val, extrema_val)?;
    let output = run_to_completion(&config, extrema.as_ref()).map_err(to_js_error)?;

    to_value(&output).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// WASM-exported runner that advances a simulation in batches of output
/// intervals so callers can report progress.
#[wasm_bindgen]
pub struct WasmSimulationRunner {
    runner: Option<SimulationRunner>,
}

#[wasm_bindgen]
impl WasmSimulationRunner {
    #[wasm_bindgen(constructor)]
    pub fn new(config_val: JsValue, extrema_val: JsValue) -> Result<WasmSimulationRunner, JsValue> {
        console_error_panic_hook::set_once();

        let (config, extrema) = parse_inputs(config_val, extrema_val)?;
        let runner = build_runner(&config, extrema.as_ref()).map_err(to_js_error)?;

        Ok(WasmSimulationRunner {
            runner: Some(runner),
        })
    }

    /// Check if every output interval has been simulated.
    pub fn is_done(&self) -> bool {
        self.runner.as_ref().map_or(true, |runner| runner.is_done())
    }

    /// Seed actually used, including one drawn from system entropy.
    pub fn random_seed(&self) -> Result<f64, JsValue> {
        let runner = self
            .runner
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;
        Ok(runner.random_seed() as f64)
    }

    /// Run a batch of output intervals and return progress.
    pub fn run_intervals(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        let runner = self
            .runner
            .as_mut()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        let progress = runner
            .run_intervals(batch_size as usize)
            .map_err(|e| JsValue::from_str(&format!("Simulation step failed: {}", e)))?;

        to_value(&progress).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Get progress information.
    pub fn get_progress(&self) -> Result<JsValue, JsValue> {
        let runner = self
            .runner
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        to_value(&runner.progress())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Output timestamps produced so far.
    pub fn get_times(&self) -> Result<Float64Array, JsValue> {
        let runner = self
            .runner
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;
        Ok(Float64Array::from(runner.output().t.as_slice()))
    }

    /// Get the final output mapping. Consumes the runner.
    pub fn get_result(&mut self) -> Result<JsValue, JsValue> {
        let runner = self
            .runner
            .take()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        let output = runner.take_output();

        to_value(&output).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
