//! Time-varying transmission coefficients.

use crate::error::{Result, SimulationError};

/// `beta(t, i, w) = (beta0[i] + max(0, t - change_start[i]) * slope[i]) * w[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionModel {
    beta0: Vec<f64>,
    change_start: Vec<f64>,
    slope: Vec<f64>,
}

impl TransmissionModel {
    pub fn new(beta0: Vec<f64>, change_start: Vec<f64>, slope: Vec<f64>) -> Self {
        Self {
            beta0,
            change_start,
            slope,
        }
    }

    pub fn beta(&self, t: f64, strain: usize, multiplier: f64) -> Result<f64> {
        let trend = (t - self.change_start[strain]).max(0.0) * self.slope[strain];
        let value = (self.beta0[strain] + trend) * multiplier;
        if !(value >= 0.0) {
            return Err(SimulationError::NegativeTransmission { strain, t, value });
        }
        Ok(value)
    }

    /// Log-coefficients for every strain. A zero coefficient maps to `-inf`.
    pub fn log_betas(&self, t: f64, multipliers: &[f64]) -> Result<Vec<f64>> {
        multipliers
            .iter()
            .enumerate()
            .map(|(strain, &w)| self.beta(t, strain, w).map(f64::ln))
            .collect()
    }
}
