//! Log-space multi-strain dynamics and the Euler–Maruyama step operator.
//!
//! For strain `i` with force of infection `λ_i = β_i I_i`:
//!
//! ```text
//! d log S_i = (μ/S_i - μ + γ_i R_i/S_i - Σ_{j≠i} σ_ij λ_j - λ_i) dt  (- noise terms)
//! d log I_i = (β_i S_i - ν_i - μ) dt                                  (+ noise term)
//! d C_i     = β_i S_i I_i dt                                          (+ noise term)
//! ```
//!
//! where `R_i = 1 - S_i - I_i`. Working in log space keeps `S` and `I`
//! strictly positive regardless of how small they get.

use crate::config::SimulationConfig;
use crate::error::{Result, SimulationError};
use crate::transmission::TransmissionModel;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Per-strain state advanced every micro-step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpidemicState {
    pub log_s: Vec<f64>,
    pub log_i: Vec<f64>,
    /// Cumulative incidence since t = 0.
    pub cumulative: Vec<f64>,
}

impl EpidemicState {
    pub fn from_fractions(s_init: &[f64], i_init: &[f64]) -> Self {
        Self {
            log_s: s_init.iter().map(|s| s.ln()).collect(),
            log_i: i_init.iter().map(|i| i.ln()).collect(),
            cumulative: vec![0.0; s_init.len()],
        }
    }

    pub fn strains(&self) -> usize {
        self.log_s.len()
    }

    /// Largest absolute componentwise difference across all three vectors.
    pub fn max_abs_difference(&self, other: &EpidemicState) -> f64 {
        let pairs = self
            .log_s
            .iter()
            .zip(&other.log_s)
            .chain(self.log_i.iter().zip(&other.log_i))
            .chain(self.cumulative.iter().zip(&other.cumulative));
        pairs.fold(0.0, |acc, (a, b)| acc.max((a - b).abs()))
    }

    /// `self + (self - coarse)`: the first-order Richardson correction of a
    /// two-half-step result against its one-step counterpart.
    pub fn extrapolate(&self, coarse: &EpidemicState) -> EpidemicState {
        let correct = |fine: &[f64], coarse: &[f64]| -> Vec<f64> {
            fine.iter()
                .zip(coarse)
                .map(|(f, c)| f + (f - c))
                .collect()
        };
        EpidemicState {
            log_s: correct(&self.log_s, &coarse.log_s),
            log_i: correct(&self.log_i, &coarse.log_i),
            cumulative: correct(&self.cumulative, &coarse.cumulative),
        }
    }
}

/// Fixed epidemiological parameters plus the step operator acting on them.
#[derive(Debug, Clone)]
pub struct StrainDynamics {
    mu: f64,
    log_mu: f64,
    nu: Vec<f64>,
    gamma: Vec<f64>,
    log_gamma: Vec<f64>,
    /// Cross-immunity with the diagonal zeroed; own-strain depletion is
    /// handled separately.
    cross_immunity: DMatrix<f64>,
    transmission: TransmissionModel,
    recovered_tolerance: Option<f64>,
}

impl StrainDynamics {
    pub fn from_config(config: &SimulationConfig) -> Self {
        let n = config.n_strains;
        let cross_immunity =
            DMatrix::from_fn(n, n, |i, j| if i == j { 0.0 } else { config.sigma[i][j] });
        Self {
            mu: config.mu,
            log_mu: config.mu.ln(),
            nu: config.nu.clone(),
            gamma: config.gamma.clone(),
            log_gamma: config
                .gamma
                .iter()
                .map(|&g| if g == 0.0 { f64::NEG_INFINITY } else { g.ln() })
                .collect(),
            cross_immunity,
            transmission: TransmissionModel::new(
                config.beta0.clone(),
                config.beta_change_start.clone(),
                config.beta_slope.clone(),
            ),
            recovered_tolerance: config.recovered_tolerance,
        }
    }

    pub fn strains(&self) -> usize {
        self.nu.len()
    }

    /// `log(1 - S - I)` per strain. When `S + I` reaches or passes one the
    /// recovered pool is treated as empty (`-inf`), unless a tolerance is
    /// configured and the overshoot exceeds it.
    pub fn log_recovered(&self, t: f64, state: &EpidemicState) -> Result<Vec<f64>> {
        (0..state.strains())
            .map(|i| {
                let s = state.log_s[i].exp();
                let inf = state.log_i[i].exp();
                let log_r = (-(s + inf)).ln_1p();
                if !log_r.is_nan() {
                    return Ok(log_r);
                }
                let recovered = 1.0 - s - inf;
                if let Some(tolerance) = self.recovered_tolerance {
                    if recovered < -tolerance {
                        return Err(SimulationError::NegativeRecovered {
                            strain: i,
                            t,
                            susceptible: s,
                            infected: inf,
                            recovered,
                            tolerance,
                        });
                    }
                }
                log::trace!(
                    "strain {} recovered fraction {:e} clamped to zero at t = {}",
                    i,
                    recovered,
                    t
                );
                let recovered = recovered.max(0.0);
                Ok(if recovered == 0.0 {
                    f64::NEG_INFINITY
                } else {
                    recovered.ln()
                })
            })
            .collect()
    }

    /// One explicit step of size `h` from `t`.
    ///
    /// `multipliers` is the weather in effect during the step. `noise`, when
    /// present, holds one draw per strain already scaled by its process-noise
    /// standard deviation; this function applies the `sqrt(h)` factor.
    pub fn step(
        &self,
        t: f64,
        h: f64,
        state: &EpidemicState,
        multipliers: &[f64],
        noise: Option<&[f64]>,
    ) -> Result<EpidemicState> {
        let n = state.strains();
        let sqrt_h = h.sqrt();
        let log_betas = self.transmission.log_betas(t, multipliers)?;
        let log_r = self.log_recovered(t, state)?;

        let force = DVector::from_iterator(n, (0..n).map(|j| (log_betas[j] + state.log_i[j]).exp()));
        let cross = &self.cross_immunity * &force;
        let cross_noise =
            noise.map(|z| &self.cross_immunity * force.component_mul(&DVector::from_column_slice(z)));

        let mut next = state.clone();
        for i in 0..n {
            let log_s = state.log_s[i];
            let log_i = state.log_i[i];

            let mut dlog_s = ((self.log_mu - log_s).exp() - self.mu) * h;
            if self.gamma[i] > 0.0 && log_r[i] > f64::NEG_INFINITY {
                dlog_s += (self.log_gamma[i] + log_r[i] - log_s).exp() * h;
            }
            dlog_s -= cross[i] * h;

            let loss = force[i];
            let gain = (log_betas[i] + log_s).exp();
            let incidence = (log_betas[i] + log_s + log_i).exp();

            dlog_s -= loss * h;
            let mut dlog_i = gain * h;
            let mut dcum = incidence * h;

            if let (Some(z), Some(cross_noise)) = (noise, &cross_noise) {
                dlog_s -= cross_noise[i] * sqrt_h;
                dlog_s -= loss * z[i] * sqrt_h;
                dlog_i += gain * z[i] * sqrt_h;
                dcum += incidence * z[i] * sqrt_h;
            }
            dlog_i -= (self.nu[i] + self.mu) * h;

            next.log_s[i] = log_s + dlog_s;
            next.log_i[i] = log_i + dlog_i;
            next.cumulative[i] = state.cumulative[i] + dcum;

            check_finite(i, t + h, "log S", next.log_s[i])?;
            check_finite(i, t + h, "log I", next.log_i[i])?;
            check_finite(i, t + h, "cumulative incidence", next.cumulative[i])?;
        }
        Ok(next)
    }
}

fn check_finite(strain: usize, t: f64, quantity: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimulationError::NonFiniteState {
            strain,
            t,
            quantity,
        })
    }
}
