//! Simulation configuration and its single validation pass.

use crate::climate::ClimateExtrema;
use crate::error::{ConfigViolation, Result, SimulationError};
use crate::lorenz::{DEFAULT_BURN_IN_STEPS, LORENZ_DIM};
use serde::{Deserialize, Serialize};

/// Default floor on adaptive step sizes.
pub const DEFAULT_MIN_STEP: f64 = 1e-12;

pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// Selects Lorenz-driven weather instead of the seasonal sinusoid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChaoticForcingConfig {
    /// Lorenz coordinate (0 = x, 1 = y, 2 = z) driving each strain.
    pub channels: Vec<usize>,
    #[serde(default = "default_burn_in")]
    pub burn_in_steps: usize,
}

fn default_burn_in() -> usize {
    DEFAULT_BURN_IN_STEPS
}

fn default_tol() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_min_step() -> f64 {
    DEFAULT_MIN_STEP
}

/// Everything needed to produce one realization of the multi-strain process.
///
/// Per-strain vectors must all have length `n_strains`; `sigma` is
/// `n_strains x n_strains` with its diagonal ignored. Historical climate
/// extrema are not part of the configuration and are passed alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    #[serde(default)]
    pub random_seed: Option<u64>,
    pub dt_euler: f64,
    #[serde(default)]
    pub adaptive: bool,
    pub t_end: f64,
    pub dt_output: f64,
    #[serde(alias = "n_pathogens")]
    pub n_strains: usize,
    #[serde(alias = "S_init")]
    pub s_init: Vec<f64>,
    #[serde(alias = "I_init")]
    pub i_init: Vec<f64>,

    pub mu: f64,
    pub nu: Vec<f64>,
    pub gamma: Vec<f64>,
    pub beta0: Vec<f64>,
    pub beta_change_start: Vec<f64>,
    pub beta_slope: Vec<f64>,
    pub psi: Vec<f64>,
    pub omega: Vec<f64>,
    pub eps: Vec<f64>,
    pub sigma: Vec<Vec<f64>>,

    #[serde(default)]
    pub corr_proc: f64,
    pub sd_proc: Vec<f64>,

    #[serde(default)]
    pub shared_obs: bool,
    #[serde(default)]
    pub sd_obs: Option<Vec<f64>>,
    #[serde(default, alias = "shared_obs_C")]
    pub shared_obs_c: bool,
    #[serde(default, alias = "sd_obs_C")]
    pub sd_obs_c: Option<Vec<f64>>,

    #[serde(default = "default_tol")]
    pub tol: f64,
    #[serde(default)]
    pub chaotic_forcing: Option<ChaoticForcingConfig>,

    /// Largest overshoot of `S + I` past one that is clamped away. `None`
    /// clamps every overshoot; with a limit, larger ones abort the run.
    #[serde(default)]
    pub recovered_tolerance: Option<f64>,
    #[serde(default = "default_min_step")]
    pub min_step: f64,
}

impl SimulationConfig {
    /// Two seasonally forced strains with one-way cross-immunity, sampled
    /// weekly over twenty years, deterministic and fixed-step.
    pub fn seasonal_two_strain() -> Self {
        Self {
            random_seed: None,
            dt_euler: 1.0,
            adaptive: false,
            t_end: 20.0 * 365.0,
            dt_output: 7.0,
            n_strains: 2,
            s_init: vec![0.9, 0.96],
            i_init: vec![0.001, 0.002],
            mu: 1.0 / 30.0 / 365.0,
            nu: vec![0.2, 0.2],
            gamma: vec![0.0, 0.0],
            beta0: vec![0.3, 0.25],
            beta_change_start: vec![0.0, 0.0],
            beta_slope: vec![0.0, 0.0],
            psi: vec![365.0, 365.0],
            omega: vec![0.0, 0.0],
            eps: vec![1.0, 0.1],
            sigma: vec![vec![1.0, 0.0], vec![0.2, 1.0]],
            corr_proc: 1.0,
            sd_proc: vec![0.0, 0.0],
            shared_obs: false,
            sd_obs: Some(vec![0.0, 0.0]),
            shared_obs_c: false,
            sd_obs_c: Some(vec![0.0, 0.0]),
            tol: DEFAULT_TOLERANCE,
            chaotic_forcing: None,
            recovered_tolerance: None,
            min_step: DEFAULT_MIN_STEP,
        }
    }

    /// True when any strain carries process noise.
    pub fn is_stochastic(&self) -> bool {
        self.sd_proc.iter().any(|&sd| sd > 0.0)
    }

    /// Number of output intervals; the output holds one more timestamp than this.
    pub fn n_output(&self) -> usize {
        (self.t_end / self.dt_output).ceil() as usize
    }

    /// Checks every field and cross-field invariant, collecting all
    /// violations instead of stopping at the first.
    pub fn validate(&self, extrema: Option<&ClimateExtrema>) -> Result<()> {
        let mut violations = Vec::new();
        let n = self.n_strains;

        if n == 0 {
            violations.push(ConfigViolation::NoStrains);
        }

        positive_scalar(&mut violations, "dt_euler", self.dt_euler);
        positive_scalar(&mut violations, "t_end", self.t_end);
        positive_scalar(&mut violations, "dt_output", self.dt_output);
        positive_scalar(&mut violations, "mu", self.mu);
        positive_scalar(&mut violations, "min_step", self.min_step);
        if self.adaptive {
            positive_scalar(&mut violations, "tol", self.tol);
        }
        if let Some(limit) = self.recovered_tolerance {
            if !(limit >= 0.0) || !limit.is_finite() {
                violations.push(ConfigViolation::Negative {
                    field: "recovered_tolerance",
                    index: 0,
                    value: limit,
                });
            }
        }

        let lengths_ok = [
            check_len(&mut violations, "s_init", &self.s_init, n),
            check_len(&mut violations, "i_init", &self.i_init, n),
            check_len(&mut violations, "nu", &self.nu, n),
            check_len(&mut violations, "gamma", &self.gamma, n),
            check_len(&mut violations, "beta0", &self.beta0, n),
            check_len(&mut violations, "beta_change_start", &self.beta_change_start, n),
            check_len(&mut violations, "beta_slope", &self.beta_slope, n),
            check_len(&mut violations, "psi", &self.psi, n),
            check_len(&mut violations, "omega", &self.omega, n),
            check_len(&mut violations, "eps", &self.eps, n),
            check_len(&mut violations, "sd_proc", &self.sd_proc, n),
        ];

        if let Some(sd) = &self.sd_obs {
            if check_len(&mut violations, "sd_obs", sd, n) {
                non_negative(&mut violations, "sd_obs", sd);
            }
        }
        if let Some(sd) = &self.sd_obs_c {
            if check_len(&mut violations, "sd_obs_c", sd, n) {
                non_negative(&mut violations, "sd_obs_c", sd);
            }
        }

        if lengths_ok.iter().all(|&ok| ok) && n > 0 {
            for i in 0..n {
                fraction(&mut violations, "s_init", i, self.s_init[i]);
                fraction(&mut violations, "i_init", i, self.i_init[i]);
                let total = self.s_init[i] + self.i_init[i];
                if total > 1.0 {
                    violations.push(ConfigViolation::InitialOvercount { strain: i, total });
                }
                if !(self.psi[i] > 0.0) || !self.psi[i].is_finite() {
                    violations.push(ConfigViolation::NonPositiveEntry {
                        field: "psi",
                        index: i,
                        value: self.psi[i],
                    });
                }
            }
            non_negative(&mut violations, "nu", &self.nu);
            non_negative(&mut violations, "gamma", &self.gamma);
            non_negative(&mut violations, "beta0", &self.beta0);
            non_negative(&mut violations, "eps", &self.eps);
            non_negative(&mut violations, "sd_proc", &self.sd_proc);
            finite(&mut violations, "beta_change_start", &self.beta_change_start);
            finite(&mut violations, "beta_slope", &self.beta_slope);
            finite(&mut violations, "omega", &self.omega);
        }

        if self.sigma.len() != n {
            violations.push(ConfigViolation::Length {
                field: "sigma",
                expected: n,
                actual: self.sigma.len(),
            });
        } else {
            for (row, values) in self.sigma.iter().enumerate() {
                if values.len() != n {
                    violations.push(ConfigViolation::Length {
                        field: "sigma row",
                        expected: n,
                        actual: values.len(),
                    });
                    continue;
                }
                for (col, &value) in values.iter().enumerate() {
                    if row != col && !(0.0..=1.0).contains(&value) {
                        violations.push(ConfigViolation::CrossImmunity { row, col, value });
                    }
                }
            }
        }

        if !(0.0..=1.0).contains(&self.corr_proc) {
            violations.push(ConfigViolation::Correlation {
                value: self.corr_proc,
            });
        }

        let stochastic = self.is_stochastic();
        if stochastic && self.adaptive {
            violations.push(ConfigViolation::StochasticAdaptive);
        }
        if stochastic && self.corr_proc > 0.0 && self.corr_proc < 1.0 && n != 2 {
            violations.push(ConfigViolation::PartialCorrelation {
                corr: self.corr_proc,
                strains: n,
            });
        }

        if let Some(chaotic) = &self.chaotic_forcing {
            if check_len(&mut violations, "chaotic_forcing.channels", &chaotic.channels, n) {
                for (strain, &channel) in chaotic.channels.iter().enumerate() {
                    if channel >= LORENZ_DIM {
                        violations.push(ConfigViolation::ChannelIndex {
                            strain,
                            channel,
                            available: LORENZ_DIM,
                        });
                    } else if let Some(extrema) = extrema {
                        if channel >= extrema.len() {
                            violations.push(ConfigViolation::ExtremaChannel {
                                channel,
                                available: extrema.len(),
                            });
                        }
                    }
                }
            }
            if self.eps.len() == n {
                for (strain, &value) in self.eps.iter().enumerate() {
                    if !(0.0..=1.0).contains(&value) {
                        violations.push(ConfigViolation::ChaoticAmplitude { strain, value });
                    }
                }
            }
            if extrema.is_none() {
                violations.push(ConfigViolation::MissingExtrema);
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SimulationError::InvalidConfig(violations))
        }
    }
}

fn positive_scalar(violations: &mut Vec<ConfigViolation>, field: &'static str, value: f64) {
    if !(value > 0.0) || !value.is_finite() {
        violations.push(ConfigViolation::NotPositive { field, value });
    }
}

fn check_len<T>(
    violations: &mut Vec<ConfigViolation>,
    field: &'static str,
    values: &[T],
    expected: usize,
) -> bool {
    if values.len() != expected {
        violations.push(ConfigViolation::Length {
            field,
            expected,
            actual: values.len(),
        });
        return false;
    }
    true
}

fn non_negative(violations: &mut Vec<ConfigViolation>, field: &'static str, values: &[f64]) {
    for (index, &value) in values.iter().enumerate() {
        if !(value >= 0.0) || !value.is_finite() {
            violations.push(ConfigViolation::Negative {
                field,
                index,
                value,
            });
        }
    }
}

fn finite(violations: &mut Vec<ConfigViolation>, field: &'static str, values: &[f64]) {
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            violations.push(ConfigViolation::NonFinite {
                field,
                index,
                value,
            });
        }
    }
}

fn fraction(violations: &mut Vec<ConfigViolation>, field: &'static str, index: usize, value: f64) {
    if !(value > 0.0 && value <= 1.0) {
        violations.push(ConfigViolation::FractionOutOfRange {
            field,
            index,
            value,
            min: 0.0,
            max: 1.0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climate::ChannelExtrema;

    fn violations_of(config: &SimulationConfig, extrema: Option<&ClimateExtrema>) -> Vec<ConfigViolation> {
        match config.validate(extrema) {
            Err(SimulationError::InvalidConfig(v)) => v,
            Err(other) => panic!("unexpected error: {other}"),
            Ok(()) => Vec::new(),
        }
    }

    #[test]
    fn seasonal_two_strain_is_valid() {
        let config = SimulationConfig::seasonal_two_strain();
        config.validate(None).expect("valid");
        assert!(!config.is_stochastic());
        assert_eq!(config.n_output(), 1043);
    }

    #[test]
    fn stochastic_and_adaptive_conflict() {
        let mut config = SimulationConfig::seasonal_two_strain();
        config.adaptive = true;
        config.sd_proc = vec![0.1, 0.0];
        let violations = violations_of(&config, None);
        assert!(violations.contains(&ConfigViolation::StochasticAdaptive));
    }

    #[test]
    fn partial_correlation_requires_two_strains() {
        let mut config = SimulationConfig::seasonal_two_strain();
        config.n_strains = 3;
        config.s_init = vec![0.9, 0.9, 0.9];
        config.i_init = vec![0.01, 0.01, 0.01];
        config.nu = vec![0.2; 3];
        config.gamma = vec![0.0; 3];
        config.beta0 = vec![0.3; 3];
        config.beta_change_start = vec![0.0; 3];
        config.beta_slope = vec![0.0; 3];
        config.psi = vec![365.0; 3];
        config.omega = vec![0.0; 3];
        config.eps = vec![0.1; 3];
        config.sigma = vec![vec![1.0, 0.0, 0.0]; 3];
        config.sd_proc = vec![0.1; 3];
        config.sd_obs = None;
        config.sd_obs_c = None;
        config.corr_proc = 0.5;

        let violations = violations_of(&config, None);
        assert_eq!(
            violations,
            vec![ConfigViolation::PartialCorrelation {
                corr: 0.5,
                strains: 3
            }]
        );

        config.corr_proc = 1.0;
        config.validate(None).expect("fully shared noise is fine for any strain count");
    }

    #[test]
    fn validation_collects_every_violation() {
        let mut config = SimulationConfig::seasonal_two_strain();
        config.dt_euler = 0.0;
        config.nu = vec![0.2];
        config.sigma[1][0] = 1.5;
        config.corr_proc = -0.1;

        let violations = violations_of(&config, None);
        assert!(violations.contains(&ConfigViolation::NotPositive {
            field: "dt_euler",
            value: 0.0
        }));
        assert!(violations.contains(&ConfigViolation::Length {
            field: "nu",
            expected: 2,
            actual: 1
        }));
        assert!(violations.contains(&ConfigViolation::CrossImmunity {
            row: 1,
            col: 0,
            value: 1.5
        }));
        assert!(violations.contains(&ConfigViolation::Correlation { value: -0.1 }));
    }

    #[test]
    fn initial_fractions_must_leave_room_for_recovered() {
        let mut config = SimulationConfig::seasonal_two_strain();
        config.s_init = vec![0.9, 0.99];
        config.i_init = vec![0.001, 0.02];
        let violations = violations_of(&config, None);
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0],
            ConfigViolation::InitialOvercount { strain: 1, .. }
        ));
    }

    #[test]
    fn chaotic_forcing_requires_extrema_and_bounded_amplitude() {
        let mut config = SimulationConfig::seasonal_two_strain();
        config.eps = vec![1.2, 0.5];
        config.chaotic_forcing = Some(ChaoticForcingConfig {
            channels: vec![0, 3],
            burn_in_steps: DEFAULT_BURN_IN_STEPS,
        });
        let violations = violations_of(&config, None);
        assert!(violations.contains(&ConfigViolation::MissingExtrema));
        assert!(violations.contains(&ConfigViolation::ChaoticAmplitude {
            strain: 0,
            value: 1.2
        }));
        assert!(violations.contains(&ConfigViolation::ChannelIndex {
            strain: 1,
            channel: 3,
            available: 3
        }));

        let extrema = ClimateExtrema::new(vec![ChannelExtrema { min: -1.0, max: 1.0 }])
            .expect("extrema");
        config.eps = vec![1.0, 0.5];
        config.chaotic_forcing = Some(ChaoticForcingConfig {
            channels: vec![0, 1],
            burn_in_steps: 10,
        });
        let violations = violations_of(&config, Some(&extrema));
        assert_eq!(
            violations,
            vec![ConfigViolation::ExtremaChannel {
                channel: 1,
                available: 1
            }]
        );
    }

    #[test]
    fn config_reads_legacy_keyword_names() {
        let json = r#"{
            "dt_euler": 1.0,
            "t_end": 70.0,
            "dt_output": 7.0,
            "n_pathogens": 1,
            "S_init": [0.9],
            "I_init": [0.01],
            "mu": 0.0001,
            "nu": [0.2],
            "gamma": [0.0],
            "beta0": [0.3],
            "beta_change_start": [0.0],
            "beta_slope": [0.0],
            "psi": [365.0],
            "omega": [0.0],
            "eps": [0.1],
            "sigma": [[1.0]],
            "sd_proc": [0.0],
            "sd_obs_C": [0.1],
            "shared_obs_C": true
        }"#;
        let config: SimulationConfig = serde_json::from_str(json).expect("config");
        assert_eq!(config.n_strains, 1);
        assert_eq!(config.s_init, vec![0.9]);
        assert!(config.shared_obs_c);
        assert_eq!(config.sd_obs_c, Some(vec![0.1]));
        assert_eq!(config.tol, DEFAULT_TOLERANCE);
        assert!(config.random_seed.is_none());
        config.validate(None).expect("valid");
    }
}
