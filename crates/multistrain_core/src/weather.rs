//! Weather forcing: the per-strain transmission multipliers and the state
//! that produces them.
//!
//! Two strategies share the [`WeatherForcing`] interface. The periodic one is
//! memoryless; the chaotic one carries a Lorenz phase position from step to
//! step. [`WeatherModel`] picks one at construction.

use crate::climate::{ClimateExtrema, ClimateNormalizer};
use crate::config::SimulationConfig;
use crate::error::{Result, SimulationError};
use crate::lorenz::{LorenzIntegrator, LorenzState};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Start points for the Lorenz warm-up are drawn from this box on each axis.
const LORENZ_START_RANGE: (f64, f64) = (0.5, 1.5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeatherState {
    /// Multipliers, one per strain, each in [0, 2].
    Periodic(Vec<f64>),
    /// Raw Lorenz phase position.
    Chaotic(LorenzState),
}

impl WeatherState {
    pub fn phase(&self) -> Option<LorenzState> {
        match self {
            WeatherState::Periodic(_) => None,
            WeatherState::Chaotic(phase) => Some(*phase),
        }
    }
}

pub trait WeatherForcing {
    /// Weather in effect at t = 0.
    fn initial_state<R: Rng + ?Sized>(&mut self, rng: &mut R) -> WeatherState;

    /// Weather produced by a step of size `h` starting at `t`.
    fn advance(&mut self, t: f64, h: f64, state: &WeatherState) -> Result<WeatherState>;

    /// Transmission multipliers for the given weather.
    fn multipliers(&self, state: &WeatherState) -> Result<Vec<f64>>;
}

/// `1 + eps[i] * sin(2π/psi[i] * (t - omega[i] * psi[i]))`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicForcing {
    psi: Vec<f64>,
    omega: Vec<f64>,
    eps: Vec<f64>,
}

impl PeriodicForcing {
    pub fn new(psi: Vec<f64>, omega: Vec<f64>, eps: Vec<f64>) -> Self {
        Self { psi, omega, eps }
    }

    pub fn at(&self, t: f64) -> Vec<f64> {
        (0..self.psi.len())
            .map(|i| {
                let psi = self.psi[i];
                1.0 + self.eps[i] * (2.0 * PI / psi * (t - self.omega[i] * psi)).sin()
            })
            .collect()
    }
}

impl WeatherForcing for PeriodicForcing {
    fn initial_state<R: Rng + ?Sized>(&mut self, _rng: &mut R) -> WeatherState {
        WeatherState::Periodic(vec![1.0; self.psi.len()])
    }

    fn advance(&mut self, t: f64, _h: f64, _state: &WeatherState) -> Result<WeatherState> {
        Ok(WeatherState::Periodic(self.at(t)))
    }

    fn multipliers(&self, state: &WeatherState) -> Result<Vec<f64>> {
        match state {
            WeatherState::Periodic(values) => Ok(values.clone()),
            WeatherState::Chaotic(_) => Err(SimulationError::WeatherStateMismatch {
                expected: "periodic multipliers",
            }),
        }
    }
}

/// Lorenz-driven weather normalized against historical extrema.
#[derive(Debug, Clone)]
pub struct ChaoticForcing {
    normalizer: ClimateNormalizer,
    burn_in_steps: usize,
    integrator: LorenzIntegrator,
}

impl ChaoticForcing {
    pub fn new(normalizer: ClimateNormalizer, burn_in_steps: usize) -> Self {
        Self {
            normalizer,
            burn_in_steps,
            integrator: LorenzIntegrator::default(),
        }
    }
}

impl WeatherForcing for ChaoticForcing {
    fn initial_state<R: Rng + ?Sized>(&mut self, rng: &mut R) -> WeatherState {
        let (lo, hi) = LORENZ_START_RANGE;
        let start = [
            rng.gen_range(lo..hi),
            rng.gen_range(lo..hi),
            rng.gen_range(lo..hi),
        ];
        WeatherState::Chaotic(self.integrator.advance(&start, 1.0, self.burn_in_steps))
    }

    fn advance(&mut self, _t: f64, h: f64, state: &WeatherState) -> Result<WeatherState> {
        match state {
            WeatherState::Chaotic(phase) => {
                Ok(WeatherState::Chaotic(self.integrator.advance(phase, h, 1)))
            }
            WeatherState::Periodic(_) => Err(SimulationError::WeatherStateMismatch {
                expected: "Lorenz phase",
            }),
        }
    }

    fn multipliers(&self, state: &WeatherState) -> Result<Vec<f64>> {
        match state {
            WeatherState::Chaotic(phase) => self.normalizer.multipliers(phase),
            WeatherState::Periodic(_) => Err(SimulationError::WeatherStateMismatch {
                expected: "Lorenz phase",
            }),
        }
    }
}

/// The forcing strategy chosen once for a run.
#[derive(Debug, Clone)]
pub enum WeatherModel {
    Periodic(PeriodicForcing),
    Chaotic(ChaoticForcing),
}

impl WeatherModel {
    /// Chaotic forcing requires `extrema`; periodic forcing ignores it.
    pub fn from_config(config: &SimulationConfig, extrema: Option<&ClimateExtrema>) -> Result<Self> {
        match &config.chaotic_forcing {
            None => Ok(WeatherModel::Periodic(PeriodicForcing::new(
                config.psi.clone(),
                config.omega.clone(),
                config.eps.clone(),
            ))),
            Some(chaotic) => {
                let extrema = extrema.ok_or_else(|| {
                    SimulationError::InvalidExtrema {
                        reason: "chaotic forcing requires climate extrema".to_string(),
                    }
                })?;
                let normalizer = ClimateNormalizer::new(
                    extrema.clone(),
                    chaotic.channels.clone(),
                    config.eps.clone(),
                )?;
                Ok(WeatherModel::Chaotic(ChaoticForcing::new(
                    normalizer,
                    chaotic.burn_in_steps,
                )))
            }
        }
    }

    pub fn is_chaotic(&self) -> bool {
        matches!(self, WeatherModel::Chaotic(_))
    }
}

impl WeatherForcing for WeatherModel {
    fn initial_state<R: Rng + ?Sized>(&mut self, rng: &mut R) -> WeatherState {
        match self {
            WeatherModel::Periodic(m) => m.initial_state(rng),
            WeatherModel::Chaotic(m) => m.initial_state(rng),
        }
    }

    fn advance(&mut self, t: f64, h: f64, state: &WeatherState) -> Result<WeatherState> {
        match self {
            WeatherModel::Periodic(m) => m.advance(t, h, state),
            WeatherModel::Chaotic(m) => m.advance(t, h, state),
        }
    }

    fn multipliers(&self, state: &WeatherState) -> Result<Vec<f64>> {
        match self {
            WeatherModel::Periodic(m) => m.multipliers(state),
            WeatherModel::Chaotic(m) => m.multipliers(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climate::ChannelExtrema;
    use crate::config::ChaoticForcingConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generous_extrema() -> ClimateExtrema {
        ClimateExtrema::new(vec![
            ChannelExtrema { min: -25.0, max: 25.0 },
            ChannelExtrema { min: -35.0, max: 35.0 },
            ChannelExtrema { min: -5.0, max: 60.0 },
        ])
        .expect("extrema")
    }

    #[test]
    fn periodic_forcing_follows_closed_form() {
        let forcing = PeriodicForcing::new(vec![365.0, 100.0], vec![0.0, 0.25], vec![1.0, 0.1]);
        let w = forcing.at(365.0 / 4.0);
        assert!((w[0] - 2.0).abs() < 1e-12);
        // Phase shift of a quarter period puts strain 1 at its mean at t = 25.
        let w = forcing.at(25.0);
        assert!((w[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn periodic_forcing_is_memoryless_and_bounded() {
        let mut forcing = PeriodicForcing::new(vec![365.0, 365.0], vec![0.0, 0.3], vec![1.0, 0.1]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let initial = forcing.initial_state(&mut rng);
        assert_eq!(initial, WeatherState::Periodic(vec![1.0, 1.0]));

        let from_initial = forcing.advance(40.0, 1.0, &initial).expect("advance");
        let from_other = forcing
            .advance(40.0, 5.0, &WeatherState::Periodic(vec![0.3, 0.7]))
            .expect("advance");
        assert_eq!(from_initial, from_other);

        for day in 0..730 {
            let w = forcing.at(day as f64);
            assert!(w[0] >= 0.0 && w[0] <= 2.0);
            assert!(w[1] >= 0.9 && w[1] <= 1.1);
        }
    }

    #[test]
    fn chaotic_forcing_carries_phase_and_stays_in_range() {
        let mut config = SimulationConfig::seasonal_two_strain();
        config.eps = vec![1.0, 0.5];
        config.chaotic_forcing = Some(ChaoticForcingConfig {
            channels: vec![0, 2],
            burn_in_steps: 1000,
        });
        let extrema = generous_extrema();
        let mut model = WeatherModel::from_config(&config, Some(&extrema)).expect("model");
        assert!(model.is_chaotic());

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut state = model.initial_state(&mut rng);
        let first_phase = state.phase().expect("phase");
        for step in 0..2000 {
            let w = model.multipliers(&state).expect("multipliers");
            assert!(w.iter().all(|&m| (0.0..=2.0).contains(&m)));
            state = model.advance(step as f64, 1.0, &state).expect("advance");
        }
        assert_ne!(state.phase().expect("phase"), first_phase);
    }

    #[test]
    fn chaotic_initial_state_is_seed_reproducible() {
        let mut config = SimulationConfig::seasonal_two_strain();
        config.chaotic_forcing = Some(ChaoticForcingConfig {
            channels: vec![0, 1],
            burn_in_steps: 1000,
        });
        config.eps = vec![0.5, 0.5];
        let extrema = generous_extrema();
        let mut model = WeatherModel::from_config(&config, Some(&extrema)).expect("model");
        let a = model.initial_state(&mut ChaCha8Rng::seed_from_u64(3));
        let b = model.initial_state(&mut ChaCha8Rng::seed_from_u64(3));
        let c = model.initial_state(&mut ChaCha8Rng::seed_from_u64(4));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn mismatched_state_is_rejected() {
        let forcing = PeriodicForcing::new(vec![365.0], vec![0.0], vec![0.1]);
        let err = forcing
            .multipliers(&WeatherState::Chaotic([0.0, 0.0, 0.0]))
            .expect_err("mismatch");
        assert!(matches!(err, SimulationError::WeatherStateMismatch { .. }));
    }
}
