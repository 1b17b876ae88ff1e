//! Step-doubling step-size control for the deterministic regime.
//!
//! Each attempt integrates the same interval once with `h` and once with two
//! steps of `h / 2`. The largest componentwise discrepancy serves as the
//! local error estimate; the attempt is kept only if it is below `tol`, and
//! the next step size is scaled from the estimate either way.

use crate::error::Result;
use crate::model::{EpidemicState, StrainDynamics};
use crate::weather::{WeatherForcing, WeatherModel, WeatherState};

/// Fraction of the tolerance-optimal step actually proposed.
pub const SAFETY_FACTOR: f64 = 0.9;

/// Result of integrating one interval both ways.
#[derive(Debug, Clone)]
pub struct DoubledStep {
    pub full: EpidemicState,
    pub halves: EpidemicState,
    /// Weather after the full step; carried forward on acceptance.
    pub weather: WeatherState,
    pub error: f64,
}

impl DoubledStep {
    /// State kept when the attempt is accepted.
    pub fn accepted_state(&self) -> EpidemicState {
        self.halves.extrapolate(&self.full)
    }
}

/// Integrates `[t, t + h]` with one full step and two half steps.
pub fn step_doubling(
    dynamics: &StrainDynamics,
    weather_model: &mut WeatherModel,
    t: f64,
    h: f64,
    state: &EpidemicState,
    weather: &WeatherState,
) -> Result<DoubledStep> {
    let half = h / 2.0;
    let t_half = t + half;
    let multipliers = weather_model.multipliers(weather)?;

    let weather_full = weather_model.advance(t, h, weather)?;
    let full = dynamics.step(t, h, state, &multipliers, None)?;

    let weather_half = weather_model.advance(t, t_half - t, weather)?;
    let first = dynamics.step(t, t_half - t, state, &multipliers, None)?;
    let half_multipliers = weather_model.multipliers(&weather_half)?;
    let halves = dynamics.step(t_half, t + h - t_half, &first, &half_multipliers, None)?;

    let error = halves.max_abs_difference(&full);
    Ok(DoubledStep {
        full,
        halves,
        weather: weather_full,
        error,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Accept,
    Reject,
}

/// Accept/reject bookkeeping and step-size proposals.
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    tol: f64,
    sum_h_log_h: f64,
    accepted: usize,
    rejected: usize,
    max_accepted_error: f64,
}

impl AdaptiveController {
    pub fn new(tol: f64) -> Self {
        Self {
            tol,
            sum_h_log_h: 0.0,
            accepted: 0,
            rejected: 0,
            max_accepted_error: 0.0,
        }
    }

    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// Step size for the next attempt. `h_used` is the (possibly clipped)
    /// size just attempted and `h_current` the unclipped working size.
    pub fn propose(&self, h_used: f64, h_current: f64, error: f64) -> f64 {
        if error > 0.0 {
            SAFETY_FACTOR * h_used * self.tol / error
        } else {
            h_current * 2.0
        }
    }

    /// Records the attempt and says whether to keep it.
    pub fn decide(&mut self, h_used: f64, error: f64) -> StepDecision {
        if error < self.tol {
            self.sum_h_log_h += h_used * h_used.ln();
            self.accepted += 1;
            self.max_accepted_error = self.max_accepted_error.max(error);
            StepDecision::Accept
        } else {
            self.rejected += 1;
            StepDecision::Reject
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn max_accepted_error(&self) -> f64 {
        self.max_accepted_error
    }

    /// `exp(Σ h ln h / elapsed)` over accepted steps: the time-weighted
    /// harmonic-mean step size.
    pub fn harmonic_mean_step(&self, elapsed: f64) -> Option<f64> {
        if self.accepted == 0 || !(elapsed > 0.0) {
            return None;
        }
        Some((self.sum_h_log_h / elapsed).exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn proposal_scales_with_tolerance_over_error() {
        let controller = AdaptiveController::new(1e-3);
        let h = controller.propose(0.5, 0.5, 2e-3);
        assert!((h - 0.9 * 0.5 * 0.5).abs() < 1e-15);
        let h = controller.propose(0.5, 0.5, 1e-4);
        assert!((h - 0.9 * 0.5 * 10.0).abs() < 1e-12);
    }

    #[test]
    fn zero_error_doubles_working_step() {
        let controller = AdaptiveController::new(1e-3);
        assert_eq!(controller.propose(0.25, 1.0, 0.0), 2.0);
    }

    #[test]
    fn decisions_track_acceptance_and_mean_step() {
        let mut controller = AdaptiveController::new(1e-3);
        assert_eq!(controller.decide(2.0, 5e-3), StepDecision::Reject);
        assert_eq!(controller.decide(1.0, 5e-4), StepDecision::Accept);
        assert_eq!(controller.decide(1.0, 1e-3), StepDecision::Reject);
        assert_eq!(controller.decide(1.0, 2e-4), StepDecision::Accept);
        assert_eq!(controller.accepted(), 2);
        assert_eq!(controller.rejected(), 2);
        assert_eq!(controller.max_accepted_error(), 5e-4);
        let mean = controller.harmonic_mean_step(2.0).expect("mean");
        assert!((mean - 1.0).abs() < 1e-15);
    }

    #[test]
    fn uniform_steps_report_their_own_size() {
        let mut controller = AdaptiveController::new(1.0);
        for _ in 0..8 {
            controller.decide(0.25, 0.1);
        }
        let mean = controller.harmonic_mean_step(2.0).expect("mean");
        assert!((mean - 0.25).abs() < 1e-12);
        assert!(AdaptiveController::new(1.0).harmonic_mean_step(1.0).is_none());
    }

    #[test]
    fn step_doubling_error_shrinks_quadratically() {
        let config = SimulationConfig::seasonal_two_strain();
        let dynamics = StrainDynamics::from_config(&config);
        let mut model = WeatherModel::from_config(&config, None).expect("weather");
        let weather = model.initial_state(&mut ChaCha8Rng::seed_from_u64(0));
        let state = EpidemicState::from_fractions(&config.s_init, &config.i_init);

        let coarse = step_doubling(&dynamics, &mut model, 0.0, 1.0, &state, &weather).expect("coarse");
        let fine = step_doubling(&dynamics, &mut model, 0.0, 0.5, &state, &weather).expect("fine");
        assert!(coarse.error > 0.0);
        let ratio = fine.error / coarse.error;
        assert!(ratio > 0.2 && ratio < 0.3, "ratio {ratio}");

        let corrected = coarse.accepted_state();
        assert!((corrected.max_abs_difference(&coarse.halves) - coarse.error).abs() < 1e-12);
    }
}
