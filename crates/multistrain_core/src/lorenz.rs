//! Lorenz-63 kernel used as a raw chaotic weather generator.
//!
//! One requested "day" of simulated epidemic time corresponds to a fixed
//! amount of Lorenz time. The calibration constant below and the order of the
//! floating-point operations in [`internal_step_size`] must not change, or
//! trajectories stop matching the historical extrema they are normalized
//! against.

use crate::solvers::ForwardEuler;
use crate::traits::{DynamicalSystem, Steppable};
use serde::{Deserialize, Serialize};

/// Lorenz time units covered by one year of simulated days (before halving).
pub const LORENZ_TIME_SCALE: f64 = 1.3744774477447745;

pub const DAYS_PER_YEAR: f64 = 365.0;

/// Warm-up steps (of one day each) taken before the simulation starts.
pub const DEFAULT_BURN_IN_STEPS: usize = 1000;

/// Dimension of the Lorenz phase space.
pub const LORENZ_DIM: usize = 3;

pub type LorenzState = [f64; LORENZ_DIM];

/// The classical Lorenz system `x' = σ(y - x)`, `y' = ρx - y - xz`, `z' = xy - βz`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LorenzSystem {
    pub sigma: f64,
    pub rho: f64,
    pub beta: f64,
}

impl Default for LorenzSystem {
    fn default() -> Self {
        Self {
            sigma: 10.0,
            rho: 28.0,
            beta: 2.667,
        }
    }
}

impl DynamicalSystem<f64> for LorenzSystem {
    fn dimension(&self) -> usize {
        LORENZ_DIM
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        out[0] = self.sigma * (x[1] - x[0]);
        out[1] = self.rho * x[0] - x[1] - x[0] * x[2];
        out[2] = x[0] * x[1] - self.beta * x[2];
    }
}

/// Converts a step of `h` days into the internal Lorenz step.
pub fn internal_step_size(h: f64) -> f64 {
    h * LORENZ_TIME_SCALE / DAYS_PER_YEAR / 2.0
}

/// Lorenz system paired with a reusable Euler stepper.
///
/// Holding the stepper keeps repeated micro-steps free of allocation.
#[derive(Debug, Clone)]
pub struct LorenzIntegrator {
    system: LorenzSystem,
    solver: ForwardEuler<f64>,
}

impl Default for LorenzIntegrator {
    fn default() -> Self {
        Self::new(LorenzSystem::default())
    }
}

impl LorenzIntegrator {
    pub fn new(system: LorenzSystem) -> Self {
        Self {
            system,
            solver: ForwardEuler::new(system.dimension()),
        }
    }

    /// Takes `n_steps` forward-Euler steps of `h` days each.
    pub fn advance(&mut self, state: &LorenzState, h: f64, n_steps: usize) -> LorenzState {
        let dt = internal_step_size(h);
        let mut t = 0.0;
        let mut next = *state;
        for _ in 0..n_steps {
            self.solver.step(&self.system, &mut t, &mut next, dt);
        }
        next
    }

    /// Records `n_steps + 1` phase positions (including the start) spaced `h` days apart.
    pub fn trajectory(&mut self, start: &LorenzState, h: f64, n_steps: usize) -> Vec<LorenzState> {
        let dt = internal_step_size(h);
        let mut t = 0.0;
        let mut current = *start;
        let mut points = Vec::with_capacity(n_steps + 1);
        points.push(current);
        for _ in 0..n_steps {
            self.solver.step(&self.system, &mut t, &mut current, dt);
            points.push(current);
        }
        points
    }
}

/// One-off [`LorenzIntegrator::advance`] with the classical parameters.
pub fn lorenz_step(state: &LorenzState, h: f64, n_steps: usize) -> LorenzState {
    LorenzIntegrator::default().advance(state, h, n_steps)
}

/// One-off [`LorenzIntegrator::trajectory`] with the classical parameters.
pub fn lorenz_trajectory(start: &LorenzState, h: f64, n_steps: usize) -> Vec<LorenzState> {
    LorenzIntegrator::default().trajectory(start, h, n_steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_step_matches_calibration() {
        let expected = 1.3744774477447745 / 365.0 / 2.0;
        assert_eq!(internal_step_size(1.0), expected);
        assert_eq!(internal_step_size(0.5), 0.5 * 1.3744774477447745 / 365.0 / 2.0);
    }

    #[test]
    fn single_step_matches_hand_computed_euler() {
        let state = [1.0, 2.0, 3.0];
        let h = internal_step_size(1.0);
        let x_dot = 10.0 * (2.0 - 1.0);
        let y_dot = 28.0 * 1.0 - 2.0 - 1.0 * 3.0;
        let z_dot = 1.0 * 2.0 - 2.667 * 3.0;

        let next = lorenz_step(&state, 1.0, 1);

        assert_eq!(next[0], 1.0 + x_dot * h);
        assert_eq!(next[1], 2.0 + y_dot * h);
        assert_eq!(next[2], 3.0 + z_dot * h);
    }

    #[test]
    fn reused_integrator_matches_fresh_steps() {
        let mut integrator = LorenzIntegrator::default();
        let mut reused = [1.1, 0.9, 1.3];
        let mut fresh = reused;
        for h in [1.0, 0.25, 0.5, 1.0] {
            reused = integrator.advance(&reused, h, 1);
            fresh = lorenz_step(&fresh, h, 1);
            assert_eq!(reused, fresh);
        }
    }

    #[test]
    fn zero_steps_is_identity() {
        let state = [0.3, -1.2, 7.0];
        assert_eq!(lorenz_step(&state, 1.0, 0), state);
    }

    #[test]
    fn repeated_single_steps_match_batched_steps() {
        let start = [1.0, 1.0, 1.0];
        let batched = lorenz_step(&start, 1.0, 50);
        let mut stepped = start;
        for _ in 0..50 {
            stepped = lorenz_step(&stepped, 1.0, 1);
        }
        assert_eq!(batched, stepped);
    }

    #[test]
    fn trajectory_stays_on_bounded_attractor() {
        let start = lorenz_step(&[1.0, 1.0, 1.0], 1.0, DEFAULT_BURN_IN_STEPS);
        let points = lorenz_trajectory(&start, 1.0, 20_000);
        assert_eq!(points.len(), 20_001);
        assert_eq!(points[0], start);
        for p in &points {
            assert!(p[0].abs() < 25.0, "x escaped: {:?}", p);
            assert!(p[1].abs() < 35.0, "y escaped: {:?}", p);
            assert!(p[2] > -5.0 && p[2] < 60.0, "z escaped: {:?}", p);
        }
    }
}
