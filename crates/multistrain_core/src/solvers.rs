use crate::traits::{DynamicalSystem, Scalar, Steppable};

/// Explicit (forward) Euler stepper.
///
/// `y_next = y + dt * f(t, y)`. First order; used where trajectory
/// compatibility with a fixed-step reference matters more than accuracy.
#[derive(Debug, Clone)]
pub struct ForwardEuler<T: Scalar> {
    slope: Vec<T>,
}

impl<T: Scalar> ForwardEuler<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            slope: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for ForwardEuler<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        system.apply(*t, state, &mut self.slope);

        // Every component reads the pre-step state, so the update happens after the evaluation.
        for i in 0..state.len() {
            state[i] = state[i] + dt * self.slope[i];
        }

        *t = *t + dt;
    }
}

#[cfg(test)]
mod tests {
    use super::ForwardEuler;
    use crate::traits::{DynamicalSystem, Steppable};

    struct Decay {
        rate: f64,
    }

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -self.rate * x[0];
        }
    }

    #[test]
    fn forward_euler_single_step_matches_closed_form() {
        let system = Decay { rate: 2.0 };
        let mut solver = ForwardEuler::new(system.dimension());
        let mut t = 0.0;
        let mut state = [1.0];

        solver.step(&system, &mut t, &mut state, 0.1);

        assert!((t - 0.1).abs() < 1e-15);
        assert!((state[0] - 0.8).abs() < 1e-15);
    }

    #[test]
    fn forward_euler_converges_to_exponential() {
        let system = Decay { rate: 1.0 };
        let mut solver = ForwardEuler::new(1);
        let mut t = 0.0;
        let mut state = [1.0];
        let steps = 10_000;
        let dt = 1.0 / steps as f64;

        for _ in 0..steps {
            solver.step(&system, &mut t, &mut state, dt);
        }

        assert!((state[0] - (-1.0f64).exp()).abs() < 1e-4);
    }
}
