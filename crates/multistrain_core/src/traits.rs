use num_traits::Float;
use std::fmt::Debug;

/// Floating-point type a forcing system evolves in.
pub trait Scalar: Float + Debug {}

impl<T: Float + Debug> Scalar for T {}

/// Vector field `dx/dt = f(t, x)` behind a weather generator.
pub trait DynamicalSystem<T: Scalar> {
    fn dimension(&self) -> usize;

    /// Writes `f(t, x)` into `out`, which has `dimension()` entries.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// Fixed-step integrator that owns its scratch space.
pub trait Steppable<T: Scalar> {
    /// Moves `state` from `t` to `t + dt` in place and advances `t`.
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}
