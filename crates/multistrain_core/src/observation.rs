//! Observation model: reported prevalence and interval incidence.

use rand::Rng;
use rand_distr::StandardNormal;

/// Gaussian observation error for one reported series.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationNoise {
    /// One draw scaled per strain instead of independent draws.
    pub shared: bool,
    pub sd: Vec<f64>,
}

impl ObservationNoise {
    pub fn new(shared: bool, sd: Option<Vec<f64>>) -> Self {
        Self {
            shared,
            sd: sd.unwrap_or_default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.sd.iter().any(|&sd| sd > 0.0)
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        if self.shared {
            let z: f64 = rng.sample(StandardNormal);
            self.sd.iter().map(|sd| z * sd).collect()
        } else {
            self.sd
                .iter()
                .map(|sd| {
                    let z: f64 = rng.sample(StandardNormal);
                    z * sd
                })
                .collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationModel {
    prevalence: ObservationNoise,
    incidence: ObservationNoise,
}

impl ObservationModel {
    pub fn new(prevalence: ObservationNoise, incidence: ObservationNoise) -> Self {
        Self {
            prevalence,
            incidence,
        }
    }

    /// Reported log-infected. Draws only when prevalence error is configured.
    pub fn observe_log_infected<R: Rng + ?Sized>(&self, log_i: &[f64], rng: &mut R) -> Vec<f64> {
        if !self.prevalence.is_active() {
            return log_i.to_vec();
        }
        let errors = self.prevalence.draw(rng);
        log_i.iter().zip(&errors).map(|(x, e)| x + e).collect()
    }

    /// Incidence over an output interval from two cumulative snapshots,
    /// noised and floored at zero.
    pub fn observe_incidence<R: Rng + ?Sized>(
        &self,
        previous: &[f64],
        current: &[f64],
        rng: &mut R,
    ) -> Vec<f64> {
        let errors = if self.incidence.is_active() {
            self.incidence.draw(rng)
        } else {
            vec![0.0; current.len()]
        };
        current
            .iter()
            .zip(previous)
            .zip(&errors)
            .map(|((c, p), e)| (c - p + e).max(0.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn noiseless_observation_passes_through_and_keeps_stream() {
        let model = ObservationModel::new(
            ObservationNoise::new(false, Some(vec![0.0, 0.0])),
            ObservationNoise::new(true, None),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let log_i = model.observe_log_infected(&[-3.0, -4.0], &mut rng);
        assert_eq!(log_i, vec![-3.0, -4.0]);
        let c = model.observe_incidence(&[0.1, 0.2], &[0.15, 0.2], &mut rng);
        assert!((c[0] - 0.05).abs() < 1e-15);
        assert_eq!(c[1], 0.0);

        let mut fresh = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(rng.gen::<u64>(), fresh.gen::<u64>());
    }

    #[test]
    fn shared_prevalence_error_scales_one_draw() {
        let model = ObservationModel::new(
            ObservationNoise::new(true, Some(vec![0.1, 0.2])),
            ObservationNoise::new(false, None),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let observed = model.observe_log_infected(&[0.0, 0.0], &mut rng);
        assert!((observed[1] - 2.0 * observed[0]).abs() < 1e-15);
    }

    #[test]
    fn independent_prevalence_error_uses_one_draw_per_strain() {
        let model = ObservationModel::new(
            ObservationNoise::new(false, Some(vec![1.0, 1.0])),
            ObservationNoise::new(false, None),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let observed = model.observe_log_infected(&[0.0, 0.0], &mut rng);

        let mut reference = ChaCha8Rng::seed_from_u64(8);
        let z0: f64 = reference.sample(StandardNormal);
        let z1: f64 = reference.sample(StandardNormal);
        assert_eq!(observed, vec![z0, z1]);
    }

    #[test]
    fn noisy_incidence_is_clamped_at_zero() {
        let model = ObservationModel::new(
            ObservationNoise::new(false, None),
            ObservationNoise::new(false, Some(vec![1.0, 1.0])),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let mut clamped = 0;
        for _ in 0..200 {
            let c = model.observe_incidence(&[0.0, 0.0], &[1e-3, 1e-3], &mut rng);
            assert!(c.iter().all(|&x| x >= 0.0));
            clamped += c.iter().filter(|&&x| x == 0.0).count();
        }
        assert!(clamped > 100);
    }
}
