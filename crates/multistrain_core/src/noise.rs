//! Correlated process noise for the Euler–Maruyama step.

use rand::Rng;
use rand_distr::StandardNormal;

/// Per-strain standard deviations plus the correlation between strain
/// draws. `corr == 1` broadcasts one draw to every strain; `0 < corr < 1`
/// blends the second strain's draw with the first and only applies to two
/// strains.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessNoise {
    corr: f64,
    sd: Vec<f64>,
}

impl ProcessNoise {
    pub fn new(corr: f64, sd: Vec<f64>) -> Self {
        Self { corr, sd }
    }

    pub fn is_stochastic(&self) -> bool {
        self.sd.iter().any(|&sd| sd > 0.0)
    }

    /// One scaled normal draw per strain. Not yet multiplied by `sqrt(h)`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let n = self.sd.len();
        let mut z: Vec<f64> = if self.corr == 1.0 {
            vec![rng.sample(StandardNormal); n]
        } else {
            let mut z: Vec<f64> = (0..n).map(|_| rng.sample(StandardNormal)).collect();
            if self.corr > 0.0 {
                if let [z0, z1] = z.as_mut_slice() {
                    *z1 = self.corr * *z0 + (1.0 - self.corr * self.corr).sqrt() * *z1;
                }
            }
            z
        };
        for (value, sd) in z.iter_mut().zip(&self.sd) {
            *value *= sd;
        }
        z
    }
}
