//! Historical climate extrema and the normalizer that turns raw Lorenz
//! coordinates into bounded transmission multipliers.

use crate::error::{Result, SimulationError};
use crate::lorenz::{LorenzState, LORENZ_DIM};
use serde::{Deserialize, Serialize};

/// Observed (min, max) of one weather channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChannelExtrema {
    pub min: f64,
    pub max: f64,
}

/// Calibration bounds per Lorenz coordinate, injected by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Vec<ChannelExtrema>", into = "Vec<ChannelExtrema>")]
pub struct ClimateExtrema {
    channels: Vec<ChannelExtrema>,
}

impl ClimateExtrema {
    pub fn new(channels: Vec<ChannelExtrema>) -> Result<Self> {
        if channels.is_empty() {
            return Err(SimulationError::InvalidExtrema {
                reason: "at least one channel is required".to_string(),
            });
        }
        for (idx, c) in channels.iter().enumerate() {
            if !c.min.is_finite() || !c.max.is_finite() {
                return Err(SimulationError::InvalidExtrema {
                    reason: format!("channel {idx} has non-finite bounds [{}, {}]", c.min, c.max),
                });
            }
            if c.min >= c.max {
                return Err(SimulationError::InvalidExtrema {
                    reason: format!("channel {idx} has min {} >= max {}", c.min, c.max),
                });
            }
        }
        Ok(Self { channels })
    }

    /// Derives extrema from a recorded Lorenz trajectory. `margin` widens each
    /// channel by that fraction of its observed range on both sides.
    pub fn from_trajectory(points: &[LorenzState], margin: f64) -> Result<Self> {
        if points.is_empty() {
            return Err(SimulationError::InvalidExtrema {
                reason: "trajectory is empty".to_string(),
            });
        }
        if !(margin >= 0.0) || !margin.is_finite() {
            return Err(SimulationError::InvalidExtrema {
                reason: format!("margin {margin} must be non-negative and finite"),
            });
        }
        let mut channels = vec![
            ChannelExtrema {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            };
            LORENZ_DIM
        ];
        for point in points {
            for (c, &value) in channels.iter_mut().zip(point.iter()) {
                c.min = c.min.min(value);
                c.max = c.max.max(value);
            }
        }
        for c in &mut channels {
            let pad = (c.max - c.min) * margin;
            c.min -= pad;
            c.max += pad;
        }
        Self::new(channels)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel(&self, idx: usize) -> Option<ChannelExtrema> {
        self.channels.get(idx).copied()
    }
}

impl TryFrom<Vec<ChannelExtrema>> for ClimateExtrema {
    type Error = SimulationError;

    fn try_from(channels: Vec<ChannelExtrema>) -> Result<Self> {
        Self::new(channels)
    }
}

impl From<ClimateExtrema> for Vec<ChannelExtrema> {
    fn from(value: ClimateExtrema) -> Self {
        value.channels
    }
}

/// Maps selected Lorenz coordinates to per-strain multipliers
/// `1 + eps * (2 (x - min) / (max - min) - 1)`.
#[derive(Debug, Clone)]
pub struct ClimateNormalizer {
    extrema: ClimateExtrema,
    channels: Vec<usize>,
    eps: Vec<f64>,
}

impl ClimateNormalizer {
    /// `channels[i]` is the Lorenz coordinate driving strain `i`.
    pub fn new(extrema: ClimateExtrema, channels: Vec<usize>, eps: Vec<f64>) -> Result<Self> {
        if channels.len() != eps.len() {
            return Err(SimulationError::InvalidExtrema {
                reason: format!(
                    "{} channels supplied for {} strain amplitudes",
                    channels.len(),
                    eps.len()
                ),
            });
        }
        if let Some(&bad) = channels
            .iter()
            .find(|&&c| c >= extrema.len() || c >= LORENZ_DIM)
        {
            return Err(SimulationError::InvalidExtrema {
                reason: format!(
                    "channel {bad} is not covered by {} extrema channels",
                    extrema.len()
                ),
            });
        }
        Ok(Self {
            extrema,
            channels,
            eps,
        })
    }

    pub fn strains(&self) -> usize {
        self.channels.len()
    }

    /// Position of the strain's channel within its historical range, in [-1, 1].
    pub fn scaled(&self, strain: usize, phase: &LorenzState) -> Result<f64> {
        let channel = self.channels[strain];
        let bounds = self.extrema.channels[channel];
        let value = phase[channel];
        let scaled = 2.0 * (value - bounds.min) / (bounds.max - bounds.min) - 1.0;
        if !(-1.0..=1.0).contains(&scaled) {
            return Err(SimulationError::WeatherOutOfRange {
                strain,
                channel,
                value,
                scaled,
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(scaled)
    }

    pub fn multipliers(&self, phase: &LorenzState) -> Result<Vec<f64>> {
        (0..self.strains())
            .map(|strain| {
                let value = 1.0 + self.eps[strain] * self.scaled(strain, phase)?;
                if !(0.0..=2.0).contains(&value) {
                    return Err(SimulationError::MultiplierOutOfRange { strain, value });
                }
                Ok(value)
            })
            .collect()
    }
}
