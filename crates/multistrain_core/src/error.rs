//! Error types for configuration validation and simulation invariants.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Fatal failures. Each variant names the invariant that broke and the
/// values that broke it; nothing here is recovered from inside the loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {}", format_violations(.0))]
    InvalidConfig(Vec<ConfigViolation>),

    #[error("invalid climate extrema: {reason}")]
    InvalidExtrema { reason: String },

    #[error(
        "weather channel {channel} for strain {strain} normalized to {scaled} \
         (raw {value}, extrema [{min}, {max}]); the extrema do not bound the Lorenz trajectory"
    )]
    WeatherOutOfRange {
        strain: usize,
        channel: usize,
        value: f64,
        scaled: f64,
        min: f64,
        max: f64,
    },

    #[error("weather multiplier {value} for strain {strain} outside [0, 2]")]
    MultiplierOutOfRange { strain: usize, value: f64 },

    #[error("negative transmission coefficient {value} for strain {strain} at t = {t}")]
    NegativeTransmission { strain: usize, t: f64, value: f64 },

    #[error(
        "recovered fraction for strain {strain} is {recovered} at t = {t} \
         (S = {susceptible}, I = {infected}), beyond tolerance {tolerance}"
    )]
    NegativeRecovered {
        strain: usize,
        t: f64,
        susceptible: f64,
        infected: f64,
        recovered: f64,
        tolerance: f64,
    },

    #[error("non-finite {quantity} for strain {strain} at t = {t}")]
    NonFiniteState {
        strain: usize,
        t: f64,
        quantity: &'static str,
    },

    #[error("adaptive step size {h} fell below minimum {min_step} at t = {t}")]
    StepSizeUnderflow { t: f64, h: f64, min_step: f64 },

    #[error("weather state does not match the forcing model: expected {expected}")]
    WeatherStateMismatch { expected: &'static str },
}

/// A single cross-field or per-field configuration problem.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigViolation {
    #[error("stochastic process noise and adaptive stepping are mutually exclusive")]
    StochasticAdaptive,

    #[error("partial noise correlation {corr} requires exactly two strains, got {strains}")]
    PartialCorrelation { corr: f64, strains: usize },

    #[error("strain count must be at least one")]
    NoStrains,

    #[error("{field} has length {actual}, expected {expected}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field}[{index}] = {value} must be non-negative and finite")]
    Negative {
        field: &'static str,
        index: usize,
        value: f64,
    },

    #[error("{field}[{index}] = {value} must be positive and finite")]
    NonPositiveEntry {
        field: &'static str,
        index: usize,
        value: f64,
    },

    #[error("{field}[{index}] = {value} must be finite")]
    NonFinite {
        field: &'static str,
        index: usize,
        value: f64,
    },

    #[error("{field}[{index}] = {value} must lie in ({min}, {max}]")]
    FractionOutOfRange {
        field: &'static str,
        index: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("initial fractions for strain {strain} sum to {total} > 1")]
    InitialOvercount { strain: usize, total: f64 },

    #[error("sigma[{row}][{col}] = {value} must lie in [0, 1]")]
    CrossImmunity { row: usize, col: usize, value: f64 },

    #[error("corr_proc = {value} must lie in [0, 1]")]
    Correlation { value: f64 },

    #[error("chaotic channel {channel} for strain {strain} exceeds the {available} Lorenz coordinates")]
    ChannelIndex {
        strain: usize,
        channel: usize,
        available: usize,
    },

    #[error("chaotic forcing amplitude eps[{strain}] = {value} must lie in [0, 1]")]
    ChaoticAmplitude { strain: usize, value: f64 },

    #[error("chaotic forcing is enabled but no climate extrema were supplied")]
    MissingExtrema,

    #[error("climate extrema cover {available} channels, channel {channel} requested")]
    ExtremaChannel { channel: usize, available: usize },
}

fn format_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
