use crate::{panel::SeriesKey, stress::Horizon};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// All errors generated in `liquidation-stress`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum StressError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("data gap for {series}: {reason}")]
    DataGap { series: SeriesKey, reason: String },

    #[error("no training pairs for {series} at horizon {horizon}")]
    EmptySample { series: SeriesKey, horizon: Horizon },

    #[error(
        "\
        OutOfSupport: shock {shock} is {nearest_distance} from the nearest observed return, \
        kernel weights underflow at bandwidth {bandwidth} \
    "
    )]
    OutOfSupport {
        shock: f64,
        nearest_distance: f64,
        bandwidth: f64,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("JSON error: {0}")]
    Json(String),
}

/// Configuration problems detected before any computation starts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum ConfigError {
    #[error("chain not present in registry: {0}")]
    UnknownChain(SmolStr),

    #[error("asset not present in registry: {0}")]
    UnknownAsset(SmolStr),

    #[error("bandwidth must be a positive finite real, got {0}")]
    InvalidBandwidth(f64),

    #[error("invalid shock grid: {0}")]
    InvalidGrid(String),

    #[error("invalid horizon: {0}")]
    InvalidHorizon(String),

    #[error("confidence band multiplier must be a non-negative finite real, got {0}")]
    InvalidBandMultiplier(f64),

    #[error("effective sample size threshold must be a non-negative finite real, got {0}")]
    InvalidMinEffectiveSampleSize(f64),

    #[error("asset {0} has a non-positive or non-finite fixed price")]
    InvalidFixedPrice(SmolStr),

    #[error("chain configured more than once: {0}")]
    DuplicateChain(SmolStr),

    #[error("asset configured more than once: {0}")]
    DuplicateAsset(SmolStr),

    #[error("calendar window start {start} is after end {end}")]
    InvalidWindow {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}

impl StressError {
    /// Determine if an error must abort the whole run rather than a single series or point.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_fatal(&self) -> bool {
        match self {
            StressError::Config(_) => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for StressError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<csv::Error> for StressError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value.to_string())
    }
}

impl From<serde_json::Error> for StressError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}
