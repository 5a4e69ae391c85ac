use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

const MAX_GRID_POINTS: usize = 100_000;

/// Strictly increasing grid of hypothetical price shocks, eg/ `-0.30` for a 30% drawdown.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ShockGrid(Vec<f64>);

impl ShockGrid {
    pub fn new(points: Vec<f64>) -> Result<Self, ConfigError> {
        if points.is_empty() {
            return Err(ConfigError::InvalidGrid("grid is empty".to_string()));
        }
        if let Some(point) = points.iter().find(|point| !point.is_finite()) {
            return Err(ConfigError::InvalidGrid(format!(
                "grid point {point} is not finite"
            )));
        }
        if let Some(pair) = points.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::InvalidGrid(format!(
                "grid is not strictly increasing at {} -> {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self(points))
    }

    /// Inclusive `start..=end` in fixed steps, points rounded to 12 decimal places.
    pub fn stepped(start: f64, end: f64, step: f64) -> Result<Self, ConfigError> {
        if !(step.is_finite() && step > 0.0) {
            return Err(ConfigError::InvalidGrid(format!("step must be positive, got {step}")));
        }
        if !(start.is_finite() && end.is_finite() && start <= end) {
            return Err(ConfigError::InvalidGrid(format!(
                "start {start} must not exceed end {end}"
            )));
        }

        let intervals = ((end - start) / step + 1e-9).floor();
        if intervals >= MAX_GRID_POINTS as f64 {
            return Err(ConfigError::InvalidGrid(format!(
                "{start}..={end} in steps of {step} exceeds {MAX_GRID_POINTS} points"
            )));
        }

        let points = (0..=intervals as usize)
            .map(|index| round12(start + index as f64 * step))
            .collect();

        Self::new(points)
    }

    pub fn points(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<f64>> for ShockGrid {
    type Error = ConfigError;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShockGrid> for Vec<f64> {
    fn from(value: ShockGrid) -> Self {
        value.0
    }
}

fn round12(value: f64) -> f64 {
    (value * 1e12).round() / 1e12
}
