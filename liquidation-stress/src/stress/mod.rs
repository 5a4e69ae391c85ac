//! Stress curves: the kernel estimator driven over a grid of hypothetical price shocks.
//!
//! Every configured [`Horizon`] gets its own [`NadarayaWatson`] instance trained on pairs
//! aggregated over that horizon. Grid points are independent and are evaluated in parallel;
//! the curve is always returned in grid order.

use crate::{
    config::{Response, StressConfig},
    error::{ConfigError, StressError},
    kernel::{Bandwidth, Estimate, NadarayaWatson},
    panel::{Series, SeriesKey},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod grid;
pub mod horizon;

pub use grid::ShockGrid;
pub use horizon::Horizon;

/// Estimator output for a single grid point.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct StressCurvePoint {
    pub shock_magnitude: f64,
    pub estimated_count: f64,
    pub effective_sample_size: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
}

impl StressCurvePoint {
    pub fn from_estimate(estimate: &Estimate, band_multiplier: f64) -> Self {
        let (confidence_lower, confidence_upper) = estimate.band(band_multiplier);
        Self {
            shock_magnitude: estimate.query,
            estimated_count: estimate.mean,
            effective_sample_size: estimate.effective_sample_size,
            confidence_lower,
            confidence_upper,
        }
    }
}

/// Estimated response over a shock grid for one series and horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct StressCurve {
    series: SeriesKey,
    horizon: Horizon,
    bandwidth: Bandwidth,
    min_effective_sample_size: f64,
    points: Vec<StressCurvePoint>,
    excluded: Vec<f64>,
}

impl StressCurve {
    pub fn series(&self) -> &SeriesKey {
        &self.series
    }

    pub fn horizon(&self) -> Horizon {
        self.horizon
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    /// Estimated points in grid order, out-of-support shocks omitted.
    pub fn points(&self) -> &[StressCurvePoint] {
        &self.points
    }

    /// Grid shocks that had no kernel support and carry no estimate.
    pub fn excluded(&self) -> &[f64] {
        &self.excluded
    }

    /// Points whose estimate rests on fewer effective observations than configured.
    pub fn low_confidence(&self) -> impl Iterator<Item = &StressCurvePoint> {
        self.points
            .iter()
            .filter(|point| point.effective_sample_size < self.min_effective_sample_size)
    }

    pub fn is_low_confidence(&self, point: &StressCurvePoint) -> bool {
        point.effective_sample_size < self.min_effective_sample_size
    }
}

/// Produces [`StressCurve`]s for every configured horizon of a [`Series`].
#[derive(Debug, Clone, PartialEq)]
pub struct StressCurveGenerator {
    grid: ShockGrid,
    horizons: Vec<(Horizon, Bandwidth)>,
    band_multiplier: f64,
    min_effective_sample_size: f64,
    response: Response,
}

impl StressCurveGenerator {
    pub fn new(config: &StressConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            grid: config.grid()?,
            horizons: config.horizons()?,
            band_multiplier: config.band_multiplier,
            min_effective_sample_size: config.min_effective_sample_size,
            response: config.response,
        })
    }

    pub fn grid(&self) -> &ShockGrid {
        &self.grid
    }

    pub fn horizons(&self) -> impl Iterator<Item = Horizon> + '_ {
        self.horizons.iter().map(|(horizon, _)| *horizon)
    }

    /// One result per configured horizon, in configuration order.
    ///
    /// A horizon without training pairs yields [`StressError::EmptySample`] without affecting
    /// the other horizons.
    pub fn generate(&self, series: &Series) -> Vec<Result<StressCurve, StressError>> {
        self.horizons
            .iter()
            .map(|&(horizon, bandwidth)| {
                let sample = horizon.sample(series.records(), self.response);
                if sample.is_empty() {
                    return Err(StressError::EmptySample {
                        series: series.key().clone(),
                        horizon,
                    });
                }

                debug!(
                    key = %series.key(),
                    %horizon,
                    pairs = sample.len(),
                    bandwidth = bandwidth.value(),
                    "fitting kernel estimator"
                );

                let estimator = NadarayaWatson::new(sample, bandwidth);
                Ok(self.curve(series.key(), horizon, &estimator))
            })
            .collect()
    }

    /// Evaluate `estimator` at every grid point.
    pub fn curve(
        &self,
        series: &SeriesKey,
        horizon: Horizon,
        estimator: &NadarayaWatson,
    ) -> StressCurve {
        let estimates = self
            .grid
            .points()
            .par_iter()
            .map(|&shock| (shock, estimator.estimate(shock)))
            .collect::<Vec<_>>();

        let mut points = Vec::with_capacity(estimates.len());
        let mut excluded = Vec::new();
        for (shock, estimate) in estimates {
            match estimate {
                Ok(estimate) => {
                    if estimate.effective_sample_size < self.min_effective_sample_size {
                        debug!(
                            key = %series,
                            %horizon,
                            shock,
                            ess = estimate.effective_sample_size,
                            "low-confidence estimate"
                        );
                    }
                    points.push(StressCurvePoint::from_estimate(&estimate, self.band_multiplier))
                }
                Err(error) => {
                    warn!(key = %series, %horizon, shock, %error, "excluding shock from stress curve");
                    excluded.push(shock);
                }
            }
        }

        let curve = StressCurve {
            series: series.clone(),
            horizon,
            bandwidth: estimator.bandwidth(),
            min_effective_sample_size: self.min_effective_sample_size,
            points,
            excluded,
        };

        info!(
            key = %series,
            %horizon,
            points = curve.points.len(),
            excluded = curve.excluded.len(),
            low_confidence = curve.low_confidence().count(),
            "generated stress curve"
        );

        curve
    }
}
