//! Nadaraya–Watson kernel regression with a Gaussian kernel.
//!
//! For training pairs `(x_i, y_i)` and bandwidth `h`, the estimate at a query point `x*` is
//! the locally weighted mean `Σ w_i y_i / Σ w_i` with `w_i = exp(-((x* - x_i) / h)² / 2)`.
//! The kernel's normalising constant cancels in the ratio and is omitted.
//!
//! Weights are evaluated relative to the largest log-weight so the nearest observation always
//! carries weight `1.0`. A query whose nearest observation would still underflow the unshifted
//! weight is reported as [`StressError::OutOfSupport`] rather than extrapolated.

use crate::error::{ConfigError, StressError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `ln(f64::MIN_POSITIVE)`: unshifted weights below `exp` of this are subnormal or zero.
const MIN_LOG_WEIGHT: f64 = -708.396_418_532_264;

/// Kernel bandwidth `h > 0`, in return units.
///
/// Smaller bandwidths reduce bias and increase variance, larger bandwidths do the reverse.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Bandwidth(f64);

impl Bandwidth {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidBandwidth(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Bandwidth {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Bandwidth> for f64 {
    fn from(value: Bandwidth) -> Self {
        value.0
    }
}

/// Frozen `(return, response)` training pairs.
///
/// Cloning shares the underlying buffers; the pairs cannot be mutated once constructed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoricalSample {
    returns: Arc<[f64]>,
    responses: Arc<[f64]>,
}

impl HistoricalSample {
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    pub fn responses(&self) -> &[f64] {
        &self.responses
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.returns
            .iter()
            .copied()
            .zip(self.responses.iter().copied())
    }

    /// Unweighted mean response, the limit of every estimate as `h → ∞`.
    pub fn mean_response(&self) -> Option<f64> {
        (!self.is_empty())
            .then(|| self.responses.iter().sum::<f64>() / self.responses.len() as f64)
    }
}

impl FromIterator<(f64, f64)> for HistoricalSample {
    /// Pairs with a non-finite component are dropped.
    fn from_iter<T: IntoIterator<Item = (f64, f64)>>(iter: T) -> Self {
        let (returns, responses): (Vec<f64>, Vec<f64>) = iter
            .into_iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .unzip();

        Self {
            returns: returns.into(),
            responses: responses.into(),
        }
    }
}

/// Kernel estimate at a single query point.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Estimate {
    pub query: f64,
    /// `E[y | x = query]`.
    pub mean: f64,
    /// Kernel-weighted variance of the responses around `mean`.
    pub variance: f64,
    /// `(Σ w)² / Σ w²`, within `[1, n]`.
    pub effective_sample_size: f64,
}

impl Estimate {
    /// Weighted standard error `sqrt(variance / ess)`.
    pub fn standard_error(&self) -> f64 {
        (self.variance / self.effective_sample_size).sqrt()
    }

    /// Symmetric `mean ± multiplier * standard_error` band.
    pub fn band(&self, multiplier: f64) -> (f64, f64) {
        let half_width = multiplier * self.standard_error();
        (self.mean - half_width, self.mean + half_width)
    }
}

/// Nadaraya–Watson estimator over an immutable [`HistoricalSample`].
#[derive(Debug, Clone, PartialEq)]
pub struct NadarayaWatson {
    sample: HistoricalSample,
    bandwidth: Bandwidth,
}

impl NadarayaWatson {
    pub fn new(sample: HistoricalSample, bandwidth: Bandwidth) -> Self {
        Self { sample, bandwidth }
    }

    pub fn sample(&self) -> &HistoricalSample {
        &self.sample
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    /// Estimate the conditional mean response at `query`.
    ///
    /// Deterministic: summation always runs in sample order, so identical inputs produce
    /// bit-identical output.
    pub fn estimate(&self, query: f64) -> Result<Estimate, StressError> {
        let h = self.bandwidth.value();
        let log_weight = |x: f64| {
            let u = (query - x) / h;
            -0.5 * u * u
        };

        let (max_log_weight, nearest_distance) = self.sample.returns().iter().fold(
            (f64::NEG_INFINITY, f64::INFINITY),
            |(max_log_weight, nearest), &x| {
                (
                    max_log_weight.max(log_weight(x)),
                    nearest.min((query - x).abs()),
                )
            },
        );

        // Also rejects an empty sample and a non-finite query (max stays -inf or is NaN).
        if !(max_log_weight >= MIN_LOG_WEIGHT) {
            return Err(StressError::OutOfSupport {
                shock: query,
                nearest_distance,
                bandwidth: h,
            });
        }

        let weights = self
            .sample
            .returns()
            .iter()
            .map(|&x| (log_weight(x) - max_log_weight).exp())
            .collect::<Vec<f64>>();

        let (sum_w, sum_w2, sum_wy) = weights.iter().zip(self.sample.responses()).fold(
            (0.0, 0.0, 0.0),
            |(sum_w, sum_w2, sum_wy), (&w, &y)| (sum_w + w, sum_w2 + w * w, sum_wy + w * y),
        );

        let mean = sum_wy / sum_w;
        let variance = weights
            .iter()
            .zip(self.sample.responses())
            .map(|(&w, &y)| w * (y - mean) * (y - mean))
            .sum::<f64>()
            / sum_w;

        // Cauchy–Schwarz bounds the ratio by n, clamp away rounding above it.
        let effective_sample_size = (sum_w * sum_w / sum_w2).min(self.sample.len() as f64);

        Ok(Estimate {
            query,
            mean,
            variance,
            effective_sample_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_sample() -> HistoricalSample {
        HistoricalSample::from_iter([
            (-0.10, 40.0),
            (-0.05, 20.0),
            (0.0, 10.0),
            (0.05, 8.0),
            (0.10, 5.0),
        ])
    }

    fn estimator(sample: HistoricalSample, h: f64) -> NadarayaWatson {
        NadarayaWatson::new(sample, Bandwidth::new(h).unwrap())
    }

    #[test]
    fn test_bandwidth_new() {
        struct TestCase {
            input: f64,
            expected: Result<f64, ConfigError>,
        }

        let tests = vec![
            TestCase {
                // TC0: positive
                input: 0.012,
                expected: Ok(0.012),
            },
            TestCase {
                // TC1: zero
                input: 0.0,
                expected: Err(ConfigError::InvalidBandwidth(0.0)),
            },
            TestCase {
                // TC2: negative
                input: -0.5,
                expected: Err(ConfigError::InvalidBandwidth(-0.5)),
            },
            TestCase {
                // TC3: infinite
                input: f64::INFINITY,
                expected: Err(ConfigError::InvalidBandwidth(f64::INFINITY)),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Bandwidth::new(test.input).map(|bandwidth| bandwidth.value());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }

        assert!(Bandwidth::new(f64::NAN).is_err());
        assert!(serde_json::from_str::<Bandwidth>("-1.0").is_err());
        assert_eq!(
            serde_json::from_str::<Bandwidth>("0.02").unwrap(),
            Bandwidth::new(0.02).unwrap()
        );
    }

    #[test]
    fn test_sample_drops_non_finite_pairs() {
        let sample = HistoricalSample::from_iter([(0.01, 3.0), (f64::NAN, 1.0), (0.02, f64::INFINITY)]);
        assert_eq!(sample.len(), 1);
        assert_eq!(sample.iter().collect::<Vec<_>>(), vec![(0.01, 3.0)]);
        assert_eq!(sample.mean_response(), Some(3.0));
        assert_eq!(HistoricalSample::default().mean_response(), None);
    }

    #[test]
    fn test_reference_scenario_smooths_toward_neighbours() {
        let nw = estimator(reference_sample(), 0.05);

        let crash = nw.estimate(-0.10).unwrap();
        let rally = nw.estimate(0.10).unwrap();

        assert!(crash.mean > 20.0 && crash.mean < 40.0, "{crash:?}");
        assert!(crash.mean > rally.mean);
        assert!(crash.effective_sample_size > 1.0);
        assert!(crash.effective_sample_size < 5.0);
    }

    #[test]
    fn test_estimate_is_bit_identical_across_calls() {
        let nw = estimator(reference_sample(), 0.03);

        for query in [-0.3, -0.12, -0.0123, 0.0, 0.07] {
            let first = nw.estimate(query).unwrap();
            let second = nw.clone().estimate(query).unwrap();
            assert_eq!(first.mean.to_bits(), second.mean.to_bits());
            assert_eq!(first.variance.to_bits(), second.variance.to_bits());
            assert_eq!(
                first.effective_sample_size.to_bits(),
                second.effective_sample_size.to_bits()
            );
        }
    }

    #[test]
    fn test_effective_sample_size_bounds() {
        let sample = reference_sample();
        let n = sample.len() as f64;

        for h in [0.001, 0.01, 0.05, 0.5, 10.0, 1e6] {
            let nw = estimator(sample.clone(), h);
            for step in 0..=40 {
                let query = -0.30 + f64::from(step) * 0.01;
                match nw.estimate(query) {
                    Ok(estimate) => {
                        assert!(estimate.effective_sample_size >= 1.0, "h={h} x={query}");
                        assert!(estimate.effective_sample_size <= n, "h={h} x={query}");
                    }
                    Err(error) => assert!(
                        matches!(error, StressError::OutOfSupport { .. }),
                        "h={h} x={query}"
                    ),
                }
            }
        }
    }

    #[test]
    fn test_large_bandwidth_converges_to_unweighted_mean() {
        let sample = reference_sample();
        let mean = sample.mean_response().unwrap();
        let nw = estimator(sample, 1e6);

        for query in [-0.3, 0.0, 0.1] {
            let estimate = nw.estimate(query).unwrap();
            assert!((estimate.mean - mean).abs() < 1e-6, "{estimate:?}");
            assert!((estimate.effective_sample_size - 5.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_small_bandwidth_converges_to_nearest_response() {
        let sample = HistoricalSample::from_iter([
            (-0.05, 50.0),
            (0.0, 1.0),
            (0.030, 7.0),
            (0.08, 2.0),
        ]);
        let nw = estimator(sample, 1e-4);

        let estimate = nw.estimate(0.0301).unwrap();
        assert!((estimate.mean - 7.0).abs() < 1e-9, "{estimate:?}");
        assert!((estimate.effective_sample_size - 1.0).abs() < 1e-9);
        assert!(estimate.variance.abs() < 1e-9);
    }

    #[test]
    fn test_far_query_is_out_of_support() {
        let nw = estimator(reference_sample(), 0.001);

        let actual = nw.estimate(-0.30);

        match actual {
            Err(StressError::OutOfSupport {
                shock,
                nearest_distance,
                bandwidth,
            }) => {
                assert_eq!(shock, -0.30);
                assert!((nearest_distance - 0.20).abs() < 1e-12);
                assert_eq!(bandwidth, 0.001);
            }
            other => panic!("expected OutOfSupport, got {other:?}"),
        }

        assert!(matches!(
            estimator(HistoricalSample::default(), 0.05).estimate(0.0),
            Err(StressError::OutOfSupport { .. })
        ));
        assert!(matches!(
            nw.estimate(f64::NAN),
            Err(StressError::OutOfSupport { .. })
        ));
    }

    #[test]
    fn test_tail_query_stays_finite_when_raw_weights_would_underflow() {
        // Unshifted weights are ~1e-183 and their squares underflow to zero.
        let sample = HistoricalSample::from_iter([(0.0, 10.0), (0.001, 12.0)]);
        let nw = estimator(sample, 0.001);

        let estimate = nw.estimate(0.03).unwrap();

        assert!(estimate.mean.is_finite());
        assert!((estimate.mean - 12.0).abs() < 1e-9);
        assert!(estimate.effective_sample_size.is_finite());
        assert!(estimate.effective_sample_size >= 1.0);
    }

    #[test]
    fn test_confidence_band() {
        let constant = HistoricalSample::from_iter([(-0.02, 4.0), (0.0, 4.0), (0.02, 4.0)]);
        let flat = estimator(constant, 0.05).estimate(0.01).unwrap();
        assert_eq!(flat.band(1.96), (4.0, 4.0));

        let nw = estimator(reference_sample(), 0.05);
        let estimate = nw.estimate(-0.05).unwrap();
        let (lower, upper) = estimate.band(1.96);
        assert!(lower < estimate.mean && estimate.mean < upper);
        assert!((upper - estimate.mean - 1.96 * estimate.standard_error()).abs() < 1e-12);

        let (narrow_lower, narrow_upper) = estimate.band(1.0);
        assert!(narrow_upper - narrow_lower < upper - lower);
        assert_eq!(estimate.band(0.0), (estimate.mean, estimate.mean));
    }
}
