use crate::{config::Response, error::ConfigError, kernel::HistoricalSample, panel::DailyRecord};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Number of trailing days a shock and its liquidation response are aggregated over.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
#[display("{days}d")]
#[serde(try_from = "u32", into = "u32")]
pub struct Horizon {
    days: u32,
}

impl Horizon {
    pub const ONE_DAY: Self = Self { days: 1 };
    pub const SEVEN_DAY: Self = Self { days: 7 };

    pub fn new(days: u32) -> Result<Self, ConfigError> {
        if days == 0 {
            return Err(ConfigError::InvalidHorizon(
                "horizon must span at least one day".to_string(),
            ));
        }
        Ok(Self { days })
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    /// Defined daily returns a window needs before its compounded return is used.
    pub fn min_defined_returns(&self) -> usize {
        (self.days as usize / 2).max(1)
    }

    /// Training pairs for this horizon from the contiguous daily records of one series.
    ///
    /// The pair ending on day `t` uses the compounded return over the `days` records ending on
    /// `t` as the shock and the summed response over the same records. Windows that are not
    /// `days` consecutive calendar days, or that carry too few defined returns, yield no pair.
    pub fn sample(&self, records: &[DailyRecord], response: Response) -> HistoricalSample {
        let days = self.days as usize;

        records
            .windows(days)
            .filter(|window| {
                let span = window[days - 1].date - window[0].date;
                span.num_days() == i64::from(self.days) - 1
            })
            .filter_map(|window| {
                let (defined, shock) = window
                    .iter()
                    .filter_map(|record| record.price_return)
                    .fold((0usize, None), |(defined, shock), daily| {
                        let compounded = match shock {
                            None => daily,
                            Some(shock) => (1.0 + shock) * (1.0 + daily) - 1.0,
                        };
                        (defined + 1, Some(compounded))
                    });

                if defined < self.min_defined_returns() {
                    return None;
                }

                let total = window
                    .iter()
                    .map(|record| match response {
                        Response::Count => record.liquidation_count as f64,
                        Response::NotionalUsd => record.liquidated_usd,
                    })
                    .sum::<f64>();

                shock.map(|shock| (shock, total))
            })
            .collect()
    }
}

impl TryFrom<u32> for Horizon {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Horizon> for u32 {
    fn from(value: Horizon) -> Self {
        value.days
    }
}
