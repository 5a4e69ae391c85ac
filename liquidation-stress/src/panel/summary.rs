use super::DailyRecord;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Liquidation statistics for one side of the return distribution.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct SideStats {
    pub days: usize,
    pub total: u64,
    /// `None` when the side has no days.
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

impl SideStats {
    fn from_counts(counts: Vec<u64>) -> Self {
        let days = counts.len();
        let total = counts.iter().sum::<u64>();
        let sorted = counts.into_iter().sorted_unstable().collect::<Vec<_>>();

        let median = match days {
            0 => None,
            n if n % 2 == 1 => Some(sorted[n / 2] as f64),
            n => Some((sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0),
        };

        Self {
            days,
            total,
            mean: (days > 0).then(|| total as f64 / days as f64),
            median,
        }
    }
}

/// Down-day vs up-day liquidation activity over the days with a defined return.
///
/// Zero-return days count as up days.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct AsymmetrySummary {
    pub down: SideStats,
    pub up: SideStats,
}

impl AsymmetrySummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a DailyRecord>) -> Self {
        let (down, up): (Vec<u64>, Vec<u64>) = records
            .into_iter()
            .filter_map(|record| {
                record
                    .price_return
                    .map(|price_return| (price_return, record.liquidation_count))
            })
            .partition_map(|(price_return, count)| {
                if price_return < 0.0 {
                    itertools::Either::Left(count)
                } else {
                    itertools::Either::Right(count)
                }
            });

        Self {
            down: SideStats::from_counts(down),
            up: SideStats::from_counts(up),
        }
    }

    /// Ratio of mean down-day to mean up-day liquidations.
    pub fn mean_ratio(&self) -> Option<f64> {
        match (self.down.mean, self.up.mean) {
            (Some(down), Some(up)) if up > 0.0 => Some(down / up),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use smol_str::SmolStr;

    fn record(day: u32, price_return: Option<f64>, count: u64) -> DailyRecord {
        DailyRecord {
            date: NaiveDate::from_ymd_opt(2025, 2, day).unwrap(),
            chain: SmolStr::new("ethereum"),
            asset: SmolStr::new("ETH"),
            liquidation_count: count,
            liquidated_usd: 0.0,
            close: None,
            price_return,
        }
    }

    #[test]
    fn test_asymmetry_summary() {
        let records = vec![
            record(1, None, 100),
            record(2, Some(-0.05), 40),
            record(3, Some(-0.02), 10),
            record(4, Some(-0.01), 20),
            record(5, Some(0.0), 3),
            record(6, Some(0.03), 5),
        ];

        let summary = AsymmetrySummary::from_records(&records);

        assert_eq!(
            summary.down,
            SideStats {
                days: 3,
                total: 70,
                mean: Some(70.0 / 3.0),
                median: Some(20.0),
            }
        );
        assert_eq!(
            summary.up,
            SideStats {
                days: 2,
                total: 8,
                mean: Some(4.0),
                median: Some(4.0),
            }
        );
        assert!(summary.mean_ratio().unwrap() > 5.0);
    }

    #[test]
    fn test_asymmetry_summary_empty_side() {
        let summary = AsymmetrySummary::from_records(&[record(1, Some(0.02), 7)]);
        assert_eq!(summary.down, SideStats::default());
        assert_eq!(summary.down.mean, None);
        assert_eq!(summary.up.median, Some(7.0));
        assert_eq!(summary.mean_ratio(), None);
    }
}
