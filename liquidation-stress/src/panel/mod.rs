//! Daily liquidation/return panel.
//!
//! Liquidation events are counted per (UTC date, chain, asset) and left-joined onto the full
//! calendar of each series, so a day without events is materialised as an explicit zero
//! rather than dropped. Closing prices are joined per date and turned into simple
//! percentage returns.

use crate::{
    config::{PriceStrategy, Registry},
    error::{ConfigError, StressError},
    event::{LiquidationEvent, PriceTable},
};
use chrono::NaiveDate;
use derive_more::Display;
use fnv::FnvHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Asymmetry of liquidation activity between down days and up days.
pub mod summary;

/// Identifies a single chain/asset series, eg/ `ethereum/ETH`.
#[derive(
    Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
#[display("{chain}/{asset}")]
pub struct SeriesKey {
    pub chain: SmolStr,
    pub asset: SmolStr,
}

impl SeriesKey {
    /// Chains are normalised to lowercase and assets to uppercase.
    pub fn new(chain: &str, asset: &str) -> Self {
        Self {
            chain: SmolStr::new(chain.to_ascii_lowercase()),
            asset: SmolStr::new(asset.to_ascii_uppercase()),
        }
    }

    /// Copy of this key with the case rules of [`SeriesKey::new`] applied.
    pub fn normalised(&self) -> Self {
        Self::new(&self.chain, &self.asset)
    }
}

/// One calendar day of a chain/asset series.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub chain: SmolStr,
    pub asset: SmolStr,
    pub liquidation_count: u64,
    /// Sum of the USD value of the day's events that reported one.
    pub liquidated_usd: f64,
    pub close: Option<f64>,
    /// `(close(t) - close(t-1)) / close(t-1)`, undefined without both closes.
    pub price_return: Option<f64>,
}

/// Contiguous daily records for one [`SeriesKey`].
#[derive(Clone, PartialEq, Debug)]
pub struct Series {
    key: SeriesKey,
    records: Vec<DailyRecord>,
}

impl Series {
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|record| record.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|record| record.date)
    }

    /// Days carrying a defined return, ie/ usable as same-day training pairs.
    pub fn usable_days(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.price_return.is_some())
            .count()
    }

    pub fn total_liquidations(&self) -> u64 {
        self.records
            .iter()
            .map(|record| record.liquidation_count)
            .sum()
    }
}

/// Output of the [`PanelBuilder`]: every series that could be built plus the data gaps of
/// those that could not.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Panel {
    series: Vec<Series>,
    gaps: Vec<StressError>,
}

impl Panel {
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&Series> {
        self.series.iter().find(|series| &series.key == key)
    }

    /// Per-series failures, one entry per series that could not be regressed.
    pub fn gaps(&self) -> &[StressError] {
        &self.gaps
    }

    pub fn records(&self) -> impl Iterator<Item = &DailyRecord> {
        self.series.iter().flat_map(|series| series.records.iter())
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct DayTally {
    count: u64,
    usd: f64,
}

/// Closing price lookup resolved from an asset's [`PriceStrategy`].
#[derive(Clone, Copy, Debug)]
enum Closes<'a> {
    Market(&'a BTreeMap<NaiveDate, f64>),
    Fixed(f64),
}

impl Closes<'_> {
    fn at(&self, date: NaiveDate) -> Option<f64> {
        match self {
            Closes::Market(closes) => closes.get(&date).copied(),
            Closes::Fixed(price) => Some(*price),
        }
    }

    fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            Closes::Market(closes) => closes
                .first_key_value()
                .zip(closes.last_key_value())
                .map(|((first, _), (last, _))| (*first, *last)),
            Closes::Fixed(_) => None,
        }
    }

    fn any_within(&self, start: NaiveDate, end: NaiveDate) -> bool {
        match self {
            Closes::Market(closes) => closes.range(start..=end).next().is_some(),
            Closes::Fixed(_) => true,
        }
    }
}

/// Builds [`Panel`]s from a liquidation event log and a [`PriceTable`].
#[derive(Clone, Debug)]
pub struct PanelBuilder {
    registry: Registry,
    window: Option<(NaiveDate, NaiveDate)>,
}

impl PanelBuilder {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            window: None,
        }
    }

    /// Pin the calendar span of every series to `start..=end`.
    pub fn with_window(self, start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidWindow { start, end });
        }
        Ok(Self {
            window: Some((start, end)),
            ..self
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Build the panel for the requested series.
    ///
    /// Fails fast with [`StressError::Config`] if any requested series is not configured.
    /// Series that cannot be built are recorded in [`Panel::gaps`] without aborting the rest.
    /// Keys are normalised and repeated keys are built once, at their first position.
    pub fn build(
        &self,
        keys: &[SeriesKey],
        events: &[LiquidationEvent],
        prices: &PriceTable,
    ) -> Result<Panel, StressError> {
        let keys = keys
            .iter()
            .map(SeriesKey::normalised)
            .unique()
            .collect::<Vec<_>>();

        let strategies = keys
            .iter()
            .map(|key| self.registry.check(key).map(|asset| &asset.price))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tallies = daily_tallies(events);

        let mut panel = Panel::default();
        for (key, strategy) in keys.iter().zip(strategies) {
            let tally = tallies.remove(key).unwrap_or_default();
            match self.build_series(key, strategy, &tally, prices) {
                Ok(series) => {
                    debug!(
                        %key,
                        days = series.records.len(),
                        usable_days = series.usable_days(),
                        liquidations = series.total_liquidations(),
                        "built daily series"
                    );
                    panel.series.push(series);
                }
                Err(error) => {
                    warn!(%key, %error, "skipping series");
                    panel.gaps.push(error);
                }
            }
        }

        if !tallies.is_empty() {
            debug!(
                unrequested_series = tallies.len(),
                "ignored liquidation events outside the requested series"
            );
        }

        info!(
            built = panel.series.len(),
            gaps = panel.gaps.len(),
            "built liquidation panel"
        );

        Ok(panel)
    }

    fn build_series(
        &self,
        key: &SeriesKey,
        strategy: &PriceStrategy,
        tally: &BTreeMap<NaiveDate, DayTally>,
        prices: &PriceTable,
    ) -> Result<Series, StressError> {
        let gap = |reason: String| StressError::DataGap {
            series: key.clone(),
            reason,
        };

        let closes = match strategy {
            PriceStrategy::Market { pair } => prices
                .series(&key.asset)
                .map(Closes::Market)
                .ok_or_else(|| gap(format!("no market closes for pair {pair}")))?,
            PriceStrategy::MarketOrFixed { fallback, .. } => prices
                .series(&key.asset)
                .map(Closes::Market)
                .unwrap_or(Closes::Fixed(*fallback)),
            PriceStrategy::Fixed { price } => Closes::Fixed(*price),
        };

        let event_span = tally
            .first_key_value()
            .zip(tally.last_key_value())
            .map(|((first, _), (last, _))| (*first, *last));

        let (start, end) = self
            .window
            .or(event_span)
            .or_else(|| closes.span())
            .ok_or_else(|| gap("no liquidation events or price history to anchor a calendar".to_string()))?;

        if !closes.any_within(start, end) {
            return Err(gap(format!("no price quotes between {start} and {end}")));
        }

        let records = start
            .iter_days()
            .take_while(|date| *date <= end)
            .map(|date| {
                let DayTally { count, usd } = tally.get(&date).copied().unwrap_or_default();
                let close = closes.at(date);
                let previous = date.pred_opt().and_then(|previous| closes.at(previous));

                DailyRecord {
                    date,
                    chain: key.chain.clone(),
                    asset: key.asset.clone(),
                    liquidation_count: count,
                    liquidated_usd: usd,
                    close,
                    price_return: simple_return(previous, close),
                }
            })
            .collect();

        Ok(Series {
            key: key.clone(),
            records,
        })
    }
}

/// Simple percentage return between two closes, undefined when either is missing or the
/// previous close is not strictly positive.
pub fn simple_return(previous: Option<f64>, close: Option<f64>) -> Option<f64> {
    match (previous, close) {
        (Some(previous), Some(close)) if previous > 0.0 => Some((close - previous) / previous),
        _ => None,
    }
}

fn daily_tallies(
    events: &[LiquidationEvent],
) -> FnvHashMap<SeriesKey, BTreeMap<NaiveDate, DayTally>> {
    let mut tallies: FnvHashMap<SeriesKey, BTreeMap<NaiveDate, DayTally>> =
        FnvHashMap::default();

    for event in events {
        let tally = tallies
            .entry(event.key())
            .or_default()
            .entry(event.date())
            .or_default();
        tally.count += 1;
        tally.usd += event.value_usd.unwrap_or(0.0);
    }

    tallies
}
