use crate::panel::SeriesKey;
use chrono::{DateTime, NaiveDate, Utc};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Normalised on-chain liquidation event.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct LiquidationEvent {
    pub timestamp: DateTime<Utc>,
    pub chain: SmolStr,
    pub asset: SmolStr,
    /// Liquidated collateral value in USD, when the upstream extractor provides it.
    #[serde(default)]
    pub value_usd: Option<f64>,
}

impl LiquidationEvent {
    pub fn new(timestamp: DateTime<Utc>, chain: &str, asset: &str, value_usd: Option<f64>) -> Self {
        Self {
            timestamp,
            chain: SmolStr::new(chain),
            asset: SmolStr::new(asset),
            value_usd,
        }
    }

    /// Calendar day (UTC) the event belongs to.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(&self.chain, &self.asset)
    }
}

/// Daily closing price for an asset.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub asset: SmolStr,
    pub close: f64,
}

/// Daily closes keyed by uppercase asset symbol.
///
/// Prices are chain-agnostic: a single exchange pair prices the asset on every chain.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct PriceTable {
    closes: FnvHashMap<SmolStr, BTreeMap<NaiveDate, f64>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a close, replacing any existing quote for the same asset and date.
    pub fn insert(&mut self, asset: &str, date: NaiveDate, close: f64) {
        self.closes
            .entry(SmolStr::new(asset.to_ascii_uppercase()))
            .or_default()
            .insert(date, close);
    }

    pub fn series(&self, asset: &str) -> Option<&BTreeMap<NaiveDate, f64>> {
        self.closes
            .get(asset.to_ascii_uppercase().as_str())
            .filter(|closes| !closes.is_empty())
    }

    pub fn len(&self) -> usize {
        self.closes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<DailyClose> for PriceTable {
    fn from_iter<T: IntoIterator<Item = DailyClose>>(iter: T) -> Self {
        let mut table = Self::new();
        for DailyClose { date, asset, close } in iter {
            table.insert(&asset, date, close);
        }
        table
    }
}
