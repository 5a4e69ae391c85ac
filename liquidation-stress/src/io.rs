//! CSV adapters for the input tables and the output artifacts.
//!
//! Inputs:
//! - events: `timestamp,chain,asset,value_usd` with RFC 3339 timestamps.
//! - prices: `date,asset,close` with `YYYY-MM-DD` dates.
//!
//! Outputs, one file per series (panel) and per series & horizon (stress curve).

use crate::{
    error::StressError,
    event::{DailyClose, LiquidationEvent, PriceTable},
    panel::{Series, SeriesKey},
    stress::{Horizon, StressCurve},
};
use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

pub fn read_events(path: &Path) -> Result<Vec<LiquidationEvent>, StressError> {
    let events = read_events_from(std::fs::File::open(path)?)?;
    debug!(path = %path.display(), events = events.len(), "read liquidation events");
    Ok(events)
}

pub fn read_events_from<R: Read>(reader: R) -> Result<Vec<LiquidationEvent>, StressError> {
    csv::Reader::from_reader(reader)
        .deserialize::<LiquidationEvent>()
        .map(|record| record.map_err(StressError::from))
        .collect()
}

pub fn read_prices(path: &Path) -> Result<PriceTable, StressError> {
    let prices = read_prices_from(std::fs::File::open(path)?)?;
    debug!(path = %path.display(), closes = prices.len(), "read daily closes");
    Ok(prices)
}

pub fn read_prices_from<R: Read>(reader: R) -> Result<PriceTable, StressError> {
    csv::Reader::from_reader(reader)
        .deserialize::<DailyClose>()
        .collect::<Result<PriceTable, _>>()
        .map_err(StressError::from)
}

pub fn panel_file_name(key: &SeriesKey) -> String {
    format!("panel_{}_{}.csv", key.chain, key.asset)
}

pub fn curve_file_name(key: &SeriesKey, horizon: Horizon) -> String {
    format!("stress_{}_{}_{}.csv", key.chain, key.asset, horizon)
}

/// Write the daily records of `series` into `dir`, returning the file path.
pub fn write_panel(dir: &Path, series: &Series) -> Result<PathBuf, StressError> {
    let path = dir.join(panel_file_name(series.key()));
    write_panel_to(std::fs::File::create(&path)?, series)?;
    Ok(path)
}

pub fn write_panel_to<W: Write>(writer: W, series: &Series) -> Result<(), StressError> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in series.records() {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the points of `curve` into `dir`, returning the file path.
pub fn write_curve(dir: &Path, curve: &StressCurve) -> Result<PathBuf, StressError> {
    let path = dir.join(curve_file_name(curve.series(), curve.horizon()));
    write_curve_to(std::fs::File::create(&path)?, curve)?;
    Ok(path)
}

pub fn write_curve_to<W: Write>(writer: W, curve: &StressCurve) -> Result<(), StressError> {
    let mut writer = csv::Writer::from_writer(writer);
    if curve.points().is_empty() {
        writer.write_record([
            "shock_magnitude",
            "estimated_count",
            "effective_sample_size",
            "confidence_lower",
            "confidence_upper",
        ])?;
    }
    for point in curve.points() {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}
