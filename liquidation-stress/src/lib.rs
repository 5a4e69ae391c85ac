#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Liquidation Stress
//! Estimates how many lending-protocol liquidations to expect after a hypothetical price
//! shock.
//!
//! The pipeline:
//! * [`panel::PanelBuilder`] merges a liquidation event log with daily closes into a
//!   gap-free daily panel per chain/asset series.
//! * [`kernel::NadarayaWatson`] estimates `E[liquidations | return = x]` from the panel's
//!   `(return, liquidations)` pairs with a Gaussian kernel, reporting an effective sample size
//!   and a weighted standard error band with every estimate.
//! * [`stress::StressCurveGenerator`] evaluates independent estimators for each response
//!   horizon over a grid of shocks, producing [`stress::StressCurve`]s.
//!
//! ## Example
//! ```rust,no_run
//! use liquidation_stress::{
//!     config::Config,
//!     io,
//!     panel::PanelBuilder,
//!     stress::StressCurveGenerator,
//! };
//! use std::path::Path;
//!
//! fn main() -> Result<(), liquidation_stress::error::StressError> {
//!     let config = Config::default();
//!     let events = io::read_events(Path::new("data/events.csv"))?;
//!     let prices = io::read_prices(Path::new("data/prices.csv"))?;
//!
//!     let keys = config.registry.series_keys();
//!     let panel = PanelBuilder::new(config.registry.clone()).build(&keys, &events, &prices)?;
//!     let generator = StressCurveGenerator::new(&config.stress)?;
//!
//!     for series in panel.series() {
//!         for curve in generator.generate(series).into_iter().flatten() {
//!             io::write_curve(Path::new("out"), &curve)?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

/// Chain/asset registry, price strategies and estimator configuration.
pub mod config;

/// All [`Error`](std::error::Error)s generated in `liquidation-stress`.
pub mod error;

/// Input records: liquidation events and daily closes.
pub mod event;

/// CSV readers and writers.
pub mod io;

/// Nadaraya–Watson kernel regression.
pub mod kernel;

/// Daily liquidation/return panel.
pub mod panel;

/// Stress curve generation over a shock grid.
pub mod stress;
