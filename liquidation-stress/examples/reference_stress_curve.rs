use liquidation_stress::{
    config::{GridConfig, StressConfig},
    kernel::{Bandwidth, HistoricalSample, NadarayaWatson},
    panel::SeriesKey,
    stress::{Horizon, StressCurveGenerator},
};
use tracing::info;

#[rustfmt::skip]
fn main() {
    // Initialise INFO Tracing log subscriber
    init_logging();

    // Same-day (return, liquidation count) pairs
    let sample = HistoricalSample::from_iter([
        (-0.10, 40.0),
        (-0.05, 20.0),
        (0.00, 10.0),
        (0.05, 8.0),
        (0.10, 5.0),
    ]);

    let generator = StressCurveGenerator::new(&StressConfig {
        grid: GridConfig { start: -0.30, end: 0.10, step: 0.02 },
        ..StressConfig::default()
    })
    .unwrap();

    let estimator = NadarayaWatson::new(sample, Bandwidth::new(0.05).unwrap());
    let curve = generator.curve(&SeriesKey::new("ethereum", "ETH"), Horizon::ONE_DAY, &estimator);

    for point in curve.points() {
        info!(
            shock = point.shock_magnitude,
            estimate = point.estimated_count,
            ess = point.effective_sample_size,
            lower = point.confidence_lower,
            upper = point.confidence_upper,
            low_confidence = curve.is_low_confidence(point),
            "stress point"
        );
    }
}

// Initialise an INFO `Subscriber` for `Tracing` logs and install it as the global default.
fn init_logging() {
    tracing_subscriber::fmt()
        // Filter messages based on the INFO
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Disable colours on release builds
        .with_ansi(cfg!(debug_assertions))
        // Install this Tracing subscriber as global default
        .init()
}
