use chrono::NaiveDate;
use clap::Parser;
use liquidation_stress::{
    config::Config,
    error::StressError,
    io,
    panel::{PanelBuilder, SeriesKey, summary::AsymmetrySummary},
    stress::StressCurveGenerator,
};
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "liquidation-stress",
    version,
    about = "Build daily liquidation panels and write kernel-regression stress curves"
)]
struct Args {
    /// Liquidation events CSV: timestamp,chain,asset,value_usd
    #[arg(long, env = "STRESS_EVENTS")]
    events: PathBuf,

    /// Daily closes CSV: date,asset,close
    #[arg(long, env = "STRESS_PRICES")]
    prices: PathBuf,

    /// JSON run configuration, built-in Aave V3 registry and defaults when omitted
    #[arg(long, env = "STRESS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory receiving panel_*.csv and stress_*.csv artifacts
    #[arg(long, env = "STRESS_OUTPUT", default_value = "out")]
    output: PathBuf,

    /// Series to regress as chain/asset, eg/ ethereum/ETH. Every configured pair when omitted
    #[arg(long = "series", value_parser = parse_series_key)]
    series: Vec<SeriesKey>,

    /// First calendar day of every series (requires --end)
    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,

    /// Last calendar day of every series (requires --start)
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,

    /// Override the confidence band multiplier
    #[arg(long, env = "STRESS_BAND_MULTIPLIER")]
    band_multiplier: Option<f64>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Default)]
struct RunReport {
    series: usize,
    curves: usize,
    gaps: Vec<StressError>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialise logging
    init_logging(args.json_logs);

    match run(&args) {
        Ok(report) => {
            for gap in &report.gaps {
                warn!(%gap, "could not regress");
            }
            info!(
                series = report.series,
                curves = report.curves,
                gaps = report.gaps.len(),
                output = %args.output.display(),
                "stress run complete"
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(%error, fatal = error.is_fatal(), "stress run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<RunReport, StressError> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(band_multiplier) = args.band_multiplier {
        config.stress.band_multiplier = band_multiplier;
    }
    config.validate()?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(RunReport::default());
    }

    let generator = StressCurveGenerator::new(&config.stress)?;
    let builder = match (args.start, args.end) {
        (Some(start), Some(end)) => {
            PanelBuilder::new(config.registry.clone()).with_window(start, end)?
        }
        _ => PanelBuilder::new(config.registry.clone()),
    };
    let keys = if args.series.is_empty() {
        config.registry.series_keys()
    } else {
        args.series.clone()
    };

    let horizons = generator
        .horizons()
        .map(|horizon| horizon.to_string())
        .collect::<Vec<_>>();
    info!(
        series = keys.len(),
        grid_points = generator.grid().len(),
        ?horizons,
        band_multiplier = config.stress.band_multiplier,
        "starting stress run"
    );

    let events = io::read_events(&args.events)?;
    let prices = io::read_prices(&args.prices)?;
    info!(events = events.len(), closes = prices.len(), "loaded inputs");

    let panel = builder.build(&keys, &events, &prices)?;
    std::fs::create_dir_all(&args.output)?;

    let mut report = RunReport {
        gaps: panel.gaps().to_vec(),
        ..RunReport::default()
    };

    for series in panel.series() {
        let key = series.key();
        let path = io::write_panel(&args.output, series)?;
        report.series += 1;

        let summary = AsymmetrySummary::from_records(series.records());
        info!(
            %key,
            path = %path.display(),
            days = series.records().len(),
            usable_days = series.usable_days(),
            down_days = summary.down.days,
            down_mean = ?summary.down.mean,
            up_days = summary.up.days,
            up_mean = ?summary.up.mean,
            "wrote daily panel"
        );

        for result in generator.generate(series) {
            match result {
                Ok(curve) => {
                    let path = io::write_curve(&args.output, &curve)?;
                    report.curves += 1;
                    info!(
                        %key,
                        horizon = %curve.horizon(),
                        path = %path.display(),
                        "wrote stress curve"
                    );
                }
                Err(error) => {
                    warn!(%key, %error, "skipping horizon");
                    report.gaps.push(error);
                }
            }
        }
    }

    Ok(report)
}

fn parse_series_key(raw: &str) -> Result<SeriesKey, String> {
    match raw.split_once('/') {
        Some((chain, asset)) if !chain.is_empty() && !asset.is_empty() => {
            Ok(SeriesKey::new(chain, asset))
        }
        _ => Err(format!("expected chain/asset, got {raw:?}")),
    }
}

// Initialise an INFO `Subscriber` for `Tracing` logs and install it as the global default.
fn init_logging(json: bool) {
    let builder = tracing_subscriber::fmt()
        // Filter messages based on the INFO
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Disable colours on release builds
        .with_ansi(cfg!(debug_assertions));

    if json {
        builder.json().init()
    } else {
        builder.init()
    }
}
