use anyhow::{bail, Context};
use clap::Parser;
use gpumetrics_rs_core::{GlobalConfig, OutputFormat, Sensor, SensorConfig, WaybarOutput};
use log::{debug, warn};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::time;

use gpumetrics_rs_amd_gpu::legend::legend;
use gpumetrics_rs_amd_gpu::render::{render_json, summary, TextReport};
use gpumetrics_rs_amd_gpu::{discover_cards, find_card, AmdgpuSensor, AsicFamily, CardEntry};

/// Key of this tool's section under `sensors` in the config file.
const SENSOR_NAME: &str = "amd-gpu";

#[derive(Parser)]
#[command(name = "gpumetrics-rs-amd-gpu")]
#[command(about = "Decode AMD gpu_metrics v1.3 snapshots and throttle reasons")]
#[command(version)]
struct Args {
    /// Scan all cards (default)
    #[arg(long, conflicts_with = "card")]
    all: bool,

    /// Show only card N
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=i64::from(i32::MAX)))]
    card: Option<u32>,

    /// Print the glossary and package map before the metrics
    #[arg(long)]
    legend: bool,

    /// Output format: text, json, waybar
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// ASIC family used for throttle_status bits
    #[arg(long)]
    asic: Option<AsicFamily>,

    /// DRM class directory to scan
    #[arg(long)]
    drm_root: Option<PathBuf>,

    /// Keep printing snapshots
    #[arg(short, long)]
    watch: bool,

    /// Update interval in milliseconds for watch mode
    #[arg(short, long)]
    interval: Option<u64>,

    /// Configuration file (defaults to the standard location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generate example config file and exit
    #[arg(long)]
    generate_config: bool,

    /// Check that a metrics file is available and exit
    #[arg(long)]
    check: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Effective settings after merging the config file and the command line.
struct Options {
    drm_root: PathBuf,
    card: Option<u32>,
    asic: AsicFamily,
    format: OutputFormat,
    legend: bool,
    sensor: SensorConfig,
}

impl Options {
    fn resolve(args: &Args, config: &GlobalConfig) -> anyhow::Result<Self> {
        let asic = match args.asic {
            Some(asic) => asic,
            None => config
                .asic
                .parse()
                .with_context(|| format!("invalid asic '{}' in config", config.asic))?,
        };

        let mut sensor = config.to_sensor_config(SENSOR_NAME);
        if let Some(interval) = args.interval {
            sensor.update_interval = interval;
        }
        if sensor.update_interval < SensorConfig::MIN_UPDATE_INTERVAL {
            bail!(
                "Update interval must be at least {}ms, got {}ms",
                SensorConfig::MIN_UPDATE_INTERVAL,
                sensor.update_interval
            );
        }

        Ok(Self {
            drm_root: args
                .drm_root
                .clone()
                .unwrap_or_else(|| config.drm_root.clone()),
            card: if args.all { None } else { args.card },
            asic,
            format: args.format.unwrap_or(config.output),
            legend: args.legend || config.show_legend,
            sensor,
        })
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GlobalConfig> {
    match path {
        Some(path) => GlobalConfig::load_from_file(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => Ok(GlobalConfig::load().unwrap_or_else(|e| {
            warn!("Ignoring config file: {e}");
            GlobalConfig::default()
        })),
    }
}

fn selected_cards(opts: &Options) -> anyhow::Result<Vec<CardEntry>> {
    match opts.card {
        Some(id) => match find_card(&opts.drm_root, id) {
            Some(card) => Ok(vec![card]),
            None => bail!("Card {id} not found or no gpu_metrics available"),
        },
        None => Ok(discover_cards(&opts.drm_root)?),
    }
}

/// Print one snapshot of every selected card. Cards that fail to read are
/// skipped with a warning.
fn print_snapshot(opts: &Options) -> anyhow::Result<()> {
    let cards = selected_cards(opts)?;
    let mut stdout = io::stdout().lock();
    let mut shown = 0;

    for card in &cards {
        let report = match card.read(opts.asic) {
            Ok(report) => report,
            Err(e) => {
                warn!("Skipping card {}: {e}", card.id);
                continue;
            }
        };
        debug!("card{}: {}", card.id, summary(&report));

        match opts.format {
            OutputFormat::Json => writeln!(stdout, "{}", render_json(card.id, &report)?)?,
            _ => write!(stdout, "\n{}", TextReport::new(card.id, &report))?,
        }
        shown += 1;
    }
    stdout.flush()?;

    if let Some(id) = opts.card {
        if shown == 0 {
            bail!("Card {id} not found or no gpu_metrics available");
        }
    }
    if shown == 0 {
        warn!("No gpu_metrics files found under {}", opts.drm_root.display());
    }
    Ok(())
}

fn print_waybar(output: &WaybarOutput) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string(output)?)?;
    stdout.flush()?;
    Ok(())
}

async fn run_waybar(opts: &Options, config: &GlobalConfig, watch: bool) -> anyhow::Result<()> {
    let mut sensor = AmdgpuSensor::new(
        &opts.drm_root,
        opts.card,
        opts.asic,
        config.temp_warning,
        config.temp_critical,
    )?;
    sensor.configure(opts.sensor.clone())?;
    debug!("Using {}", sensor.name());

    if !watch {
        return print_waybar(&sensor.read()?);
    }

    let mut interval = time::interval(opts.sensor.update_interval_duration());
    loop {
        interval.tick().await;

        match sensor.read() {
            Ok(output) => print_waybar(&output)?,
            // Keep the last line on screen and try again next tick.
            Err(e) if e.is_temporary() => debug!("Retrying after transient error: {e}"),
            Err(e) => {
                warn!("Error reading GPU metrics: {e}");
                let error_output = WaybarOutput::from_str("GPU Error")
                    .with_tooltip(format!("Error: {e}"))
                    .with_class("error");
                print_waybar(&error_output)?;
            }
        }
    }
}

async fn run_text(opts: &Options, watch: bool) -> anyhow::Result<()> {
    if opts.legend && opts.format == OutputFormat::Text {
        print!("{}", legend(opts.asic));
    }

    if !watch {
        return print_snapshot(opts);
    }

    let mut interval = time::interval(opts.sensor.update_interval_duration());
    loop {
        interval.tick().await;
        if let Err(e) = print_snapshot(opts) {
            warn!("{e:#}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.generate_config {
        let config_path = match args.config.clone().or_else(GlobalConfig::default_config_path) {
            Some(path) => path,
            None => bail!("Could not determine config directory"),
        };
        GlobalConfig::save_example_config_to_file(&config_path)?;
        println!("Generated example config at: {}", config_path.display());
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;
    let opts = Options::resolve(&args, &config)?;

    if args.check {
        let sensor = AmdgpuSensor::new(
            &opts.drm_root,
            opts.card,
            opts.asic,
            config.temp_warning,
            config.temp_critical,
        )?;
        sensor.check_availability()?;
        println!("card{} gpu_metrics is available", sensor.card_id());
        return Ok(());
    }

    match opts.format {
        OutputFormat::Waybar => run_waybar(&opts, &config, args.watch).await,
        OutputFormat::Text | OutputFormat::Json => run_text(&opts, args.watch).await,
    }
}
