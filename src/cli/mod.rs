//! Command-line interface for sweep-trigger.

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::{DetectionConfig, SweepTriggerConfig};
use crate::core::device::{DeviceError, RangefinderDevice};
use crate::core::types::{Detection, Measurement};
use crate::detector::{CancelToken, DetectionOutcome, Detector};
use crate::devices::{ReplayDevice, SimulatedObject, SyntheticRangefinder};
use crate::processors::ingest::{NearZeroBoundary, StartFlagBoundary, SweepBoundary};
use crate::trigger::{run_trigger_loop, TriggerSink};

#[derive(Parser)]
#[command(name = "sweep-trigger")]
#[command(about = "Single-sweep rangefinder object detection", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one detection call
    Detect {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Poll for detections until interrupted
    Watch {
        #[command(flatten)]
        source: SourceArgs,
        /// Stop after this many scan cycles
        #[arg(long)]
        cycles: Option<u64>,
        /// Use the [detection] thresholds instead of the polling profile
        #[arg(long)]
        standard_thresholds: bool,
    },

    /// Analyse every sweep of one recording
    Analyze {
        /// Recording CSV (angle_deg,distance_mm[,quality][,new_scan])
        recording: PathBuf,
        /// Write every classified object to this CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyse every recording in a directory in parallel
    Batch {
        /// Directory containing recording CSVs
        directory: PathBuf,
        /// Write every classified object from every recording to this CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Plot one sweep of a recording as a PNG scatter plot
    Plot {
        /// Recording CSV
        recording: PathBuf,
        /// Sweep to plot, starting at 1
        #[arg(short, long, default_value_t = 1)]
        sweep: usize,
        /// Output PNG file path (defaults to the recording name with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record simulated rotations to a CSV
    Simulate {
        /// Output recording CSV
        output: PathBuf,
        /// Simulated object as START:END:DISTANCE (repeatable)
        #[arg(long = "object", value_name = "START:END:DIST")]
        objects: Vec<SimulatedObject>,
        /// Angular step between readings in degrees
        #[arg(long, default_value_t = 1.0)]
        step: f64,
        /// Distance returned where no object is present
        #[arg(long)]
        background: Option<f64>,
        /// Number of full rotations to record
        #[arg(long, default_value_t = 4)]
        rotations: usize,
    },

    /// Write a config file with every default filled in
    InitConfig {
        /// Output YAML path
        #[arg(default_value = "sweep-trigger.yaml")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Where measurements come from.
#[derive(Args)]
struct SourceArgs {
    /// Replay a recorded CSV instead of simulating
    #[arg(long, conflicts_with = "objects")]
    replay: Option<PathBuf>,
    /// Restart the recording when it ends
    #[arg(long, requires = "replay")]
    loop_replay: bool,
    /// Simulated object as START:END:DISTANCE (repeatable)
    #[arg(long = "object", value_name = "START:END:DIST")]
    objects: Vec<SimulatedObject>,
    /// Angular step between simulated readings in degrees
    #[arg(long, default_value_t = 1.0)]
    step: f64,
    /// Simulated distance where no object is present
    #[arg(long)]
    background: Option<f64>,
    /// End sweeps on the device start-of-scan flag instead of near 0 deg
    #[arg(long)]
    start_flag: bool,
}

enum Source {
    Replay { measurements: Vec<Measurement>, looping: bool },
    Synthetic(SyntheticRangefinder),
}

impl Source {
    fn open(&self) -> Box<dyn RangefinderDevice> {
        match self {
            Source::Replay { measurements, looping } => {
                Box::new(ReplayDevice::new(measurements.clone()).looping(*looping))
            }
            Source::Synthetic(device) => Box::new(device.clone()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Source::Replay { measurements, .. } => format!("replay ({} measurements)", measurements.len()),
            Source::Synthetic(_) => "synthetic".to_string(),
        }
    }
}

impl SourceArgs {
    fn load(&self) -> anyhow::Result<Source> {
        use anyhow::Context;
        use crate::core::loaders::load_recording;

        match &self.replay {
            Some(path) => {
                let measurements = load_recording(path)
                    .with_context(|| format!("Failed to load recording: {}", path.display()))?;
                Ok(Source::Replay {
                    measurements,
                    looping: self.loop_replay,
                })
            }
            None => Ok(Source::Synthetic(synthetic(&self.objects, self.step, self.background))),
        }
    }

    fn boundary(&self) -> Boundary {
        if self.start_flag {
            Boundary::StartFlag(StartFlagBoundary)
        } else {
            Boundary::NearZero(NearZeroBoundary::default())
        }
    }
}

/// Sweep boundary picked on the command line.
#[derive(Debug, Clone, Copy)]
enum Boundary {
    NearZero(NearZeroBoundary),
    StartFlag(StartFlagBoundary),
}

impl SweepBoundary for Boundary {
    fn is_boundary(&mut self, measurement: &Measurement, normalized_angle_deg: f64) -> bool {
        match self {
            Boundary::NearZero(b) => b.is_boundary(measurement, normalized_angle_deg),
            Boundary::StartFlag(b) => b.is_boundary(measurement, normalized_angle_deg),
        }
    }
}

/// Prints each trigger to stdout.
struct ConsoleSink;

impl TriggerSink for ConsoleSink {
    fn on_detection(&mut self, detection: &Detection) -> anyhow::Result<()> {
        println!("TRIGGER  {}", detection);
        Ok(())
    }
}

fn synthetic(objects: &[SimulatedObject], step: f64, background: Option<f64>) -> SyntheticRangefinder {
    let device = SyntheticRangefinder::new(step).with_objects(objects.iter().copied());
    match background {
        Some(distance) => device.with_background(distance),
        None => device,
    }
}

fn build_detector(detection: DetectionConfig, config: &SweepTriggerConfig, boundary: Boundary) -> Detector<Boundary> {
    Detector::new(detection)
        .with_settle_delay(config.device.settle_delay())
        .with_boundary(boundary)
}

/// Thresholds for the polling loop: the loaded detection section, with the
/// trigger overrides applied unless standard thresholds were requested.
fn watch_detection_config(config: &SweepTriggerConfig, standard_thresholds: bool) -> DetectionConfig {
    if standard_thresholds {
        config.detection.clone()
    } else {
        config.trigger.detection_profile(&config.detection)
    }
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn outcome_items(outcome: &DetectionOutcome) -> Vec<(&'static str, String)> {
    match outcome {
        DetectionOutcome::Detected { detection, attempts } => vec![
            ("Result", "object detected".to_string()),
            ("Size class", detection.size_class.to_string()),
            ("Width", format!("{} mm", detection.width_mm)),
            ("Distance", format!("{} mm", detection.distance_mm)),
            ("Center angle", format!("{:.1} deg", detection.angle_center_deg)),
            ("Sweeps analysed", attempts.to_string()),
        ],
        DetectionOutcome::Exhausted { attempts } => vec![
            ("Result", "no valid object".to_string()),
            ("Sweeps analysed", attempts.to_string()),
        ],
        DetectionOutcome::Cancelled { attempts } => vec![
            ("Result", "cancelled".to_string()),
            ("Sweeps analysed", attempts.to_string()),
        ],
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match SweepTriggerConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                SweepTriggerConfig::default()
            }
        },
        None => SweepTriggerConfig::default(),
    };

    match cli.command {
        Commands::Detect { source } => cmd_detect(&source, &config),
        Commands::Watch {
            source,
            cycles,
            standard_thresholds,
        } => cmd_watch(&source, cycles, standard_thresholds, &config),
        Commands::Analyze { recording, output } => cmd_analyze(&recording, output.as_deref(), &config),
        Commands::Batch { directory, output } => cmd_batch(&directory, output.as_deref(), &config),
        Commands::Plot {
            recording,
            sweep,
            output,
        } => cmd_plot(&recording, sweep, output, &config),
        Commands::Simulate {
            output,
            objects,
            step,
            background,
            rotations,
        } => cmd_simulate(&output, &objects, step, background, rotations),
        Commands::InitConfig { output, force } => cmd_init_config(&output, force, &config),
    }
}

fn load_source(source: &SourceArgs) -> Source {
    match source.load() {
        Ok(s) => s,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_detect(source: &SourceArgs, config: &SweepTriggerConfig) {
    let start = Instant::now();
    let source_device = load_source(source);
    let detector = build_detector(config.detection.clone(), config, source.boundary());

    println!("Running one detection call...");
    println!("Source: {}", source_device.describe());

    let spinner = create_spinner("Scanning for objects...");

    match detector.run(source_device.open()) {
        Ok(outcome) => {
            spinner.finish_and_clear();

            let mut items = outcome_items(&outcome);
            items.push(("Duration", format!("{:.2?}", start.elapsed())));
            print_summary("Detection Complete", &items);
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Detection failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_watch(source: &SourceArgs, cycles: Option<u64>, standard_thresholds: bool, config: &SweepTriggerConfig) {
    use signal_hook::consts::{SIGINT, SIGTERM};

    let start = Instant::now();
    let source_device = load_source(source);

    let detection = watch_detection_config(config, standard_thresholds);

    let token = CancelToken::new();
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, token.flag()) {
            warn!("Failed to register signal handler: {}", e);
        }
    }

    let detector = build_detector(detection, config, source.boundary()).with_cancel_token(token.clone());

    println!("Starting detection loop (Ctrl-C to stop)...");
    println!("Source: {}", source_device.describe());
    println!("Scan interval: {} s", config.trigger.scan_interval_secs);
    println!("Debounce: {} s", config.trigger.debounce_secs);

    let open = || Ok::<_, DeviceError>(source_device.open());
    let stats = run_trigger_loop(open, &detector, &mut ConsoleSink, &config.trigger, &token, cycles);

    print_summary(
        "Detection Loop Stopped",
        &[
            ("Cycles", stats.cycles.to_string()),
            ("Detections", stats.detections.to_string()),
            ("Triggered", stats.triggered.to_string()),
            ("Debounced", stats.debounced.to_string()),
            ("Faults", stats.faults.to_string()),
            ("Sink failures", stats.sink_failures.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_analyze(recording: &Path, output: Option<&Path>, config: &SweepTriggerConfig) {
    use crate::core::writers::write_objects_csv;
    use crate::processors::batch::analyze_recording;

    let start = Instant::now();

    println!("Analysing recording...");
    println!("Input: {}", recording.display());

    let spinner = create_spinner("Analysing sweeps...");

    let summary = match analyze_recording(recording, &config.detection) {
        Ok(s) => s,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Analysis failed: {:#}", e);
            std::process::exit(1);
        }
    };

    spinner.finish_and_clear();

    for object in &summary.objects {
        println!(
            "  sweep {:>3}  object {:>2}  {:>5} at {:>6.0} mm  width {:>7.1} mm  {}{}",
            object.sweep,
            object.object,
            object.size_class.to_string(),
            object.avg_distance_mm,
            object.width_mm,
            object.direction,
            if object.qualifies { "  *" } else { "" }
        );
    }

    if let Some(path) = output {
        if let Err(e) = write_objects_csv(path, &summary.objects) {
            error!("Failed to write objects: {}", e);
            std::process::exit(1);
        }
    }

    let detector_result = match &summary.outcome {
        Some(outcome) => outcome_items(outcome)
            .first()
            .map(|(_, v)| v.clone())
            .unwrap_or_default(),
        None => "recording ended first".to_string(),
    };

    print_summary(
        "Analysis Complete",
        &[
            ("Input file", recording.display().to_string()),
            ("Measurements", summary.measurements.to_string()),
            ("Sweeps", summary.sweeps.to_string()),
            ("Objects", summary.objects.len().to_string()),
            ("Qualifying objects", summary.qualifying_objects().to_string()),
            ("Detector result", detector_result),
            (
                "Objects CSV",
                output.map_or("-".to_string(), |p| p.display().to_string()),
            ),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_batch(directory: &Path, output: Option<&Path>, config: &SweepTriggerConfig) {
    use crate::core::writers::write_objects_csv;
    use crate::processors::batch::analyze_directory;

    let start = Instant::now();

    println!("Analysing recordings in parallel...");
    println!("Input directory: {}", directory.display());

    let spinner = create_spinner("Analysing recordings...");

    let summaries = match analyze_directory(directory, &config.detection) {
        Ok(s) => s,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Batch analysis failed: {:#}", e);
            std::process::exit(1);
        }
    };

    spinner.finish_and_clear();

    for summary in &summaries {
        let result = match summary.outcome.as_ref().and_then(DetectionOutcome::detection) {
            Some(detection) => detection.to_string(),
            None => "no detection".to_string(),
        };
        println!("  {}: {}", summary.path.display(), result);
    }

    if let Some(path) = output {
        let objects: Vec<_> = summaries.iter().flat_map(|s| s.objects.iter().cloned()).collect();
        if let Err(e) = write_objects_csv(path, &objects) {
            error!("Failed to write objects: {}", e);
            std::process::exit(1);
        }
    }

    let detections = summaries
        .iter()
        .filter(|s| s.outcome.as_ref().is_some_and(|o| o.detection().is_some()))
        .count();

    print_summary(
        "Batch Analysis Complete",
        &[
            ("Input directory", directory.display().to_string()),
            ("Recordings", summaries.len().to_string()),
            (
                "Sweeps",
                summaries.iter().map(|s| s.sweeps).sum::<usize>().to_string(),
            ),
            ("With detection", detections.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_plot(recording: &Path, sweep: usize, output: Option<PathBuf>, config: &SweepTriggerConfig) {
    use crate::core::loaders;
    use crate::processors::ingest::split_sweeps;
    use crate::visualization;

    let start = Instant::now();

    // Determine output path (default to same name as input with .png extension)
    let output_path = output.unwrap_or_else(|| {
        let mut path = recording.to_path_buf();
        path.set_extension("png");
        path
    });

    println!("Plotting sweep {}...", sweep);
    println!("Input: {}", recording.display());
    println!("Output: {}", output_path.display());

    let measurements = match loaders::load_recording(recording) {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to load recording: {}", e);
            std::process::exit(1);
        }
    };

    let sweeps = split_sweeps(
        &measurements,
        config.detection.max_distance,
        NearZeroBoundary::default(),
    );
    let Some(samples) = sweep.checked_sub(1).and_then(|i| sweeps.get(i)) else {
        error!("Sweep {} not found, recording has {} complete sweeps", sweep, sweeps.len());
        std::process::exit(1);
    };

    match visualization::plot_sweep(&output_path, samples, &config.detection) {
        Ok(()) => {
            print_summary(
                "Plot Complete",
                &[
                    ("Input file", recording.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Sweep", format!("{} of {}", sweep, sweeps.len())),
                    ("Samples", samples.len().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Plot failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_simulate(output: &Path, objects: &[SimulatedObject], step: f64, background: Option<f64>, rotations: usize) {
    use crate::core::writers::write_recording;

    let start = Instant::now();

    if step <= 0.0 {
        error!("Step must be positive, got {}", step);
        std::process::exit(1);
    }

    let mut device = synthetic(objects, step, background);
    let per_rotation = (360.0 / step).round().max(1.0) as usize;

    let recorded: Result<Vec<Measurement>, DeviceError> = match device.start() {
        Ok(()) => device.measurements().take(per_rotation * rotations).collect(),
        Err(e) => Err(e),
    };

    let measurements = match recorded {
        Ok(m) => m,
        Err(e) => {
            error!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = write_recording(output, &measurements) {
        error!("Failed to write recording: {}", e);
        std::process::exit(1);
    }

    print_summary(
        "Simulation Complete",
        &[
            ("Output file", output.display().to_string()),
            ("Objects", objects.len().to_string()),
            ("Rotations", rotations.to_string()),
            ("Measurements", measurements.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_init_config(output: &Path, force: bool, config: &SweepTriggerConfig) {
    if output.exists() && !force {
        error!("{} already exists, pass --force to overwrite", output.display());
        std::process::exit(1);
    }

    match config.to_yaml(output) {
        Ok(()) => println!("Wrote config to {}", output.display()),
        Err(e) => {
            error!("Failed to write config: {}", e);
            std::process::exit(1);
        }
    }
}
