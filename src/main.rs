mod ui;

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use itertools::Itertools;
use log::{LevelFilter, error, info, warn};

use pawtrack::{
    PawtrackError,
    analysis::{Axis, TimeSeries, distribution, occupancy},
    config::AppConfig,
    discontinuity::{self, InterpolationMethod, RepairSettings},
    filter::{self, FilterConfig, FilterSettings},
    tracking::{TrackingFile, load_tracking_json},
    writer::{
        ExportFormat, timestamped_file_name, write_occupancy, write_time_series,
        write_tracking_json, write_zone_occupancy,
    },
    zones::{ZoneSet, zone_occupancy},
};
use ui::PoseViewerApp;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Log more, repeat for debug output
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Which keypoint track to analyse. Indices start at 0.
#[derive(clap::Args, Debug, Clone, Copy)]
struct TrackArgs {
    #[arg(short, long, default_value_t = 0)]
    animal: usize,

    #[arg(short, long, default_value_t = 0)]
    bodypart: usize,
}

#[derive(clap::Args, Debug, Clone, Default)]
struct RepairArgs {
    /// linear or nearest
    #[arg(long)]
    method: Option<InterpolationMethod>,

    /// Longest gap to fill, in frames
    #[arg(long)]
    max_gap: Option<usize>,

    /// Animals to repair, all when omitted
    #[arg(long, value_delimiter = ',')]
    animals: Vec<usize>,

    /// Confidence written on interpolated points
    #[arg(long)]
    interp_confidence: Option<f64>,
}

impl RepairArgs {
    fn settings(&self, config: &AppConfig) -> RepairSettings {
        let mut settings = config.repair.clone();
        if let Some(method) = self.method {
            settings.method = method;
        }
        if let Some(max_gap) = self.max_gap {
            settings.max_gap = max_gap;
        }
        if !self.animals.is_empty() {
            settings.selected_animals = self.animals.clone();
        }
        if let Some(confidence) = self.interp_confidence {
            settings.interp_confidence = confidence;
        }
        settings
    }
}

#[derive(clap::Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Filter config file with bodypart names and selection
    #[arg(long)]
    filter_config: Option<PathBuf>,

    /// Animals to keep, counted from the first
    #[arg(long)]
    num_animals: Option<usize>,

    /// Keypoints below this confidence are dropped
    #[arg(long)]
    threshold: Option<f64>,

    /// Bodypart indices to keep, all when omitted
    #[arg(long, value_delimiter = ',')]
    bodyparts: Vec<usize>,

    #[arg(long)]
    fps: Option<f64>,
}

impl FilterArgs {
    fn settings(&self, tracking: &TrackingFile) -> Result<FilterSettings, PawtrackError> {
        let mut settings = FilterSettings::for_data(tracking);
        if let Some(path) = &self.filter_config {
            settings = settings.with_config(&FilterConfig::load(path)?);
        }
        if let Some(num_animals) = self.num_animals {
            settings.num_animals = num_animals;
        }
        if let Some(threshold) = self.threshold {
            settings.confidence_threshold = threshold;
        }
        if !self.bodyparts.is_empty() {
            for (index, setting) in settings.bodyparts.iter_mut() {
                setting.include = self.bodyparts.contains(index);
            }
        }
        if let Some(fps) = self.fps {
            settings.fps = fps;
        }
        Ok(settings)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Frame, animal and bodypart counts of a tracking file
    Summary {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// List tracking gaps
    Detect {
        #[arg(short, long)]
        input: PathBuf,

        /// Animals to check, all when omitted
        #[arg(long, value_delimiter = ',')]
        animals: Vec<usize>,
    },
    /// Fill tracking gaps by interpolation
    Repair {
        #[arg(short, long)]
        input: PathBuf,

        /// Defaults to a timestamped file next to the input
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        repair: RepairArgs,

        /// Keep the interpolation confidence instead of writing 1.0
        #[arg(long)]
        keep_interp_confidence: bool,
    },
    /// Drop extra animals, low-confidence points and unselected bodyparts
    Filter {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Also write the settings used as a reusable filter config
        #[arg(long)]
        save_config: Option<PathBuf>,
    },
    /// Export one keypoint track as a time series
    Export {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        track: TrackArgs,

        /// csv or jsonl
        #[arg(short, long, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },
    /// Estimate where an animal spends its time
    Occupancy {
        #[arg(short, long)]
        input: PathBuf,

        /// CSV with one x,y,density row per grid point
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        track: TrackArgs,

        #[arg(long)]
        grid_size: Option<usize>,
    },
    /// Histogram of one coordinate
    Distribution {
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        track: TrackArgs,

        /// x or y
        #[arg(long, default_value = "x")]
        axis: Axis,

        #[arg(long)]
        bins: Option<usize>,
    },
    /// Zone definitions
    Zones {
        #[command(subcommand)]
        command: ZoneCommands,
    },
    /// User defaults
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Repair, filter and export every track to a directory
    Pipeline {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output_dir: PathBuf,

        #[command(flatten)]
        repair: RepairArgs,

        #[command(flatten)]
        filter: FilterArgs,

        #[arg(short, long, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },
    /// Open the viewer
    View {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ZoneCommands {
    /// Parse a zone file and print each zone's measurements
    Check {
        #[arg(short, long)]
        zones: PathBuf,
    },
    /// Time spent in each zone by one keypoint track
    Occupancy {
        #[arg(short, long)]
        zones: PathBuf,

        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        track: TrackArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write the default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
    /// Print the config in use
    Show,
}

fn load(input: &Path, config: &AppConfig) -> Result<TrackingFile, PawtrackError> {
    let mut tracking = load_tracking_json(input)?;
    if tracking.metadata.fps.is_none() {
        tracking.metadata.fps = Some(config.default_fps);
    }
    Ok(tracking)
}

fn summary(input: &Path, config: &AppConfig) -> Result<(), PawtrackError> {
    let tracking = load(input, config)?;
    println!("{}", tracking.summary());
    println!("FPS: {}", tracking.fps());
    let bodyparts = tracking
        .available_bodyparts()
        .into_iter()
        .map(|(index, name)| format!("{index}: {name}"))
        .join(", ");
    println!("Bodyparts with data: {bodyparts}");
    Ok(())
}

fn detect(input: &Path, animals: &[usize], config: &AppConfig) -> Result<(), PawtrackError> {
    let tracking = load(input, config)?;
    let found = discontinuity::detect(&tracking, animals);
    for gap in &found {
        println!("{gap}");
    }
    println!("{} discontinuities", found.len());
    Ok(())
}

fn repair(
    input: &Path,
    output: Option<PathBuf>,
    settings: &RepairSettings,
    normalize: bool,
    config: &AppConfig,
) -> Result<(), PawtrackError> {
    let tracking = load(input, config)?;
    let (processed, report) = discontinuity::repair(&tracking, settings);
    println!("{report}");

    let output = output.unwrap_or_else(|| {
        input.with_file_name(timestamped_file_name("processed_data", "json", chrono::Local::now()))
    });
    write_tracking_json(&output, &processed, normalize)?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn filter(
    input: &Path,
    output: &Path,
    args: &FilterArgs,
    save_config: Option<&Path>,
    config: &AppConfig,
) -> Result<(), PawtrackError> {
    let tracking = load(input, config)?;
    let settings = args.settings(&tracking)?;
    let filtered = filter::apply(&tracking, &settings);
    let before = tracking.summary();
    let after = filtered.summary();
    println!(
        "Frames: {} (was {}), animals: {} (limited from {})",
        after.num_frames, before.num_frames, after.num_animals, before.num_animals
    );
    write_tracking_json(output, &filtered, false)?;

    if let Some(path) = save_config {
        settings.to_config().save(path)?;
        println!("Saved filter config to {}", path.display());
    }
    Ok(())
}

fn export(
    input: &Path,
    output: &Path,
    track: TrackArgs,
    format: ExportFormat,
    config: &AppConfig,
) -> Result<(), PawtrackError> {
    let tracking = load(input, config)?;
    let series = TimeSeries::try_extract(&tracking, track.animal, track.bodypart)?;
    write_time_series(output, &series, format)?;
    println!("Exported {} rows to {}", series.rows.len(), output.display());
    Ok(())
}

fn estimate_occupancy(
    input: &Path,
    output: Option<&Path>,
    track: TrackArgs,
    grid_size: usize,
    config: &AppConfig,
) -> Result<(), PawtrackError> {
    let tracking = load(input, config)?;
    let series = TimeSeries::try_extract(&tracking, track.animal, track.bodypart)?;
    let grid = occupancy(&series, grid_size)?;
    if let Some((x, y, density)) = grid.peak() {
        println!("Most visited point: ({x:.1}, {y:.1}), density {density:.3e}");
    }
    if let Some(path) = output {
        write_occupancy(path, &grid)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn show_distribution(
    input: &Path,
    track: TrackArgs,
    axis: Axis,
    bins: usize,
    config: &AppConfig,
) -> Result<(), PawtrackError> {
    let tracking = load(input, config)?;
    let series = TimeSeries::try_extract(&tracking, track.animal, track.bodypart)?;
    let result = distribution(&series, axis, bins)?;
    println!("{} distribution of {} samples", axis, result.samples);
    for bin in &result.bins {
        println!(
            "[{:>10.2}, {:>10.2})  {:>6}  {:.4e}",
            bin.start, bin.end, bin.count, bin.density
        );
    }
    Ok(())
}

fn check_zones(path: &Path, config: &AppConfig) -> Result<(), PawtrackError> {
    let zones = ZoneSet::from_file(path, config.circle_resolution)?;
    for zone in zones.iter() {
        let (min_x, min_y, max_x, max_y) = zone.bounds();
        println!(
            "{}: area {:.2}, perimeter {:.2}, bounds ({:.2}, {:.2}, {:.2}, {:.2})",
            zone.name,
            zone.area(),
            zone.perimeter(),
            min_x,
            min_y,
            max_x,
            max_y
        );
    }
    Ok(())
}

fn zones_occupancy(
    zones_path: &Path,
    input: &Path,
    track: TrackArgs,
    output: Option<&Path>,
    config: &AppConfig,
) -> Result<(), PawtrackError> {
    let zones = ZoneSet::from_file(zones_path, config.circle_resolution)?;
    let tracking = load(input, config)?;
    let series = TimeSeries::try_extract(&tracking, track.animal, track.bodypart)?;
    let result = zone_occupancy(&series, &zones);
    for row in &result {
        println!(
            "{}: {} frames, {:.2} s ({:.1}%), {} entries",
            row.zone,
            row.frames_inside,
            row.seconds_inside,
            row.fraction_inside * 100.0,
            row.entries
        );
    }
    if let Some(path) = output {
        write_zone_occupancy(path, &result)?;
    }
    Ok(())
}

fn pipeline(
    input: &Path,
    output_dir: &Path,
    repair_settings: &RepairSettings,
    filter_args: &FilterArgs,
    format: ExportFormat,
    config: &AppConfig,
) -> Result<(), PawtrackError> {
    std::fs::create_dir_all(output_dir).map_err(|e| PawtrackError::WriterError { source: e })?;
    let tracking = load(input, config)?;

    let (processed, report) = discontinuity::repair(&tracking, repair_settings);
    info!("{}", report);
    let now = chrono::Local::now();
    write_tracking_json(
        &output_dir.join(timestamped_file_name("processed_data", "json", now)),
        &processed,
        true,
    )?;

    let filter_settings = filter_args.settings(&processed)?;
    let filtered = filter::apply(&processed, &filter_settings);
    write_tracking_json(
        &output_dir.join(timestamped_file_name("filtered_data", "json", now)),
        &filtered,
        false,
    )?;

    let num_animals = filtered.summary().num_animals;
    let mut written = 0;
    for (animal, (bodypart, name)) in (0..num_animals).cartesian_product(filtered.available_bodyparts()) {
        let series = TimeSeries::extract(&filtered, animal, bodypart);
        if series.valid_count() == 0 {
            warn!("No data left for animal {} {}, skipping", animal, name);
            continue;
        }
        let file_name = format!(
            "animal{}_{}.{}",
            animal,
            name.replace(|c: char| !c.is_ascii_alphanumeric(), "_"),
            format.extension()
        );
        write_time_series(&output_dir.join(file_name), &series, format)?;
        written += 1;
    }
    println!("{report}");
    println!("Exported {} tracks to {}", written, output_dir.display());
    Ok(())
}

fn init_config(force: bool) -> Result<(), PawtrackError> {
    let path = AppConfig::config_path()?;
    if path.exists() && !force {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    let path = AppConfig::default().save()?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn view(input: Option<PathBuf>, config: AppConfig) -> Result<(), PawtrackError> {
    eframe::run_native(
        "Pawtrack",
        eframe::NativeOptions::default(),
        Box::new(move |cc| {
            Ok(Box::new(match &input {
                Some(path) => PoseViewerApp::from_file(path, config, cc),
                None => PoseViewerApp::new(config, cc),
            }))
        }),
    )
    .map_err(|e| PawtrackError::ViewerError {
        message: e.to_string(),
    })
}

fn run(command: Commands, config: AppConfig) -> Result<(), PawtrackError> {
    match command {
        Commands::Summary { input } => summary(&input, &config),
        Commands::Detect { input, animals } => detect(&input, &animals, &config),
        Commands::Repair {
            input,
            output,
            repair: args,
            keep_interp_confidence,
        } => repair(
            &input,
            output,
            &args.settings(&config),
            !keep_interp_confidence,
            &config,
        ),
        Commands::Filter {
            input,
            output,
            filter: args,
            save_config,
        } => filter(&input, &output, &args, save_config.as_deref(), &config),
        Commands::Export {
            input,
            output,
            track,
            format,
        } => export(&input, &output, track, format, &config),
        Commands::Occupancy {
            input,
            output,
            track,
            grid_size,
        } => estimate_occupancy(
            &input,
            output.as_deref(),
            track,
            grid_size.unwrap_or(config.occupancy_grid_size),
            &config,
        ),
        Commands::Distribution {
            input,
            track,
            axis,
            bins,
        } => show_distribution(
            &input,
            track,
            axis,
            bins.unwrap_or(config.histogram_bins),
            &config,
        ),
        Commands::Zones { command } => match command {
            ZoneCommands::Check { zones } => check_zones(&zones, &config),
            ZoneCommands::Occupancy {
                zones,
                input,
                track,
                output,
            } => zones_occupancy(&zones, &input, track, output.as_deref(), &config),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Init { force } => init_config(force),
            ConfigCommands::Show => {
                let text = serde_json::to_string_pretty(&config)
                    .map_err(|e| PawtrackError::ConfigSerializeError { source: e })?;
                println!("{text}");
                Ok(())
            }
        },
        Commands::Pipeline {
            input,
            output_dir,
            repair: repair_args,
            filter: filter_args,
            format,
        } => pipeline(
            &input,
            &output_dir,
            &repair_args.settings(&config),
            &filter_args,
            format,
            &config,
        ),
        Commands::View { input } => view(input, config),
    }
}

fn main() {
    let cli = Args::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    colog::default_builder().filter(None, level).init();

    ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    })
    .unwrap_or_else(|e| warn!("Could not set Ctrl-C handler: {}", e));

    let config = match AppConfig::from_local_file() {
        Ok(Some(config)) => config,
        Ok(None) => AppConfig::default(),
        Err(e) => {
            warn!("Ignoring config file: {}", e);
            AppConfig::default()
        }
    };

    if let Err(e) = run(cli.command, config) {
        error!("{}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
