use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use geoframe::{
    ConversionReport, ConvertOptions, FailurePolicy, FfmpegFrameExtractor, FfmpegLogLevel,
    GpsTrack, MergedRecord, Pipeline, ProgressCallback, ProgressInfo, SamplingConfig,
    VideoMetadata, VideoProbe, gpx,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};

const CLI_AFTER_HELP: &str = "Examples:\n  geoframe convert ride.mp4 ride.gpx --interval 2\n  geoframe convert ride.mp4 ride.gpx --fps 1 --start 0:30 --end 5:00 --out stills --progress\n  geoframe plan ride.mp4 ride.gpx --fps 0.5 --json\n  geoframe probe ride.mp4\n  geoframe completions zsh > _geoframe";

#[derive(Debug, Parser)]
#[command(
    name = "geoframe",
    version,
    about = "Extract geotagged stills from a video and its GPS track",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, verbose, debug).
    #[arg(long, global = true)]
    ffmpeg_log_level: Option<FfmpegLogLevel>,
}

#[derive(Debug, Args, Clone)]
struct SamplingArgs {
    /// Start of the sampled range (seconds, MM:SS or HH:MM:SS). Defaults to 0.
    #[arg(long, value_parser = parse_seconds)]
    start: Option<f64>,

    /// End of the sampled range, exclusive. Defaults to the video duration.
    #[arg(long, value_parser = parse_seconds)]
    end: Option<f64>,

    /// Seconds between stills.
    #[arg(long, conflicts_with = "fps", required_unless_present = "fps")]
    interval: Option<f64>,

    /// Stills per second. Clamped to the video frame rate.
    #[arg(long)]
    fps: Option<f64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract stills and geotag them.
    #[command(
        about = "Extract geotagged stills",
        after_help = "Examples:\n  geoframe convert ride.mp4 ride.gpx --interval 2\n  geoframe convert ride.mp4 ride.gpx --fps 1 --best-effort --jobs 4 --progress"
    )]
    Convert {
        /// Input video.
        video: PathBuf,
        /// GPX track recorded alongside the video.
        gpx: PathBuf,
        #[command(flatten)]
        sampling: SamplingArgs,
        /// Output directory. Defaults to `res` next to the video.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Keep going when a frame fails and report the failures at the end.
        #[arg(long)]
        best_effort: bool,
        /// Frames processed at once (needs the `rayon` feature above 1).
        #[arg(long, default_value_t = 1)]
        jobs: usize,
        /// JPEG quality (1-100).
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show which frames would be extracted and where they would be placed.
    #[command(
        about = "Dry run: sample and synchronize without extracting",
        after_help = "Examples:\n  geoframe plan ride.mp4 ride.gpx --interval 5\n  geoframe plan ride.mp4 ride.gpx --fps 1 --json"
    )]
    Plan {
        video: PathBuf,
        gpx: PathBuf,
        #[command(flatten)]
        sampling: SamplingArgs,
        #[arg(long)]
        json: bool,
    },

    /// Print video metadata.
    #[command(about = "Print video metadata")]
    Probe {
        video: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse `SS[.fff]`, `MM:SS[.fff]` or `HH:MM:SS[.fff]` into seconds.
fn parse_seconds(value: &str) -> Result<f64, String> {
    let fields: Vec<&str> = value.trim().split(':').collect();
    if fields.len() > 3 || fields.iter().any(|field| field.is_empty()) {
        return Err(format!("'{value}' is not a time (expected SS, MM:SS or HH:MM:SS)"));
    }

    let (seconds_field, whole_fields) = fields.split_last().ok_or("empty time")?;
    let seconds: f64 = seconds_field
        .parse()
        .map_err(|_| format!("'{seconds_field}' is not a number of seconds"))?;
    let minutes = whole_fields.iter().try_fold(0_u64, |total, field| {
        field
            .parse::<u64>()
            .map(|part| total * 60 + part)
            .map_err(|_| format!("'{field}' is not a whole number"))
    })?;

    if !(seconds.is_finite() && seconds >= 0.0) || (!whole_fields.is_empty() && seconds >= 60.0) {
        return Err(format!("'{value}' is not a valid time"));
    }
    Ok(minutes as f64 * 60.0 + seconds)
}

impl SamplingArgs {
    fn to_config(&self) -> SamplingConfig {
        let mut config = SamplingConfig::new();
        if let Some(start) = self.start {
            config = config.with_start_time(start);
        }
        if let Some(end) = self.end {
            config = config.with_end_time(end);
        }
        if let Some(interval) = self.interval {
            config = config.with_time_interval(interval);
        }
        if let Some(fps) = self.fps {
            config = config.with_target_fps(fps);
        }
        config
    }
}

fn init_logging(global: &GlobalOptions) {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    geoframe::set_ffmpeg_log_level(global.ffmpeg_log_level.unwrap_or(FfmpegLogLevel::Error));
}

fn load_inputs(
    video: &Path,
    gpx_path: &Path,
) -> Result<(VideoMetadata, GpsTrack), Box<dyn std::error::Error>> {
    let metadata = VideoProbe::probe(video)?;
    let track = gpx::parse_gpx_file(gpx_path)?;
    Ok((metadata, track))
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg} (eta {eta})",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_length(info.total);
        self.bar.set_position(info.completed);
        if info.failed > 0 {
            self.bar.set_message(format!("{} failed", info.failed));
        } else if let Some(frame) = info.last_frame {
            self.bar.set_message(format!("frame {frame}"));
        }
    }
}

fn print_report(report: &ConversionReport) {
    for item in &report.info {
        eprintln!("{} {item}", "info:".cyan().bold());
    }
    for item in &report.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), item.yellow());
    }
    for failure in &report.failures {
        eprintln!("{} {}", "failed:".red().bold(), failure.to_string().red());
    }
}

fn report_json(report: &ConversionReport) -> Value {
    json!({
        "info": report.info,
        "warnings": report.warnings,
        "failures": report.failures.iter().map(|failure| json!({
            "frame_index": failure.frame_index,
            "elapsed_seconds": failure.elapsed_time.as_secs_f64(),
            "kind": format!("{:?}", failure.kind),
            "message": failure.message,
        })).collect::<Vec<_>>(),
    })
}

fn record_json(record: &MergedRecord) -> Value {
    json!({
        "frame_index": record.frame_index,
        "elapsed_seconds": record.elapsed_time.as_secs_f64(),
        "latitude": record.latitude,
        "longitude": record.longitude,
        "elevation": record.elevation,
        "extrapolated": record.extrapolated,
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match cli.command {
        Commands::Convert {
            video,
            gpx,
            sampling,
            out,
            best_effort,
            jobs,
            quality,
            progress,
            json,
        } => {
            let (metadata, track) = load_inputs(&video, &gpx)?;

            let mut options = ConvertOptions::new()
                .with_concurrency(jobs)
                .with_jpeg_quality(quality);
            if let Some(out) = out {
                options = options.with_output_directory(out);
            }
            if best_effort {
                options = options.with_failure_policy(FailurePolicy::BestEffort);
            }
            let terminal_progress = if progress {
                let terminal_progress = Arc::new(TerminalProgress::new()?);
                options = options.with_progress(terminal_progress.clone());
                Some(terminal_progress)
            } else {
                None
            };

            let extractor = FfmpegFrameExtractor::new(&video);
            let mut pipeline =
                Pipeline::new(&video, metadata, track, sampling.to_config()).with_options(options);
            let summary = pipeline.run(&extractor)?;

            if let Some(terminal_progress) = terminal_progress {
                terminal_progress.bar.finish_with_message("done");
            }

            if json {
                let payload = json!({
                    "output_directory": summary.output_directory,
                    "total": summary.total,
                    "written": summary.written,
                    "report": report_json(&summary.report),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_report(&summary.report);
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Wrote {} of {} geotagged still(s) to {}",
                        summary.written.len(),
                        summary.total,
                        summary.output_directory.display()
                    )
                    .green()
                );
            }

            summary.into_result()?;
        }
        Commands::Plan {
            video,
            gpx,
            sampling,
            json,
        } => {
            let (metadata, track) = load_inputs(&video, &gpx)?;
            let mut pipeline = Pipeline::new(&video, metadata, track, sampling.to_config());
            let plan = pipeline.plan()?;

            if json {
                let payload = json!({
                    "start_seconds": plan.sampling.start_time,
                    "end_seconds": plan.sampling.end_time,
                    "clip_fps": plan.sampling.clip_fps,
                    "time_interval": plan.sampling.time_interval,
                    "records": plan.records.iter().map(record_json).collect::<Vec<_>>(),
                    "report": report_json(&plan.report),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_report(&plan.report);
                println!(
                    "{:>8}  {:>10}  {:>12}  {:>12}  {:>9}",
                    "frame", "time (s)", "latitude", "longitude", "elevation"
                );
                for record in &plan.records {
                    println!(
                        "{:>8}  {:>10.3}  {:>12.7}  {:>12.7}  {:>9.2}{}",
                        record.frame_index,
                        record.elapsed_time.as_secs_f64(),
                        record.latitude,
                        record.longitude,
                        record.elevation,
                        if record.extrapolated { "  *" } else { "" }
                    );
                }
            }
        }
        Commands::Probe { video, json } => {
            let metadata = VideoProbe::probe(&video)?;
            if json {
                let payload = json!({
                    "total_frames": metadata.total_frames,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "frame_rate": metadata.frame_rate.to_string(),
                    "fps": metadata.frame_rate.as_f64(),
                    "creation_time": metadata.creation_time.map(|time| time.to_rfc3339()),
                    "width": metadata.width,
                    "height": metadata.height,
                    "codec": metadata.codec,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Duration: {:.3}s", metadata.duration.as_secs_f64());
                println!(
                    "Video: {}x{} @ {} ({:.3} fps) [{}]",
                    metadata.width,
                    metadata.height,
                    metadata.frame_rate,
                    metadata.frame_rate.as_f64(),
                    metadata.codec
                );
                println!("Frames: {}", metadata.total_frames);
                if let Some(creation_time) = metadata.creation_time {
                    println!("Created: {}", creation_time.to_rfc3339());
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "geoframe", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
