//! `visual_servo` command-line entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use visual_servo::actuator::ActuatorChannel;
use visual_servo::adapters::{MockTransport, SerialTransport, Transport};
use visual_servo::calibration::Calibration;
use visual_servo::camera::{FrameSource, ImageFileSource};
use visual_servo::clock::{CancelFlag, Clock, TokioClock};
use visual_servo::command::{hardware_check_sequence, parse_batch};
use visual_servo::config::{Settings, DEFAULT_CONFIG_PATH};
use visual_servo::dispatch::Dispatcher;
use visual_servo::servo::ServoController;
use visual_servo::session::{PassthroughCompiler, Session};
use visual_servo::vision::MarkerDetector;

#[derive(Parser)]
#[command(name = "visual_servo")]
#[command(about = "Point a servo at things it can see")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML). Environment variables prefixed with
    /// SERVO_ override it.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log commands instead of writing them to the serial port.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read command batches from stdin, one per line, until `quit`.
    Run,

    /// Execute one batch file.
    Exec {
        /// JSON array of command records.
        batch: PathBuf,
    },

    /// Print marker positions found in an image.
    Detect {
        /// Image to analyse.
        image: PathBuf,
    },

    /// Record the servo angles at the frame edges.
    Calibrate {
        /// Angle pointing at the left frame edge.
        #[arg(long)]
        left: u8,
        /// Angle pointing at the right frame edge.
        #[arg(long)]
        right: u8,
        /// Frame width in pixels.
        #[arg(long)]
        frame_width: u32,
        /// Output file; defaults to `calibration_path` from the config.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Cycle every LED and sweep the servo to check the board.
    Selftest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    match cli.command {
        Commands::Detect { image } => detect(&settings, &image),
        Commands::Calibrate {
            left,
            right,
            frame_width,
            out,
        } => {
            let path = out
                .or_else(|| settings.calibration_path.clone())
                .unwrap_or_else(|| PathBuf::from("calibration.json"));
            Calibration::new(left, right, frame_width)?.save(&path)?;
            println!("wrote {}", path.display());
            Ok(())
        }
        Commands::Run => {
            let cancel = watch_ctrl_c();
            let frames = ImageFileSource::from_settings(&settings.camera)?;
            let dispatcher = build_dispatcher(&settings, cli.dry_run, Box::new(frames), &cancel).await?;
            let mut session =
                Session::new(dispatcher, Box::new(PassthroughCompiler)).with_cancel_flag(cancel);

            println!("Enter a command batch (JSON array), or 'quit'.");
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let summary = session.run(stdin).await?;
            info!(batches = summary.batches, rejected = summary.rejected, "session finished");
            Ok(())
        }
        Commands::Exec { batch } => {
            let cancel = watch_ctrl_c();
            let text = std::fs::read_to_string(&batch)
                .with_context(|| format!("reading {}", batch.display()))?;
            let records = parse_batch(&text)?;
            let frames = ImageFileSource::from_settings(&settings.camera)?;
            let mut dispatcher =
                build_dispatcher(&settings, cli.dry_run, Box::new(frames), &cancel).await?;
            let report = dispatcher.execute(&records).await?;
            println!("{report}");
            Ok(())
        }
        Commands::Selftest => {
            let cancel = watch_ctrl_c();
            // Never acquired: the check sequence has no visual points.
            let frames = ImageFileSource::snapshot(&settings.camera.source);
            let mut dispatcher =
                build_dispatcher(&settings, cli.dry_run, Box::new(frames), &cancel).await?;
            let sequence: Vec<_> = hardware_check_sequence().into_iter().map(Ok).collect();
            let report = dispatcher.execute(&sequence).await?;
            println!("self-test done: {report}");
            Ok(())
        }
    }
}

fn detect(settings: &Settings, image: &Path) -> Result<()> {
    let frame = image::open(image)
        .with_context(|| format!("opening {}", image.display()))?
        .to_rgb8();
    let detections = MarkerDetector::from_settings(&settings.markers).detect(&frame);
    for (kind, position) in detections.iter() {
        match position {
            Some(point) => println!("{kind}: {point}"),
            None => println!("{kind}: not found"),
        }
    }
    Ok(())
}

async fn build_dispatcher(
    settings: &Settings,
    dry_run: bool,
    frames: Box<dyn FrameSource>,
    cancel: &CancelFlag,
) -> Result<Dispatcher> {
    let transport: Box<dyn Transport> = if dry_run {
        info!("dry run, commands are logged only");
        Box::new(MockTransport::new().echoing())
    } else {
        Box::new(SerialTransport::open(&settings.serial).await?)
    };

    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let mut servo = ServoController::new(
        frames,
        MarkerDetector::from_settings(&settings.markers),
        clock.clone(),
        settings.alignment,
    )
    .with_cancel_flag(cancel.clone());

    if let Some(path) = &settings.calibration_path {
        if path.exists() {
            let calibration = Calibration::load(path)
                .with_context(|| format!("loading calibration {}", path.display()))?;
            info!(bounds = ?calibration.bounds(), "calibration loaded");
            servo = servo.with_calibration(&calibration);
        } else {
            warn!(path = %path.display(), "calibration file not found, using full sweep");
        }
    }

    Ok(Dispatcher::new(ActuatorChannel::new(transport), servo, clock))
}

/// First Ctrl-C cancels the running alignment and ends the session: at once
/// when it is waiting at the prompt, otherwise after the current batch. A
/// second one exits immediately.
fn watch_ctrl_c() -> CancelFlag {
    let flag = CancelFlag::new();
    let watched = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current step");
            watched.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
    flag
}
