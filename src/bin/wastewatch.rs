//! wastewatch - command-line front end for the waste detection dashboard.
//!
//! Subcommands:
//! 1. `health`: probe the backend
//! 2. `detect`: capture (file or synthetic camera), upload, and grade one image
//! 3. `alerts`: list, filter, and delete stored alerts
//! 4. `stats`: summary counters over the alert history

use anyhow::{anyhow, bail, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use wastewatch::alerts::{AlertQuery, ClassFilter, SortOrder};
use wastewatch::{
    ClientConfig, DashboardController, Facing, FileSource, ProcessOutcome, SyntheticCamera,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Capture, upload, and review waste detections"
)]
struct Args {
    /// Backend origin. Overrides the config file and WASTEWATCH_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the backend answers `GET /health`.
    Health,
    /// Process one image through capture, compress, upload, and classify.
    Detect(DetectArgs),
    /// Review stored alerts.
    #[command(subcommand)]
    Alerts(AlertsCommand),
    /// Summary counters over the alert history.
    Stats,
}

#[derive(ClapArgs, Debug)]
struct DetectArgs {
    /// Image file to upload.
    #[arg(long, conflicts_with = "camera")]
    file: Option<PathBuf>,

    /// Camera device to capture from. Only `synthetic` is built in.
    #[arg(long)]
    camera: Option<String>,

    /// Camera facing mode: environment (rear) or user (front).
    #[arg(long)]
    facing: Option<Facing>,
}

#[derive(Subcommand, Debug)]
enum AlertsCommand {
    /// List alerts, newest first by default.
    List {
        /// Case-insensitive substring matched against class labels.
        #[arg(long, default_value = "")]
        search: String,
        /// Only alerts containing exactly this class.
        #[arg(long)]
        class: Option<String>,
        /// newest or oldest.
        #[arg(long, default_value = "newest")]
        sort: SortOrder,
    },
    /// Distinct classes available for filtering.
    Classes,
    /// Delete the alert recorded at `timestamp`.
    Delete {
        timestamp: String,
        /// Confirm the deletion. Required.
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ClientConfig::load()?;
    if let Some(base_url) = args.base_url.as_deref() {
        config.set_base_url(base_url)?;
    }
    log::info!("backend: {}", config.base_url);

    match args.command {
        Command::Health => run_health(config),
        Command::Detect(detect) => run_detect(config, detect),
        Command::Alerts(alerts) => run_alerts(config, alerts),
        Command::Stats => run_stats(config),
    }
}

fn controller(config: ClientConfig) -> DashboardController<SyntheticCamera> {
    DashboardController::new(config, SyntheticCamera::default())
}

fn run_health(config: ClientConfig) -> Result<()> {
    let dashboard = controller(config);
    if dashboard.check_health() {
        println!("backend healthy");
        Ok(())
    } else {
        bail!("backend unreachable")
    }
}

fn run_detect(mut config: ClientConfig, args: DetectArgs) -> Result<()> {
    if let Some(facing) = args.facing {
        config.facing = facing;
    }
    let dashboard = controller(config);
    if !dashboard.check_health() {
        bail!("backend unreachable; start the server and try again");
    }

    let outcome = match (args.file, args.camera.as_deref()) {
        (Some(path), _) => {
            let mut source = FileSource::from_path(&path)?;
            dashboard.process_source(&mut source)
        }
        (None, Some("synthetic")) => {
            dashboard.start_camera()?;
            let outcome = dashboard.capture_and_process();
            dashboard.stop_camera();
            outcome
        }
        (None, Some(other)) => bail!("unknown camera '{}'; only 'synthetic' is built in", other),
        (None, None) => bail!("pass --file <path> or --camera synthetic"),
    };

    match outcome {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(err) => Err(anyhow!(err.user_message())),
    }
}

fn print_outcome(outcome: &ProcessOutcome) {
    let verdict = &outcome.verdict;
    println!(
        "{} {} [{}] ({} waste label(s))",
        verdict.icon,
        verdict.message,
        verdict.color.as_str(),
        verdict.waste_count
    );
    if outcome.detection.has_detections() {
        for class in &outcome.detection.detected_classes {
            match outcome.detection.confidences.get(class) {
                Some(confidence) => println!("  - {} ({:.0}%)", class, confidence * 100.0),
                None => println!("  - {}", class),
            }
        }
    } else {
        println!("  no objects detected");
    }
    if let Some(url) = &outcome.processed_image_url {
        println!("processed image: {}", url);
    }
}

fn run_alerts(config: ClientConfig, command: AlertsCommand) -> Result<()> {
    let base_url = config.base_url.clone();
    let dashboard = controller(config);
    match command {
        AlertsCommand::List {
            search,
            class,
            sort,
        } => {
            dashboard
                .refresh_alerts()
                .map_err(|e| anyhow!(e.user_message()))?;
            let query = AlertQuery {
                search_text: search,
                class_filter: class.map(ClassFilter::Only).unwrap_or_default(),
                sort,
            };
            let view = dashboard.alert_view(&query);
            if view.is_empty() {
                println!("no alerts found");
            }
            for alert in view {
                let image = alert
                    .image_url(&base_url)
                    .map(|url| url.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}  {}  {}", alert.timestamp, alert.classes.join(", "), image);
            }
            Ok(())
        }
        AlertsCommand::Classes => {
            dashboard
                .refresh_alerts()
                .map_err(|e| anyhow!(e.user_message()))?;
            for class in dashboard.alert_classes() {
                println!("{}", class);
            }
            Ok(())
        }
        AlertsCommand::Delete { timestamp, yes } => {
            if !yes {
                bail!("refusing to delete {} without --yes", timestamp);
            }
            dashboard
                .delete_alert(&timestamp)
                .map_err(|e| anyhow!(e.user_message()))?;
            println!("deleted alert {}", timestamp);
            Ok(())
        }
    }
}

fn run_stats(config: ClientConfig) -> Result<()> {
    let dashboard = controller(config);
    dashboard
        .refresh_alerts()
        .map_err(|e| anyhow!(e.user_message()))?;
    let stats = dashboard.stats();
    println!("total alerts:   {}", stats.total_alerts);
    println!("today:          {}", stats.today_alerts);
    println!(
        "camera:         {}",
        if stats.camera_active { "on" } else { "off" }
    );
    println!("last detection: {}", stats.last_detection_label());
    Ok(())
}
