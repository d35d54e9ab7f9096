//! Repcam - webcam bicep-curl rep counter
//!
//! Grabs one camera frame per tick, classifies the arm pose with a trainable
//! SVM, and counts full extended→contracted cycles. Controlled from a console
//! REPL: toggle counting, capture labeled training frames, train, reset.

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod capture;
mod cli;
mod config;
mod controller;
mod counter;
mod vision;

use crate::capture::SampleStore;
use crate::cli::Command;
use crate::config::AppConfig;
use crate::controller::{Controller, Status};
use crate::counter::PoseLabel;
use crate::vision::{probe_cameras, CameraSource, Classifier, SvmClassifier};

/// Repcam - count bicep curls from a webcam feed
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available camera devices
    #[arg(long)]
    list_cameras: bool,

    /// Train the model from the sample folders and exit
    #[arg(long)]
    train: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting repcam...");
    info!("Configuration file: {}", args.config);

    if args.list_cameras {
        list_cameras_formatted();
        return Ok(());
    }

    let config = AppConfig::load(&args.config).await?;

    if args.train {
        train_once(&config).await?;
        return Ok(());
    }

    let camera = Arc::new(CameraSource::open(&config.camera)?);
    let classifier = Arc::new(SvmClassifier::new(&config.classifier));
    if !classifier.is_ready() {
        info!("No trained model found, capture samples and run `train`");
    }

    let controller = Controller::new(&config, camera, classifier);

    let shutdown_signal = shutdown_signal();
    run_app(controller, &config, shutdown_signal).await?;

    info!("Repcam shutdown complete");
    Ok(())
}

async fn run_app(
    controller: Controller,
    config: &AppConfig,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    info!("Starting main loop ({}ms tick)...", config.counting.tick_ms);

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let _repl = cli::spawn_repl(cmd_tx);

    let mut ticker = tokio::time::interval(Duration::from_millis(config.counting.tick_ms.max(1)));
    // A stalled camera grab must not cause a burst of catch-up ticks.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = controller.tick().await {
                    warn!("Tick failed: {:#}", e);
                }
            }

            Some(command) = cmd_rx.recv() => {
                if !handle_command(&controller, command).await {
                    break;
                }
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping main loop");
                break;
            }
        }
    }

    Ok(())
}

/// Execute one REPL command. Returns false when the loop should exit.
async fn handle_command(controller: &Controller, command: Command) -> bool {
    match command {
        Command::ToggleCounting => {
            let enabled = controller.toggle_counting().await;
            if enabled {
                println!("{}", "Counting enabled".green());
            } else {
                println!("{}", "Counting paused".yellow());
            }
        }
        Command::Reset => {
            controller.reset().await;
            println!("{}", "Counter reset to 0".green());
        }
        Command::Capture(label) => match controller.capture_sample(label).await {
            Ok(path) => println!(
                "Saved {} sample: {}",
                label.to_string().cyan(),
                path.display()
            ),
            Err(e) => println!("{}", format!("Capture failed: {e:#}").red()),
        },
        Command::Train => match controller.train().await {
            Ok(report) => println!("{} ({})", "Model trained".green().bold(), report),
            Err(e) => println!("{}", format!("Training failed: {e:#}").red()),
        },
        Command::Status => print_status(&controller.status().await),
        Command::Count => println!("{}", controller.count().await.to_string().bold()),
        // Help never reaches the main loop; the REPL thread prints it locally.
        Command::Help => println!("{}", cli::help_text()),
        Command::Quit => return false,
    }
    true
}

fn print_status(status: &Status) {
    println!("\n{}", "=== Repcam status ===".bold().cyan());
    println!(
        "  Counting:  {}",
        if status.counting {
            "enabled".green()
        } else {
            "paused".yellow()
        }
    );
    println!("  Reps:      {}", status.reps.to_string().bold());
    println!(
        "  Samples:   {} extended / {} contracted",
        status.extended_samples.to_string().green(),
        status.contracted_samples.to_string().green()
    );
    println!(
        "  Model:     {}",
        if status.model_ready {
            "trained".green()
        } else {
            "not trained".red()
        }
    );
    println!("  Ticks:     {}", status.ticks);
    println!(
        "  Session:   since {}",
        status.session_started.format("%H:%M:%S")
    );
}

fn list_cameras_formatted() {
    println!("\n{}", "=== Available cameras ===".bold().cyan());

    let found = probe_cameras(8);
    if found.is_empty() {
        println!("  {}", "No cameras detected".yellow());
        return;
    }
    for index in found {
        println!("  device {}", index.to_string().green());
    }
}

async fn train_once(config: &AppConfig) -> Result<()> {
    println!("\n{}", "=== Training pose model ===".bold().cyan());

    let store = SampleStore::new(&config.capture.data_dir, config.classifier.sample_size);
    let classifier = SvmClassifier::new(&config.classifier);

    let dataset = store.load_training_set()?;
    println!(
        "  Samples: {} extended / {} contracted",
        dataset.count(PoseLabel::Extended).to_string().green(),
        dataset.count(PoseLabel::Contracted).to_string().green()
    );

    let report = classifier.train(&dataset).await?;
    println!(
        "\n{}",
        format!(
            "✅ Model trained ({report}) and saved to {}",
            config.classifier.model_path
        )
        .green()
        .bold()
    );
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
