//! wattbus - coached indoor-cycling sessions
//!
//! CLI entry point for running a session and inspecting plans and topics.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use colored::*;
use eyre::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

use wattbus::cli::{Cli, Command, OutputFormat, get_log_path};
use wattbus::config::Config;
use wattbus::contract::MessageKind;
use wattbus::domain::TrainingPlan;
use wattbus::session::Session;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to the log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(namespace = %config.bus.namespace, "wattbus loaded config");

    match cli.command {
        Some(Command::Session {
            plan,
            tick_ms,
            duration_secs,
        }) => cmd_session(config, plan, tick_ms, duration_secs).await,
        Some(Command::Plan { plan, format }) => cmd_plan(&config, plan, format),
        Some(Command::Topics { format }) => cmd_topics(&config, format),
        Some(Command::Logs { follow, lines }) => cmd_logs(follow, lines),
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Plan from the command line, the config, or the built-in session
fn resolve_plan(config: &Config, plan: Option<PathBuf>) -> Result<TrainingPlan> {
    match plan {
        Some(path) => TrainingPlan::load(&path).context(format!("Failed to load plan from {}", path.display())),
        None => config.coach.load_plan(),
    }
}

/// Run all three agents until the plan ends, the duration passes or Ctrl+C
async fn cmd_session(
    mut config: Config,
    plan: Option<PathBuf>,
    tick_ms: Option<u64>,
    duration_secs: Option<u64>,
) -> Result<()> {
    if let Some(tick_ms) = tick_ms {
        config.coach.tick_ms = tick_ms;
    }
    let plan = resolve_plan(&config, plan)?;
    let tick = Duration::from_millis(config.coach.tick_ms);

    println!(
        "{} Starting session: {} segments, {}s of plan at {}ms per second",
        "▶".green(),
        plan.len(),
        plan.duration_seconds(),
        config.coach.tick_ms
    );

    let session = Session::launch(config.clone(), plan).await?;
    session.begin().await?;

    let limit = async {
        match duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = session.finished() => {
            println!("{} Plan completed", "✓".green());
        }
        _ = limit => {
            println!("{} Duration elapsed, stopping", "■".yellow());
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl+C");
            }
            println!("{} Interrupted, stopping", "■".yellow());
        }
    }

    let trainer = config.session.trainer.clone();
    if let Some(measurement) = session.coach().measurement(&trainer).await {
        println!(
            "  {} last reading: {} W ({}% FTP), {} rpm",
            trainer.cyan(),
            measurement.power_watts.map(|w| w.to_string()).unwrap_or_else(|| "-".to_string()),
            measurement.percent_ftp.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            measurement.cadence_rpm.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
        );
    }
    info!(tick = ?tick, "Session ending");

    session.shutdown().await?;
    println!("{} Session stopped", "✓".green());
    Ok(())
}

/// Print the effective plan
fn cmd_plan(config: &Config, plan: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let plan = resolve_plan(config, plan)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Text => {
            println!("{}", "Training plan".bold());
            println!("{:>8}  {:>6}  {:>7}  {}", "OFFSET", "POWER", "CADENCE", "LABEL");
            for segment in plan.segments() {
                println!(
                    "{:>7}s  {:>5}%  {:>7}  {}",
                    segment.offset_seconds,
                    segment.target_power_percent,
                    segment.target_cadence_rpm,
                    segment.label.cyan()
                );
            }
            println!();
            println!("{} segments, {}s total", plan.len(), plan.duration_seconds());
        }
    }
    Ok(())
}

/// Print the message catalog
fn cmd_topics(config: &Config, format: OutputFormat) -> Result<()> {
    let namespace = &config.bus.namespace;

    match format {
        OutputFormat::Json => {
            let catalog: Vec<_> = MessageKind::ALL
                .iter()
                .map(|kind| {
                    json!({
                        "topic": kind.topic(namespace),
                        "fields": kind.required_fields(),
                        "direction": kind.direction(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        OutputFormat::Text => {
            println!("{} {}", "Namespace:".bold(), namespace);
            for kind in MessageKind::ALL {
                let fields = kind.required_fields();
                let fields = if fields.is_empty() {
                    "(none)".dimmed().to_string()
                } else {
                    fields.join(", ")
                };
                println!("  {:<22} {:<10} {}", kind.command().cyan(), kind.direction().to_string(), fields);
            }
        }
    }
    Ok(())
}

/// Show the log file
fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    if follow {
        println!("Following log file: {} (Ctrl+C to stop)", log_path.display());
        println!();

        let mut child = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(&log_path)
            .spawn()
            .context("Failed to run tail -f")?;

        child.wait()?;
    } else {
        let file = fs::File::open(&log_path).context("Failed to open log file")?;
        let reader = BufReader::new(file);
        let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

        let start = all_lines.len().saturating_sub(lines);
        for line in &all_lines[start..] {
            println!("{}", line);
        }
    }

    Ok(())
}
