// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cadence - calendar-slotted social publishing and scheduled generation.
//!
//! This is the binary entry point: the long-running `serve` process plus
//! one-shot commands for external timers and operators.

mod app;
mod generation;
mod late;
mod serve;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use cadence_config::CadenceConfig;
use cadence_core::{CadenceError, SystemClock};
use cadence_queue::{QueueService, QueueSettings};

use crate::app::App;

/// Cadence - calendar-slotted social publishing and scheduled generation.
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the queue and schedule processors until interrupted.
    Serve,
    /// Run one pass of every processor and print the summaries as JSON.
    Tick,
    /// Preview the next free slot on a calendar.
    NextSlot {
        #[arg(long)]
        calendar: String,
        #[arg(long)]
        user: String,
    },
    /// Return queue items and schedules interrupted by a crash to service.
    Recover,
    /// Validate the configuration and exit.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => cadence_config::load_and_validate_path(path),
        None => cadence_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            cadence_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let Some(command) = cli.command else {
        println!("cadence: use --help for available commands");
        return;
    };

    if let Commands::Check = command {
        println!("cadence: config ok (service.name={})", config.service.name);
        return;
    }

    serve::init_tracing(&config.service.log_level);

    if let Err(e) = run(command, config).await {
        eprintln!("cadence: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: CadenceConfig) -> Result<(), CadenceError> {
    match command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Tick => {
            let app = App::from_config(&config).await?;
            let report = serve::run_tick(&app).await;
            app.storage.shutdown().await?;
            print_json(&report)
        }
        Commands::NextSlot { calendar, user } => {
            let clock = Arc::new(SystemClock);
            let storage = app::open_storage(&config, clock.clone()).await?;
            let queue = QueueService::new(
                storage.clone(),
                storage.clone(),
                storage,
                clock,
                QueueSettings::from(&config.queue),
            );
            match queue.next_available_slot(&calendar, &user).await? {
                Some(assignment) => print_json(&assignment),
                None => {
                    println!(
                        "no free slot in the next {} days",
                        config.queue.slot_horizon_days
                    );
                    Ok(())
                }
            }
        }
        Commands::Recover => {
            let app = App::from_config(&config).await?;
            let recovery = app.recover().await?;
            println!(
                "recovered {} queue item(s) and {} schedule(s)",
                recovery.queue_items, recovery.schedules
            );
            app.storage.shutdown().await
        }
        Commands::Check => Ok(()),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), CadenceError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CadenceError::Internal(format!("failed to render output: {e}")))?;
    println!("{json}");
    Ok(())
}
