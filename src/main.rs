//! obs-director
//!
//! Drives a remote OBS Studio instance over obs-websocket from an operator
//! console: preview/program switching, takes, transitions, outputs, and
//! discovery of the projector windows OBS opens.

mod config;
mod control;
mod error;
mod logging;
mod projector;
mod switcher;
mod ui;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use config::Config;
use control::{Director, Notifier};
use projector::{ProjectorPoller, SystemWindows};
use switcher::ObwsConnector;
use ui::{ConsoleCommand, Printer};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let (_log_guard, log_dir) = logging::init_logging()?;
    info!("obs-director starting, logging to {:?}", log_dir);

    let mut config = Config::load()?;
    config.apply_args(&args[1..])?;
    info!("Configuration loaded from {:?}", config.config_path());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config))?;

    info!("Shutdown complete");
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let notifier = Notifier::new();
    let printer = Printer::new(config.ui.json_output);
    let printer_handle = tokio::spawn(printer.run(notifier.subscribe()));

    let (director, router) = Director::build(&config, Arc::new(ObwsConnector), notifier.clone());
    tokio::spawn(router.run());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = ProjectorPoller::new(
        Arc::new(SystemWindows),
        director.session().clone(),
        director.store().clone(),
        notifier.clone(),
        &config.projector,
    );
    tokio::spawn(poller.run(shutdown_rx));

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<ConsoleCommand>(32);
    tokio::spawn(ui::read_commands(cmd_tx.clone(), printer));

    // Ctrl+C ends the command loop like `quit`
    let ctrl_c_tx = cmd_tx.clone();
    let handle = tokio::runtime::Handle::current();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        let tx = ctrl_c_tx.clone();
        handle.spawn(async move {
            let _ = tx.send(ConsoleCommand::Quit).await;
        });
    })?;

    if config.obs.connect_on_launch {
        let director = director.clone();
        tokio::spawn(async move {
            if let Err(e) = director.connect().await {
                error!("Initial connection failed: {}", e);
            }
        });
    } else {
        printer.result("connect", true, "Not connected. Type 'connect' to connect to OBS.");
    }

    while let Some(command) = cmd_rx.recv().await {
        match command {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => printer.result("help", true, ui::HELP),
            command => {
                // Each command on its own task so a slow remote call does not
                // block the console
                let director = director.clone();
                tokio::spawn(async move {
                    let label = format!("{:?}", command);
                    match ui::execute(&director, command).await {
                        Ok(message) => printer.result(&label, true, &message),
                        Err(message) => printer.result(&label, false, &message),
                    }
                });
            }
        }
    }

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    if director.session().is_connected() {
        if let Err(e) = director.disconnect().await {
            error!("Disconnect on shutdown failed: {}", e);
        }
    }
    // Let the printer flush the final status line
    tokio::task::yield_now().await;
    printer_handle.abort();
    Ok(())
}

fn print_help() {
    println!("obs-director - Operator console for OBS Studio");
    println!();
    println!("USAGE:");
    println!("    obs-director [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help             Print this help message");
    println!("        --host <HOST>      obs-websocket host (default: localhost)");
    println!("        --port <PORT>      obs-websocket port (default: 4455)");
    println!("        --password <PASS>  obs-websocket password");
    println!("        --no-connect       Do not connect on launch");
    println!("        --json             Print notifications as JSON lines");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG                Set log level (e.g., debug, info, warn)");
    println!("    OBS_DIRECTOR_LOG_PATH   Override the log directory");
}
