//! Console output, either human-readable lines or one JSON object per line

use chrono::Local;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::control::{Notification, SceneCollection};
use crate::projector::Binding;

#[derive(Debug, Clone, Copy)]
pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print notifications until the notifier is dropped
    pub async fn run(self, mut notifications: broadcast::Receiver<Notification>) {
        loop {
            match notifications.recv().await {
                Ok(notification) => self.notification(&notification),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Console fell behind, {} notifications skipped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    pub fn notification(&self, notification: &Notification) {
        if self.json {
            match serde_json::to_string(notification) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize notification: {}", e),
            }
        } else {
            self.text(&render(notification));
        }
    }

    /// Outcome of an operator command
    pub fn result(&self, command: &str, ok: bool, message: &str) {
        if self.json {
            println!(
                "{}",
                json!({
                    "type": "commandResult",
                    "command": command,
                    "success": ok,
                    "message": message,
                })
            );
        } else if !message.is_empty() {
            self.text(message);
        }
    }

    fn text(&self, message: &str) {
        println!("[{}] {}", Local::now().format("%H:%M:%S"), message);
    }
}

fn render(notification: &Notification) -> String {
    match notification {
        Notification::StatusUpdate { state, message } => format!("{}: {}", state, message),
        Notification::SceneListUpdate { snapshot } => render_scenes(snapshot),
        Notification::ProgramChanged { scene } => format!("Program -> {}", scene),
        Notification::PreviewChanged { scene } => format!("Preview -> {}", scene),
        Notification::StudioModeChanged { enabled } => {
            format!("Studio mode {}", if *enabled { "enabled" } else { "disabled" })
        }
        Notification::TransitionChanged { transition } => format!("Transition -> {}", transition),
        Notification::ProjectorBindings { bindings } => render_bindings(bindings),
    }
}

fn render_scenes(snapshot: &SceneCollection) -> String {
    format!(
        "{} scenes: {} (program: {}, preview: {})",
        snapshot.scenes().len(),
        snapshot.scenes().join(", "),
        snapshot.program().unwrap_or("-"),
        snapshot.preview().unwrap_or("-"),
    )
}

fn render_bindings(bindings: &[Binding]) -> String {
    if bindings.is_empty() {
        return "No projectors found. Make sure they are open in OBS.".to_string();
    }
    let parts: Vec<String> = bindings
        .iter()
        .map(|b| format!("{} <- '{}'", b.slot, b.source.raw_name))
        .collect();
    format!("Projectors: {}", parts.join(", "))
}
