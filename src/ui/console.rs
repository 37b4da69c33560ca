//! Reading commands from stdin and running them against the director

use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::control::Director;

use super::{ConsoleCommand, Printer};

pub const HELP: &str = "\
Commands:
  connect | disconnect            Open or close the OBS connection
  scenes                          Reload and list scenes
  preview <scene>                 Stage a scene on preview
  program <scene>                 Put a scene on program directly
  take                            Commit preview to program
  cut | fade | transition <name>  Choose the transition used by take
  transitions                     List available transitions
  studio                          Show whether studio mode is on
  record|stream|vcam start|stop   Toggle outputs
  projector <scene>               Open a projector for one scene
  projectors                      Open Program, Preview and scene projectors
  help | quit";

/// Forward parsed stdin lines to `tx`. End of input sends `Quit`.
pub async fn read_commands(tx: mpsc::Sender<ConsoleCommand>, printer: Printer) {
    let mut lines = LinesStream::new(BufReader::new(stdin()).lines());

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        };
        match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => {
                debug!("Console command: {:?}", command);
                if tx.send(command).await.is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(message) => printer.result("parse", false, &message),
        }
    }

    info!("Console input closed");
    let _ = tx.send(ConsoleCommand::Quit).await;
}

/// Run one command. The text is shown to the operator either way.
pub async fn execute(director: &Director, command: ConsoleCommand) -> Result<String, String> {
    match command {
        ConsoleCommand::Connect => director
            .connect()
            .await
            .map(|()| "Connected.".to_string())
            .map_err(|e| format!("Connection failed: {}", e)),
        ConsoleCommand::Disconnect => director
            .disconnect()
            .await
            .map(|()| "Disconnected.".to_string())
            .map_err(|e| format!("Disconnect failed: {}", e)),
        ConsoleCommand::Scenes => director
            .refresh_scenes()
            .await
            .map(|snapshot| {
                let lines: Vec<String> = snapshot
                    .scenes()
                    .iter()
                    .map(|scene| {
                        let mut marks = String::new();
                        if snapshot.program() == Some(scene.as_str()) {
                            marks.push_str(" [PGM]");
                        }
                        if snapshot.preview() == Some(scene.as_str()) {
                            marks.push_str(" [PVW]");
                        }
                        format!("  {}{}", scene, marks)
                    })
                    .collect();
                if lines.is_empty() {
                    "No scenes.".to_string()
                } else {
                    format!("Scenes:\n{}", lines.join("\n"))
                }
            })
            .map_err(|e| format!("Could not load scenes: {}", e)),
        ConsoleCommand::Preview(scene) => director
            .set_preview(&scene)
            .await
            .map(|()| format!("Preview: {}", scene))
            .map_err(|e| format!("Could not set preview: {}", e)),
        ConsoleCommand::Program(scene) => director
            .set_program(&scene)
            .await
            .map(|()| format!("Program: {}", scene))
            .map_err(|e| format!("Could not set program: {}", e)),
        ConsoleCommand::Take => director
            .take()
            .await
            .map(|outcome| {
                if outcome.fallback {
                    "Take done (studio transition failed, program set directly).".to_string()
                } else {
                    "Take done.".to_string()
                }
            })
            .map_err(|e| format!("Take failed: {}", e)),
        ConsoleCommand::Transition(style) => {
            let label = style.to_string();
            director
                .set_transition_style(style)
                .await
                .map(|()| format!("Transition: {}", label))
                .map_err(|e| format!("Could not set transition: {}", e))
        }
        ConsoleCommand::Transitions => director
            .transitions()
            .await
            .map(|names| {
                let current = director
                    .transition_controller()
                    .last_style()
                    .map(|style| style.to_string())
                    .unwrap_or_else(|| "-".to_string());
                format!("Transitions: {} (current: {})", names.join(", "), current)
            })
            .map_err(|e| format!("Could not list transitions: {}", e)),
        ConsoleCommand::Studio => {
            let controller = director.transition_controller();
            let pending = if controller.is_pending() {
                " A take is in progress."
            } else {
                ""
            };
            match director.studio_mode().await {
                Ok(on) => Ok(format!("Studio mode is {}.{}", on_off(on), pending)),
                Err(e) => match controller.studio_mode_hint() {
                    Some(on) => Err(format!(
                        "Could not read studio mode: {} (last reported: {})",
                        e,
                        on_off(on)
                    )),
                    None => Err(format!("Could not read studio mode: {}", e)),
                },
            }
        }
        ConsoleCommand::Output { output, start } => {
            let result = if start {
                director.start_output(output).await
            } else {
                director.stop_output(output).await
            };
            let verb = if start { "start" } else { "stop" };
            result
                .map(|()| format!("Requested {} {}.", output, verb))
                .map_err(|e| format!("Could not {} {}: {}", verb, output, e))
        }
        ConsoleCommand::Projector(scene) => director
            .open_projector(&scene)
            .await
            .map(|()| format!("Projector opened for '{}'.", scene))
            .map_err(|e| format!("Could not open projector: {}", e)),
        ConsoleCommand::Projectors => director
            .open_all_projectors()
            .await
            .map(|count| format!("Opened {} projectors.", count))
            .map_err(|e| format!("Could not open projectors: {}", e)),
        ConsoleCommand::Help => Ok(HELP.to_string()),
        ConsoleCommand::Quit => Ok(String::new()),
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
