//! Operator console: command parsing, execution and output

mod console;
mod printer;

pub use console::{execute, read_commands, HELP};
pub use printer::Printer;

use crate::control::{Output, TransitionStyle};

/// Commands typed by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    /// Reload and print the scene list
    Scenes,
    Preview(String),
    Program(String),
    Take,
    /// `cut`, `fade` or `transition <name>`
    Transition(TransitionStyle),
    Transitions,
    Studio,
    Output { output: Output, start: bool },
    /// Open a projector for one scene
    Projector(String),
    /// Open Program, Preview and every scene projector
    Projectors,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let scene = |what: &str| -> Result<String, String> {
            if rest.is_empty() {
                Err(format!("{} requires a scene name", what))
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match word.to_lowercase().as_str() {
            "connect" => ConsoleCommand::Connect,
            "disconnect" => ConsoleCommand::Disconnect,
            "scenes" => ConsoleCommand::Scenes,
            "preview" => ConsoleCommand::Preview(scene("preview")?),
            "program" => ConsoleCommand::Program(scene("program")?),
            "take" => ConsoleCommand::Take,
            "cut" => ConsoleCommand::Transition(TransitionStyle::Cut),
            "fade" => ConsoleCommand::Transition(TransitionStyle::Fade),
            "transition" => {
                if rest.is_empty() {
                    return Err("transition requires a transition name".to_string());
                }
                ConsoleCommand::Transition(TransitionStyle::Named(rest.to_string()))
            }
            "transitions" => ConsoleCommand::Transitions,
            "studio" => ConsoleCommand::Studio,
            "record" | "stream" | "vcam" => {
                let output = match word.to_lowercase().as_str() {
                    "record" => Output::Record,
                    "stream" => Output::Stream,
                    _ => Output::VirtualCam,
                };
                let start = match rest.to_lowercase().as_str() {
                    "start" => true,
                    "stop" => false,
                    _ => return Err(format!("usage: {} start|stop", word)),
                };
                ConsoleCommand::Output { output, start }
            }
            "projector" => ConsoleCommand::Projector(scene("projector")?),
            "projectors" => ConsoleCommand::Projectors,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(format!("Unknown command '{}'. Type 'help'.", other)),
        };
        Ok(Some(command))
    }
}
