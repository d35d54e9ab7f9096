//! Command-line interface and REPL
//!
//! The REPL runs on its own OS thread (rustyline blocks on stdin) and feeds
//! parsed commands into the async main loop over an unbounded channel, the
//! same way the other blocking work stays off the runtime.

use colored::*;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::warn;

use crate::counter::PoseLabel;

/// A user command entered at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Flip the counting gate
    ToggleCounting,
    /// Zero the rep count
    Reset,
    /// Capture one labeled training frame
    Capture(PoseLabel),
    /// Train the model from the stored samples
    Train,
    /// Print the status snapshot
    Status,
    /// Print the current rep count
    Count,
    /// Print command help (handled locally, never sent to the main loop)
    Help,
    /// Leave the application
    Quit,
}

/// Parse one input line.
///
/// Returns `Ok(None)` for blank input and `Err` with a user-facing message
/// for anything unrecognized.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let command = match tokens.as_slice() {
        [] => return Ok(None),
        ["toggle"] | ["t"] => Command::ToggleCounting,
        ["reset"] | ["r"] => Command::Reset,
        ["capture", "extended"] | ["capture", "e"] => Command::Capture(PoseLabel::Extended),
        ["capture", "contracted"] | ["capture", "c"] => Command::Capture(PoseLabel::Contracted),
        ["capture", other] => {
            return Err(format!(
                "Unknown pose '{}' (expected 'extended' or 'contracted')",
                other
            ))
        }
        ["capture"] => {
            return Err("Usage: capture <extended|contracted>".to_string());
        }
        ["train"] => Command::Train,
        ["status"] | ["s"] => Command::Status,
        ["count"] => Command::Count,
        ["help"] | ["h"] | ["?"] => Command::Help,
        ["quit"] | ["exit"] | ["q"] => Command::Quit,
        _ => return Err(format!("Unknown command: {}", line.trim())),
    };

    Ok(Some(command))
}

/// Render the command help.
pub fn help_text() -> String {
    format!(
        "{}\n  {}  flip automatic counting on/off\n  {}   zero the rep counter\n  {}  store a labeled training frame\n  {}   train the pose model from stored samples\n  {}  show counter, samples, and model state\n  {}   print the current rep count\n  {}    leave",
        "Commands:".bold(),
        "toggle (t)".cyan(),
        "reset (r)".cyan(),
        "capture <extended|contracted>".cyan(),
        "train".cyan(),
        "status (s)".cyan(),
        "count".cyan(),
        "quit".cyan(),
    )
}

/// Spawn the REPL thread.
///
/// The thread exits when the user quits, when stdin closes, or when the main
/// loop drops the receiving end of the channel.
pub fn spawn_repl(tx: mpsc::UnboundedSender<Command>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                warn!("Failed to initialize the prompt: {}, REPL disabled", e);
                return;
            }
        };

        println!("{}", help_text());

        loop {
            match rl.readline("repcam> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    match parse_command(trimmed) {
                        Ok(Some(Command::Help)) => println!("{}", help_text()),
                        Ok(Some(command)) => {
                            let quit = command == Command::Quit;
                            if tx.send(command).is_err() || quit {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(message) => println!("{}", message.yellow()),
                    }
                }
                // Ctrl-C / Ctrl-D / closed stdin all end the session.
                Err(_) => {
                    let _ = tx.send(Command::Quit);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(parse_command("toggle"), Ok(Some(Command::ToggleCounting)));
        assert_eq!(parse_command("t"), Ok(Some(Command::ToggleCounting)));
        assert_eq!(parse_command("reset"), Ok(Some(Command::Reset)));
        assert_eq!(parse_command("train"), Ok(Some(Command::Train)));
        assert_eq!(parse_command("status"), Ok(Some(Command::Status)));
        assert_eq!(parse_command("count"), Ok(Some(Command::Count)));
        assert_eq!(parse_command("quit"), Ok(Some(Command::Quit)));
        assert_eq!(parse_command("?"), Ok(Some(Command::Help)));
    }

    #[test]
    fn test_parse_capture() {
        assert_eq!(
            parse_command("capture extended"),
            Ok(Some(Command::Capture(PoseLabel::Extended)))
        );
        assert_eq!(
            parse_command("capture c"),
            Ok(Some(Command::Capture(PoseLabel::Contracted)))
        );
        assert!(parse_command("capture sideways").is_err());
        assert!(parse_command("capture").is_err());
    }

    #[test]
    fn test_parse_whitespace_and_unknown() {
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("  capture   extended  "),
            Ok(Some(Command::Capture(PoseLabel::Extended)))
        );
        assert!(parse_command("selfdestruct").is_err());
    }
}
