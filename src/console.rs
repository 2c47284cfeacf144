//! Line commands from stdin as the local input source.

use log::{debug, warn};
use shared::{LocalCommand, UpgradeSlot, Vec2};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const USAGE: &str =
    "commands: move <x> <y> | aim <x> <y> | fire on|off | buy 1-4 | skip | restart | quit";

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command {0:?} ({})", USAGE)]
    Unknown(String),
    #[error("{command} expects {expected}")]
    BadArguments {
        command: &'static str,
        expected: &'static str,
    },
}

/// Parses one console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<LocalCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let parsed = match command.to_ascii_lowercase().as_str() {
        "move" | "m" => LocalCommand::Move(parse_vec("move", &args)?),
        "aim" | "a" => LocalCommand::Aim(parse_vec("aim", &args)?),
        "stop" => LocalCommand::Move(Vec2::ZERO),
        "fire" | "f" => match args.as_slice() {
            ["on"] | ["1"] => LocalCommand::Fire(true),
            ["off"] | ["0"] => LocalCommand::Fire(false),
            _ => {
                return Err(CommandError::BadArguments {
                    command: "fire",
                    expected: "on or off",
                })
            }
        },
        "buy" | "b" => {
            let slot = match args.as_slice() {
                [key] => key.parse::<u8>().ok().and_then(UpgradeSlot::from_key),
                _ => None,
            };
            LocalCommand::Buy(slot.ok_or(CommandError::BadArguments {
                command: "buy",
                expected: "a slot number from 1 to 4",
            })?)
        }
        "skip" => LocalCommand::SkipShop,
        "restart" => LocalCommand::Restart,
        "quit" | "q" | "exit" => LocalCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(parsed))
}

fn parse_vec(command: &'static str, args: &[&str]) -> Result<Vec2, CommandError> {
    let bad = CommandError::BadArguments {
        command,
        expected: "two numbers",
    };
    match args {
        [x, y] => match (x.parse::<f32>(), y.parse::<f32>()) {
            (Ok(x), Ok(y)) if x.is_finite() && y.is_finite() => Ok(Vec2::new(x, y)),
            _ => Err(bad),
        },
        _ => Err(bad),
    }
}

/// Reads stdin until it closes and forwards every parsed command.
///
/// When stdin ends the sender is kept alive, so a session without a
/// terminal keeps running until Ctrl+C.
pub fn spawn(local_tx: mpsc::UnboundedSender<LocalCommand>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Some(command)) => {
                        if local_tx.send(command).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{}", e),
                },
                Ok(None) => {
                    debug!("stdin closed");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
        local_tx.closed().await;
    });
}
