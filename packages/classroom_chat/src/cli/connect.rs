//! `chat connect`: interactive chat session on stdin/stdout.
//!
//! Plain lines are sent as messages to the current recipient. Commands:
//! `/to <id>`, `/as <id>`, `/typing`, `/quit`.

use std::time::Duration;

use anyhow::Result;
use chat_protocol::{Event, Identity};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::client::{ConnectionManager, TypingDebouncer};
use crate::config::ClientConfig;

/// How long to wait for trailing log entries (e.g. the close notice) on exit.
const LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    SetReceiver(&'a str),
    SetIdentity(&'a str),
    Typing,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line);
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "to" => Input::SetReceiver(arg),
        "as" => Input::SetIdentity(arg),
        "typing" => Input::Typing,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(name),
    }
}

/// Main entry point for `chat connect`.
pub async fn connect_command(
    config: ClientConfig,
    identity: String,
    receiver: Option<String>,
) -> Result<()> {
    let (manager, mut log_rx) = ConnectionManager::new(config.clone());
    let mut typing = TypingDebouncer::new(manager.clone(), config.typing_idle);
    if let Some(receiver) = receiver {
        typing.set_receiver(Some(Identity::new(receiver)?));
    }

    let printer = tokio::spawn(async move {
        while let Some(entry) = log_rx.recv().await {
            println!("{entry}");
        }
    });

    if let Err(e) = manager.set_identity(&identity).await {
        eprintln!("Could not connect as {identity}: {e}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Unknown(name) => eprintln!("Unknown command: /{name}"),
            Input::Typing => typing.notify_typing().await,
            Input::SetReceiver(id) => match Identity::new(id) {
                Ok(id) => {
                    eprintln!("Sending to {id}");
                    typing.set_receiver(Some(id));
                }
                Err(e) => eprintln!("Invalid recipient: {e}"),
            },
            Input::SetIdentity(id) => {
                if let Err(e) = manager.set_identity(id).await {
                    eprintln!("Could not connect as {id}: {e}");
                }
            }
            Input::Message(text) => {
                let Some(sender) = manager.identity().await else {
                    eprintln!("No identity set; use /as <id>");
                    continue;
                };
                let Some(receiver) = typing.receiver().cloned() else {
                    eprintln!("No recipient set; use /to <id>");
                    continue;
                };
                let event = Event::message(sender, receiver, text)
                    .with_timestamp(chrono::Utc::now().to_rfc3339());
                if let Err(e) = manager.send(event).await {
                    eprintln!("Message not sent: {e}");
                }
            }
        }
    }

    debug!("Leaving chat session");
    manager.close().await;
    drop(typing);
    drop(manager);
    let _ = tokio::time::timeout(LOG_DRAIN_TIMEOUT, printer).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_messages() {
        assert_eq!(parse_input("hello there"), Input::Message("hello there"));
        assert_eq!(parse_input("  padded  "), Input::Message("padded"));
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_input(""), Input::Empty);
        assert_eq!(parse_input("   "), Input::Empty);
    }

    #[test]
    fn commands() {
        assert_eq!(parse_input("/to u2"), Input::SetReceiver("u2"));
        assert_eq!(parse_input("/as   u1 "), Input::SetIdentity("u1"));
        assert_eq!(parse_input("/typing"), Input::Typing);
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/exit"), Input::Quit);
        assert_eq!(parse_input("/dance"), Input::Unknown("dance"));
    }

    #[test]
    fn command_without_argument_yields_empty_argument() {
        assert_eq!(parse_input("/to"), Input::SetReceiver(""));
        assert_eq!(parse_input("/as"), Input::SetIdentity(""));
    }
}
