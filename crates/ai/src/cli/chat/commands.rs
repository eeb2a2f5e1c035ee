use crate::cli::ux::{ChatMessageType, Panel, style_chat_text, terminal_width};
use crate::svc::chat::Chat;
use ai_core::files;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_PANEL_WIDTH: usize = 80;

// -------------
// REPL commands
// -------------
#[derive(Parser, Debug)]
#[command(multicall = true)]
pub struct CliCommand {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Hash, PartialEq, Eq)]
pub enum Command {
    /// Clear conversation history
    Clear,
    /// Show a file and add it to the conversation
    Read {
        /// File to read
        path: String,
    },
    /// Write your next message to a file instead of sending it
    Write {
        /// File to write
        path: String,
    },
    /// Show the current model, or switch to another one.
    ///
    /// Takes an OpenRouter model id, e.g. "openai/gpt-4o-mini".
    #[command(alias = "m")]
    Model {
        /// Model to switch to
        name: Option<String>,
    },
    /// Exit the chat session
    #[command(alias = "q", alias = "quit")]
    Exit,
}

impl Command {
    /// Executes a REPL command.
    ///
    /// Returns `Ok(false)` if the REPL should exit.
    pub async fn execute(self, session: Arc<Mutex<Chat>>) -> Result<bool> {
        match self {
            Command::Clear => {
                session.lock().await.clear_messages();
                println!(
                    "{}",
                    style_chat_text("Conversation history cleared.", ChatMessageType::Info)
                );
            }
            Command::Read { ref path } => self.execute_read(session, path).await,
            Command::Write { ref path } => {
                session.lock().await.set_pending_write(path);
                let msg = format!("Next message will be written to {path}");
                println!("{}", style_chat_text(&msg, ChatMessageType::Info));
            }
            Command::Model { ref name } => self.execute_model(session, name).await,
            Command::Exit => {
                println!("{}", style_chat_text("Goodbye!", ChatMessageType::Info));
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn execute_read(&self, session: Arc<Mutex<Chat>>, path: &str) {
        match files::read_file(path) {
            Ok(content) => {
                let width = terminal_width().unwrap_or(DEFAULT_PANEL_WIDTH);
                println!("{}", Panel::new(path, &content).render(width));
                session.lock().await.add_file_context(path, &content);
            }
            Err(e) => {
                let error_msg = format!("Error reading file: {e}");
                eprintln!("{}", style_chat_text(&error_msg, ChatMessageType::Error));
            }
        }
    }

    async fn execute_model(&self, session: Arc<Mutex<Chat>>, name: &Option<String>) {
        let mut chat_guard = session.lock().await;
        match name {
            Some(name) => match chat_guard.set_model(name) {
                Ok(()) => println!("Model switched to: {}", chat_guard.model_name()),
                Err(e) => {
                    let error_msg = format!("Error switching model: {e}");
                    eprintln!("{}", style_chat_text(&error_msg, ChatMessageType::Error));
                }
            },
            None => println!("Current model: {}", chat_guard.model_name()),
        }
    }
}

/// Writes `content` to the file armed by `/write`.
pub fn complete_pending_write(path: &str, content: &str) {
    match files::write_file(path, content) {
        Ok(written) => {
            let msg = format!("Successfully wrote to {}", written.display());
            println!("{}", style_chat_text(&msg, ChatMessageType::Success));
        }
        Err(e) => {
            let error_msg = format!("Error writing file: {e}");
            eprintln!("{}", style_chat_text(&error_msg, ChatMessageType::Error));
        }
    }
}

/// Splits a command line into clap arguments.
///
/// The command word is lowercased. `/read` and `/write` take the rest of the
/// line as one path, so names with spaces or stray quotes need no escaping.
///
/// Returns `None` when the command word looks like a path, e.g. `/tmp/clear`.
/// Multicall would otherwise dispatch on its file stem.
pub fn parse_command_line(line: &str) -> Option<Vec<String>> {
    let trimmed_line = line.trim();
    let (command, rest) = match trimmed_line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command.to_lowercase(), rest.trim()),
        None => (trimmed_line.to_lowercase(), ""),
    };

    let name = command.strip_prefix('/').unwrap_or(&command);
    if name.contains(['/', '.', '\\']) {
        debug!("Rejecting path-like command {command}");
        return None;
    }

    if rest.is_empty() {
        return Some(vec![command]);
    }

    if command == "/read" || command == "/write" {
        let path = match shlex::split(rest) {
            Some(parts) if parts.len() == 1 => parts.into_iter().next().unwrap_or_default(),
            _ => rest.to_string(),
        };
        return Some(vec![command, path]);
    }

    let mut args = vec![command];
    match shlex::split(rest) {
        Some(parts) => args.extend(parts),
        None => {
            debug!("Unbalanced quotes in command, splitting on whitespace");
            args.extend(rest.split_whitespace().map(str::to_string));
        }
    }
    Some(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::chat::test_utils::{MockModel, mock_chat};
    use ai_core::completion::SenderType;
    use tempfile::tempdir;

    fn parse(line: &str) -> std::result::Result<Command, clap::Error> {
        let args = parse_command_line(line).unwrap_or_default();
        CliCommand::try_parse_from(args).map(|c| c.command)
    }

    fn split(line: &str) -> Vec<String> {
        parse_command_line(line).unwrap()
    }

    #[test]
    fn test_parse_command_line() {
        assert_eq!(split("  /CLEAR  "), vec!["/clear"]);
        assert_eq!(split("/Model openai/gpt-4o"), vec!["/model", "openai/gpt-4o"]);
        assert_eq!(split("/read my notes.txt"), vec!["/read", "my notes.txt"]);
        assert_eq!(
            split("/write \"quoted name.md\""),
            vec!["/write", "quoted name.md"]
        );
        assert_eq!(split("/read don't.txt"), vec!["/read", "don't.txt"]);
    }

    #[test]
    fn test_path_like_commands_are_rejected() {
        assert!(parse_command_line("/tmp/clear").is_none());
        assert!(parse_command_line("/etc/exit").is_none());
        assert!(parse_command_line("/clear.txt").is_none());
        assert!(parse_command_line("/usr/bin/read notes.md").is_none());
        assert!(parse("/tmp/clear").is_err());
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(parse("/clear").unwrap(), Command::Clear);
        assert_eq!(parse("/exit").unwrap(), Command::Exit);
        assert_eq!(parse("/quit").unwrap(), Command::Exit);
        assert_eq!(parse("/Q").unwrap(), Command::Exit);
        assert_eq!(
            parse("/read ~/notes.md").unwrap(),
            Command::Read {
                path: "~/notes.md".to_string()
            }
        );
        assert_eq!(parse("/model").unwrap(), Command::Model { name: None });
        assert_eq!(
            parse("/m x-ai/grok-4").unwrap(),
            Command::Model {
                name: Some("x-ai/grok-4".to_string())
            }
        );
    }

    #[test]
    fn test_command_parsing_errors() {
        assert!(parse("/unknown").is_err());
        assert!(parse("/read").is_err());
        assert!(parse("/write").is_err());
        assert!(parse("/clear extra").is_err());
    }

    #[tokio::test]
    async fn test_clear_command() -> Result<()> {
        let (mut chat, _, _dir) = mock_chat(MockModel::replying(&[]));
        chat.add_user_message("hello");
        let chat_session = Arc::new(Mutex::new(chat));

        assert!(Command::Clear.execute(chat_session.clone()).await?);
        assert!(chat_session.lock().await.messages().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_exit_command() -> Result<()> {
        let (chat, _, _dir) = mock_chat(MockModel::replying(&[]));
        let chat_session = Arc::new(Mutex::new(chat));

        assert!(!Command::Exit.execute(chat_session).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_read_command_adds_context() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("notes.md");
        std::fs::write(&file, "remember the milk\n")?;
        let path = file.to_string_lossy().to_string();

        let (chat, _, _dir) = mock_chat(MockModel::replying(&[]));
        let chat_session = Arc::new(Mutex::new(chat));
        let read_cmd = Command::Read { path: path.clone() };
        assert!(read_cmd.execute(chat_session.clone()).await?);

        let chat_guard = chat_session.lock().await;
        let messages = chat_guard.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, SenderType::User);
        assert_eq!(
            messages[0].text,
            format!("Contents of {path}:\n```\nremember the milk\n```")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_read_command_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let missing = dir.path().join("missing.txt");

        let (chat, _, _dir) = mock_chat(MockModel::replying(&[]));
        let chat_session = Arc::new(Mutex::new(chat));
        let read_cmd = Command::Read {
            path: missing.to_string_lossy().to_string(),
        };

        assert!(read_cmd.execute(chat_session.clone()).await?);
        assert!(chat_session.lock().await.messages().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_write_command_arms_pending_write() -> Result<()> {
        let (chat, _, _dir) = mock_chat(MockModel::replying(&[]));
        let chat_session = Arc::new(Mutex::new(chat));

        let write_cmd = Command::Write {
            path: "out.md".to_string(),
        };
        assert!(write_cmd.execute(chat_session.clone()).await?);
        assert_eq!(chat_session.lock().await.pending_write(), Some("out.md"));
        Ok(())
    }

    #[tokio::test]
    async fn test_model_command_current() -> Result<()> {
        let (chat, _, _dir) = mock_chat(MockModel::replying(&[]));
        let chat_session = Arc::new(Mutex::new(chat));

        assert!(Command::Model { name: None }.execute(chat_session.clone()).await?);
        assert_eq!(chat_session.lock().await.model_name(), "mock-model");
        Ok(())
    }

    #[tokio::test]
    async fn test_model_command_switch() -> Result<()> {
        let (chat, _, _dir) = mock_chat(MockModel::replying(&[]));
        let chat_session = Arc::new(Mutex::new(chat));

        let switch_cmd = Command::Model {
            name: Some("openai/gpt-4o-mini".to_string()),
        };
        assert!(switch_cmd.execute(chat_session.clone()).await?);
        assert_eq!(chat_session.lock().await.model_name(), "openai/gpt-4o-mini");
        Ok(())
    }

    #[test]
    fn test_complete_pending_write() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("sub").join("out.txt");

        complete_pending_write(&target.to_string_lossy(), "exactly this line");

        assert_eq!(std::fs::read_to_string(&target)?, "exactly this line");
        Ok(())
    }
}
