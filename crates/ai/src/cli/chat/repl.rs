use super::commands::{CliCommand, complete_pending_write, parse_command_line};
use super::compl::Repl;
use crate::cli::ux::{
    ChatMessageType, GenerationSpinner, Panel, TerminalRenderer, format_footer_metrics,
    style_chat_text, terminal_width,
};
use crate::svc::chat::Chat;
use ai_core::completion::{CancellationToken, Completion, CompletionMetrics};
use anyhow::Result;
use clap::{CommandFactory, Parser};
use futures::StreamExt;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, Editor};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const BANNER_TITLE: &str = "AI CLI - Interactive Mode";
const BANNER_BODY: &str = "Type your messages and press Enter. Commands:
  /clear         - Clear conversation history
  /exit or /quit - Exit
  /read <file>   - Read a file into the conversation
  /write <file>  - Write to a file (next message is content)
  /model [name]  - Show or switch the model
  /help          - Show all commands";

/// How a message exchange ended.
#[derive(Debug)]
pub enum Reply {
    Completed,
    Cancelled,
    Failed(anyhow::Error),
}

/// Runs the interactive REPL for the chat session.
pub async fn run<W: Write>(
    chat: Arc<Mutex<Chat>>,
    renderer: &mut TerminalRenderer<'_, W>,
    history_path: Option<PathBuf>,
) -> Result<()> {
    let width = terminal_width().unwrap_or(80);
    println!("{}", Panel::new(BANNER_TITLE, BANNER_BODY).render(width));

    let config = rustyline::Config::builder()
        .history_ignore_dups(true)?
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();

    let mut rl: Editor<Repl, FileHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(Repl::new(command_names())));

    if let Some(path) = history_path.as_ref().filter(|p| p.exists()) {
        if let Err(e) = rl.load_history(path) {
            warn!("Failed to load history from {}: {e}", path.display());
        }
    }

    let result = read_loop(&mut rl, chat, renderer).await;

    if let Some(path) = &history_path {
        if let Err(e) = rl.save_history(path) {
            warn!("Failed to save history to {}: {e}", path.display());
        }
    }
    result
}

async fn read_loop<W: Write>(
    rl: &mut Editor<Repl, FileHistory>,
    chat: Arc<Mutex<Chat>>,
    renderer: &mut TerminalRenderer<'_, W>,
) -> Result<()> {
    loop {
        let prompt = format_prompt(chat.lock().await.pending_write());
        match rl.readline(&prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                rl.add_history_entry(line.as_str())?;

                if !handle_line(chat.clone(), renderer, &line, tokio::signal::ctrl_c()).await? {
                    return Ok(());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!(
                    "\n{}",
                    style_chat_text("Use /exit to quit", ChatMessageType::Info)
                );
            }
            Err(ReadlineError::Eof) => {
                println!("{}", style_chat_text("Goodbye!", ChatMessageType::Info));
                return Ok(());
            }
            Err(err) => {
                return Err(err.into());
            }
        }
    }
}

/// Slash-command names offered for completion, e.g. `/clear`.
fn command_names() -> Vec<String> {
    let mut names: Vec<String> = CliCommand::command()
        .get_subcommands()
        .flat_map(|c| std::iter::once(c.get_name()).chain(c.get_all_aliases()))
        .filter(|name| name.len() > 1)
        .map(|name| format!("/{name}"))
        .collect();
    names.push("/help".to_string());
    names
}

fn format_prompt(pending_write: Option<&str>) -> String {
    let label = match pending_write {
        Some(path) => format!("You (→ {path})> "),
        None => "You> ".to_string(),
    };
    format!("\n{}", style_chat_text(&label, ChatMessageType::Prompt))
}

/// Handles one non-empty input line.
///
/// Returns `Ok(false)` if the REPL should exit.
pub(crate) async fn handle_line<W: Write, F: Future>(
    chat: Arc<Mutex<Chat>>,
    renderer: &mut TerminalRenderer<'_, W>,
    line: &str,
    interrupt: F,
) -> Result<bool> {
    let trimmed_line = line.trim();
    if trimmed_line.starts_with('/') {
        let Some(args) = parse_command_line(trimmed_line) else {
            let error_msg = format!("Unknown command: {trimmed_line}");
            eprintln!("{}", style_chat_text(&error_msg, ChatMessageType::Error));
            return Ok(true);
        };
        return match CliCommand::try_parse_from(args) {
            Ok(cli_command) => cli_command.command.execute(chat).await,
            Err(e) => {
                e.print()?;
                Ok(true)
            }
        };
    }

    let pending_write = chat.lock().await.take_pending_write();
    if let Some(path) = pending_write {
        complete_pending_write(&path, line);
        return Ok(true);
    }

    println!("\n{}", style_chat_text("AI:", ChatMessageType::Ai));
    if let Reply::Failed(e) = process_message(chat, renderer, line, interrupt).await? {
        let error_msg = format!("Error: {e}");
        eprintln!("{}", style_chat_text(&error_msg, ChatMessageType::Error));
    }
    Ok(true)
}

/// Sends `text` and streams the answer into `renderer`.
///
/// Resolving `interrupt` cancels the request. The answer is added to the
/// conversation only when the stream completes.
pub(crate) async fn process_message<W: Write, F: Future>(
    chat: Arc<Mutex<Chat>>,
    renderer: &mut TerminalRenderer<'_, W>,
    text: &str,
    interrupt: F,
) -> Result<Reply> {
    let mut metrics = CompletionMetrics::default();
    let mut finish_reason: Option<String> = None;
    let mut answer = String::new();

    renderer.clear();
    let spinner = GenerationSpinner::new("Thinking...".to_string());
    let cancel_token = CancellationToken::new();

    let mut stream = {
        let mut chat_guard = chat.lock().await;
        chat_guard.add_user_message(text);
        chat_guard.stream_response(cancel_token.clone()).await
    };

    let mut interrupt = std::pin::pin!(interrupt);
    let mut first_token_received = false;
    let mut failure = None;

    loop {
        tokio::select! {
            biased;

            _ = &mut interrupt => {
                debug!("Generation interrupted");
                cancel_token.cancel();
                break;
            }

            next = stream.next() => {
                match next {
                    Some(Ok(Completion::Response(chunk))) => {
                        if !chunk.text.is_empty() {
                            if !first_token_received {
                                spinner.clear();
                                first_token_received = true;
                            }
                            answer.push_str(&chunk.text);
                            renderer.render_markdown(&chunk.text)?;
                        }
                        if let Some(reason) = chunk.finish_reason {
                            finish_reason = Some(reason);
                        }
                    }
                    Some(Ok(Completion::Metrics(m))) => metrics = m,
                    Some(Err(e)) => {
                        failure = Some(e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    spinner.clear();
    renderer.finish()?;

    if let Some(e) = failure {
        debug!("Generation failed: {e:#}");
        return Ok(Reply::Failed(e));
    }

    let was_cancelled = cancel_token.is_cancelled();
    if !was_cancelled {
        chat.lock().await.record_response(&answer);
    }

    let footer = format_footer_metrics(&metrics, finish_reason.as_deref(), was_cancelled);
    println!();
    println!("{}", style_chat_text(&footer, ChatMessageType::Footer));

    Ok(if was_cancelled {
        Reply::Cancelled
    } else {
        Reply::Completed
    })
}
