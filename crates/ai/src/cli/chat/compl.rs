use crate::cli::ux::{ChatMessageType, style_chat_text};
use rustyline::completion::{Candidate, Completer, FilenameCompleter};
use rustyline::error::ReadlineError;
use rustyline::hint::Hinter;
use rustyline::{Helper, Highlighter, Validator};

/// Completion candidate for the REPL.
#[derive(Debug)]
pub struct CompletionCandidate {
    text: String,
    display_string: String,
}

impl CompletionCandidate {
    pub fn new(text: &str, display: &str) -> Self {
        let display_string = style_chat_text(display, ChatMessageType::Footer).to_string();
        Self {
            text: text.to_owned(),
            display_string,
        }
    }
}

impl Candidate for CompletionCandidate {
    fn display(&self) -> &str {
        &self.display_string
    }

    fn replacement(&self) -> &str {
        &self.text
    }
}

/// REPL runtime state for command line editing.
#[derive(Helper, Validator, Highlighter)]
pub struct Repl {
    pub command_names: Vec<String>,
    file_completer: FilenameCompleter,
}

impl Repl {
    pub fn new(command_names: Vec<String>) -> Self {
        Self {
            command_names,
            file_completer: FilenameCompleter::new(),
        }
    }
}

impl Completer for Repl {
    type Candidate = CompletionCandidate;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &rustyline::Context<'_>,
    ) -> Result<(usize, Vec<Self::Candidate>), ReadlineError> {
        if !line.starts_with('/') {
            return Ok((0, Vec::new()));
        }

        let line_to_pos = &line[..pos];
        match line_to_pos.split_once(' ') {
            Some((command, _)) => {
                let command = command.to_lowercase();
                if command == "/read" || command == "/write" {
                    return path_compl(&self.file_completer, line, pos, ctx);
                }
                Ok((0, Vec::new()))
            }
            None => {
                let prefix = line_to_pos.to_lowercase();
                let candidates = self
                    .command_names
                    .iter()
                    .filter(|name| name.starts_with(&prefix))
                    .map(|name| CompletionCandidate::new(name, name))
                    .collect();
                Ok((0, candidates))
            }
        }
    }
}

impl Hinter for Repl {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if line.is_empty() || pos < line.len() || line.contains(' ') {
            return None;
        }
        if line.starts_with('/') {
            self.command_names
                .iter()
                .find(|&cmd_name| cmd_name.starts_with(line))
                .map(|cmd_name| cmd_name[line.len()..].into())
        } else {
            None
        }
    }
}

/// File path completion for `/read` and `/write`.
fn path_compl(
    completer: &FilenameCompleter,
    line: &str,
    pos: usize,
    ctx: &rustyline::Context<'_>,
) -> Result<(usize, Vec<CompletionCandidate>), ReadlineError> {
    let (start, pairs) = completer.complete(line, pos, ctx)?;
    let candidates = pairs
        .iter()
        .map(|pair| CompletionCandidate::new(&pair.replacement, &pair.display))
        .collect();
    Ok((start, candidates))
}
