use std::io::Cursor;

use anyhow::{Context, Result};
use console::Style;
use syntect::{
    highlighting::{
        FontStyle, HighlightIterator, HighlightState, Highlighter, Style as SyntectStyle, Theme,
        ThemeSet,
    },
    parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet},
};
use tracing::debug;

/// Loads the bundled ANSI theme.
///
/// Foreground colors with a zero alpha carry an ANSI palette index in the red
/// channel, so answers follow the terminal's own color scheme.
pub fn get_theme() -> Result<Theme> {
    let ansi_theme = include_str!("../../../data/ansi.tmTheme");
    let mut cursor = Cursor::new(ansi_theme.as_bytes());
    ThemeSet::load_from_reader(&mut cursor).context("Failed to load the terminal theme")
}

fn markdown_syntax(syntax_set: &SyntaxSet) -> &SyntaxReference {
    syntax_set
        .find_syntax_by_extension("md")
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text())
}

/// A stateful markdown highlighter for line-by-line terminal output.
///
/// The `ParseState` and `ScopeStack` carry over between lines, so a code
/// fence opened on one line keeps its highlighting until it closes.
pub struct MarkdownHighlighter<'a> {
    syntax_set: SyntaxSet,
    theme: &'a Theme,
    parser: ParseState,
    scope_stack: ScopeStack,
}

impl<'a> MarkdownHighlighter<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let parser = ParseState::new(markdown_syntax(&syntax_set));

        Self {
            syntax_set,
            theme,
            parser,
            scope_stack: ScopeStack::new(),
        }
    }

    /// Resets the highlighter state for a new answer.
    pub fn new_session(&mut self) {
        self.parser = ParseState::new(markdown_syntax(&self.syntax_set));
        self.scope_stack = ScopeStack::new();
    }

    /// Highlights one complete line (without its newline), advancing state.
    pub fn highlight_line(&mut self, line: &str) -> String {
        let text = format!("{line}\n");
        let highlighter = Highlighter::new(self.theme);

        let ops = match self.parser.parse_line(&text, &self.syntax_set) {
            Ok(ops) => ops,
            Err(e) => {
                debug!("Highlighting failed, printing plain text: {e}");
                return line.to_string();
            }
        };
        let mut highlight_state = HighlightState::new(&highlighter, self.scope_stack.clone());
        let ranges =
            HighlightIterator::new(&mut highlight_state, &ops[..], &text, &highlighter)
                .collect::<Vec<_>>();
        let output = to_ansi_terminal_escaped(&ranges);
        self.scope_stack = highlight_state.path;
        output
    }

    /// Highlights an incomplete line without advancing state.
    pub fn preview(&self, partial: &str) -> String {
        let highlighter = Highlighter::new(self.theme);
        let mut temp_parser = self.parser.clone();

        let Ok(ops) = temp_parser.parse_line(partial, &self.syntax_set) else {
            return partial.to_string();
        };
        let mut temp_state = HighlightState::new(&highlighter, self.scope_stack.clone());
        let ranges = HighlightIterator::new(&mut temp_state, &ops[..], partial, &highlighter)
            .collect::<Vec<_>>();
        to_ansi_terminal_escaped(&ranges)
    }
}

/// Converts syntect's styled ranges to an ANSI-escaped string for terminals.
fn to_ansi_terminal_escaped(v: &[(SyntectStyle, &str)]) -> String {
    let mut s = String::new();

    for &(ref hl_style, text) in v.iter() {
        let text = text.trim_end_matches('\n');
        if text.is_empty() {
            continue;
        }

        let mut style = Style::new().force_styling(true);
        if hl_style.font_style.contains(FontStyle::BOLD) {
            style = style.bold();
        }
        if hl_style.font_style.contains(FontStyle::ITALIC) {
            style = style.italic();
        }
        if hl_style.font_style.contains(FontStyle::UNDERLINE) {
            style = style.underlined();
        }

        // Alpha 0 is a palette index, alpha 1 is the terminal default.
        if hl_style.foreground.a == 0 {
            style = match hl_style.foreground.r {
                0x00 => style.black(),
                0x01 => style.red(),
                0x02 => style.green(),
                0x03 => style.yellow(),
                0x04 => style.blue(),
                0x05 => style.magenta(),
                0x06 => style.cyan(),
                0x07 => style.white(),
                c => style.color256(c),
            };
        }

        s.push_str(&style.apply_to(text).to_string());
    }

    s
}
