use std::io::Write;

use anyhow::Result;
use console::measure_text_width;
use syntect::highlighting::Theme;

use super::highlight::MarkdownHighlighter;
use super::math::MathConverter;

/// Renders a streamed markdown answer to a terminal or any writer.
///
/// Text is buffered until a line completes. Completed lines get their math
/// converted to Unicode and are highlighted as markdown. With partial echo
/// enabled the in-progress line is shown as it arrives and redrawn once it
/// completes.
pub struct TerminalRenderer<'a, W: Write> {
    out: &'a mut W,
    highlighter: MarkdownHighlighter<'a>,
    math: MathConverter,
    pending: String,
    echo_width: Option<usize>,
    echoed_width: Option<usize>,
}

impl<'a, W: Write> TerminalRenderer<'a, W> {
    pub fn new(out: &'a mut W, theme: &'a Theme) -> Self {
        Self {
            out,
            highlighter: MarkdownHighlighter::new(theme),
            math: MathConverter::new(),
            pending: String::new(),
            echo_width: None,
            echoed_width: None,
        }
    }

    /// Echo incomplete lines on a terminal that is `width` columns wide.
    pub fn with_partial_echo(mut self, width: Option<usize>) -> Self {
        self.echo_width = width.filter(|w| *w > 0);
        self
    }

    /// Resets state before rendering a new answer.
    pub fn clear(&mut self) {
        self.highlighter.new_session();
        self.math.reset();
        self.pending.clear();
        self.echoed_width = None;
    }

    pub fn render_markdown(&mut self, text: &str) -> Result<()> {
        self.pending.push_str(text);

        while let Some(i) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=i).collect();
            self.erase_partial()?;
            self.write_line(line.trim_end_matches(['\n', '\r']))?;
        }

        if self.echo_width.is_some() && !self.pending.is_empty() {
            self.erase_partial()?;
            let preview = self.highlighter.preview(&self.pending);
            self.out.write_all(preview.as_bytes())?;
            self.echoed_width = Some(measure_text_width(&self.pending));
        }

        self.out.flush()?;
        Ok(())
    }

    /// Writes out whatever is left of the last line.
    pub fn finish(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.erase_partial()?;
            self.write_line(&line)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let converted = self.math.convert_line(line);
        let highlighted = self.highlighter.highlight_line(&converted);
        self.out.write_all(highlighted.as_bytes())?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Moves the cursor back over an echoed partial line and clears it.
    fn erase_partial(&mut self) -> Result<()> {
        let (Some(echoed), Some(width)) = (self.echoed_width.take(), self.echo_width) else {
            return Ok(());
        };
        let wrapped_rows = echoed.saturating_sub(1) / width;
        if wrapped_rows > 0 {
            write!(self.out, "\x1b[{wrapped_rows}A")?;
        }
        self.out.write_all(b"\r\x1b[J")?;
        Ok(())
    }
}
