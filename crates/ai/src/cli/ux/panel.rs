use console::{Style, measure_text_width, truncate_str};

/// A titled box drawn around text, e.g. the contents of a file.
#[derive(Debug)]
pub struct Panel<'a> {
    title: &'a str,
    body: &'a str,
}

impl<'a> Panel<'a> {
    pub fn new(title: &'a str, body: &'a str) -> Self {
        Self { title, body }
    }

    /// Renders the panel no wider than `width` columns.
    ///
    /// Long lines are wrapped; tabs expand to four spaces.
    pub fn render(&self, width: usize) -> String {
        let border = Style::new().blue();
        let title_style = Style::new().cyan();

        let inner = width.saturating_sub(4).max(10);
        let lines: Vec<String> = self
            .body
            .lines()
            .map(|l| l.replace('\t', "    "))
            .flat_map(|l| wrap(&l, inner))
            .collect();

        let title = truncate_str(self.title, inner.saturating_sub(2), "…");
        let title_width = measure_text_width(&title) + 2;
        let content_width = lines
            .iter()
            .map(|l| measure_text_width(l))
            .max()
            .unwrap_or(0)
            .max(title_width)
            .min(inner);

        let mut out = String::new();
        let top_fill = "─".repeat((content_width + 2).saturating_sub(title_width + 1));
        out.push_str(&format!(
            "{} {} {}\n",
            border.apply_to("╭─"),
            title_style.apply_to(&title),
            border.apply_to(format!("{top_fill}╮"))
        ));
        for line in &lines {
            let pad = " ".repeat(content_width.saturating_sub(measure_text_width(line)));
            out.push_str(&format!(
                "{} {line}{pad} {}\n",
                border.apply_to("│"),
                border.apply_to("│")
            ));
        }
        out.push_str(&format!(
            "{}",
            border.apply_to(format!("╰{}╯", "─".repeat(content_width + 2)))
        ));
        out
    }
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    if measure_text_width(line) <= width {
        return vec![line.to_string()];
    }

    let mut rows = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    for c in line.chars() {
        let w = measure_text_width(c.encode_utf8(&mut [0; 4]));
        if current_width + w > width {
            rows.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(c);
        current_width += w;
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}
