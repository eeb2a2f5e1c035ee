//! LaTeX math to Unicode text.
//!
//! Models are asked to wrap formulas in `$…$` or `$$…$$`. A terminal cannot
//! typeset those, so the common commands are mapped to Unicode symbols and
//! the rest of the expression is printed as written.
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([A-Za-z]+)").expect("valid math pattern"));
static FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[dt]?frac\s*\{([^{}]+)\}\s*\{([^{}]+)\}").expect("valid math pattern"));
static SQRT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\sqrt\s*\{([^{}]+)\}").expect("valid math pattern"));
static SUPERSCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\^\s*(?:\{\s*(-?\d+)\s*\}|(-?\d+))").expect("valid math pattern"));
static SUBSCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_\s*(?:\{\s*(-?\d+)\s*\}|(-?\d+))").expect("valid math pattern"));
static TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(?:text|mathrm|mathbf|operatorname)\s*\{([^{}]*)\}").expect("valid math pattern"));

// Inline spans, tried in this order on each line.
static DISPLAY_DOLLARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\$(.+?)\$\$").expect("valid math pattern"));
static INLINE_DOLLAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([^$\n]+?)\$").expect("valid math pattern"));
static DISPLAY_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\[(.+?)\\\]").expect("valid math pattern"));
static INLINE_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\((.+?)\\\)").expect("valid math pattern"));
static CODE_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"``.+?``|`[^`]+`").expect("valid code span pattern"));

fn symbol(command: &str) -> Option<&'static str> {
    let symbol = match command {
        "alpha" => "α",
        "Alpha" => "Α",
        "beta" => "β",
        "Beta" => "Β",
        "gamma" => "γ",
        "Gamma" => "Γ",
        "delta" => "δ",
        "Delta" => "Δ",
        "epsilon" | "varepsilon" => "ε",
        "Epsilon" => "Ε",
        "zeta" => "ζ",
        "eta" => "η",
        "theta" => "θ",
        "vartheta" => "ϑ",
        "Theta" => "Θ",
        "iota" => "ι",
        "kappa" => "κ",
        "lambda" => "λ",
        "Lambda" => "Λ",
        "mu" => "μ",
        "nu" => "ν",
        "xi" => "ξ",
        "Xi" => "Ξ",
        "pi" => "π",
        "Pi" => "Π",
        "rho" => "ρ",
        "sigma" => "σ",
        "Sigma" => "Σ",
        "tau" => "τ",
        "upsilon" => "υ",
        "Upsilon" => "Υ",
        "phi" => "φ",
        "varphi" => "ϕ",
        "Phi" => "Φ",
        "chi" => "χ",
        "psi" => "ψ",
        "Psi" => "Ψ",
        "omega" => "ω",
        "Omega" => "Ω",
        "infty" => "∞",
        "pm" => "±",
        "mp" => "∓",
        "sum" => "∑",
        "prod" => "∏",
        "int" => "∫",
        "oint" => "∮",
        "partial" => "∂",
        "nabla" => "∇",
        "sqrt" => "√",
        "approx" => "≈",
        "neq" | "ne" => "≠",
        "le" | "leq" => "≤",
        "ge" | "geq" => "≥",
        "equiv" => "≡",
        "times" => "×",
        "div" => "÷",
        "cdot" => "·",
        "to" | "rightarrow" => "→",
        "leftarrow" => "←",
        "Rightarrow" | "implies" => "⇒",
        "Leftrightarrow" | "iff" => "⇔",
        "in" => "∈",
        "notin" => "∉",
        "subset" => "⊂",
        "subseteq" => "⊆",
        "cup" => "∪",
        "cap" => "∩",
        "forall" => "∀",
        "exists" => "∃",
        "emptyset" => "∅",
        "ldots" | "dots" | "cdots" => "…",
        "degree" => "°",
        "left" | "right" => "",
        _ => return None,
    };
    Some(symbol)
}

fn script(caps: &Captures<'_>, digits: &[char; 10], minus: char) -> String {
    let value = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default();
    value
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => digits[d as usize],
            None => minus,
        })
        .collect()
}

/// Trims spaces and braces that wrap the whole expression.
fn strip_outer_braces(latex: &str) -> &str {
    let mut text = latex.trim();
    while text.starts_with('{') && text.ends_with('}') && wraps_whole(text) {
        text = text[1..text.len() - 1].trim();
    }
    text
}

fn wraps_whole(text: &str) -> bool {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i < text.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

const SUPERSCRIPT_DIGITS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];
const SUBSCRIPT_DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];

/// Converts a LaTeX expression (without delimiters) to Unicode text.
pub fn latex_to_unicode(latex: &str) -> String {
    let text = TEXT.replace_all(strip_outer_braces(latex), "$1");
    let text = FRACTION.replace_all(&text, "$1/$2");
    let text = SQRT.replace_all(&text, |caps: &Captures<'_>| {
        let arg = &caps[1];
        if arg.chars().all(char::is_alphanumeric) {
            format!("√{arg}")
        } else {
            format!("√({arg})")
        }
    });
    let text = COMMAND.replace_all(&text, |caps: &Captures<'_>| {
        symbol(&caps[1])
            .map(str::to_string)
            .unwrap_or_else(|| caps[0].to_string())
    });
    let text = SUPERSCRIPT.replace_all(&text, |caps: &Captures<'_>| {
        script(caps, &SUPERSCRIPT_DIGITS, '⁻')
    });
    let text = SUBSCRIPT.replace_all(&text, |caps: &Captures<'_>| {
        script(caps, &SUBSCRIPT_DIGITS, '₋')
    });
    text.into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Dollars,
    Bracket,
}

impl Block {
    fn open(&self) -> &'static str {
        match self {
            Block::Dollars => "$$",
            Block::Bracket => "\\[",
        }
    }

    fn close(&self) -> &'static str {
        match self {
            Block::Dollars => "$$",
            Block::Bracket => "\\]",
        }
    }
}

/// Rewrites math in streamed markdown, one complete line at a time.
///
/// Display blocks opened by a bare `$$` or `\[` stay open across lines until
/// the matching delimiter. Fenced code is passed through untouched.
#[derive(Debug, Default)]
pub struct MathConverter {
    block: Option<Block>,
    in_code_fence: bool,
}

impl MathConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.block = None;
        self.in_code_fence = false;
    }

    pub fn convert_line(&mut self, line: &str) -> String {
        if self.block.is_none() && line.trim_start().starts_with("```") {
            self.in_code_fence = !self.in_code_fence;
            return line.to_string();
        }
        if self.in_code_fence {
            return line.to_string();
        }

        let mut output = String::new();
        let mut rest = line.to_string();
        loop {
            if let Some(block) = self.block {
                let close = block.close();
                match rest.find(close) {
                    Some(i) => {
                        output.push_str(&latex_to_unicode(&rest[..i]));
                        rest = rest[i + close.len()..].to_string();
                        self.block = None;
                    }
                    None => {
                        if !rest.trim().is_empty() {
                            output.push_str("  ");
                            output.push_str(&latex_to_unicode(&rest));
                        }
                        return output;
                    }
                }
            } else {
                let converted = convert_inline(&rest);
                match find_block_start(&converted) {
                    Some((i, block)) => {
                        output.push_str(&converted[..i]);
                        rest = converted[i + block.open().len()..].to_string();
                        self.block = Some(block);
                    }
                    None => {
                        output.push_str(&converted);
                        return output;
                    }
                }
            }
        }
    }
}

/// Converts inline math outside of backtick code spans.
fn convert_inline(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut last = 0;
    for span in CODE_SPAN.find_iter(text) {
        output.push_str(&convert_math(&text[last..span.start()]));
        output.push_str(span.as_str());
        last = span.end();
    }
    output.push_str(&convert_math(&text[last..]));
    output
}

fn convert_math(text: &str) -> String {
    let replace = |caps: &Captures<'_>| latex_to_unicode(&caps[1]);
    let text = DISPLAY_DOLLARS.replace_all(text, replace);
    let text = INLINE_DOLLAR.replace_all(&text, replace);
    let text = DISPLAY_BRACKET.replace_all(&text, replace);
    let text = INLINE_PAREN.replace_all(&text, replace);
    text.into_owned()
}

/// First `needle` that is not inside a code span.
fn find_outside_code(text: &str, needle: &str) -> Option<usize> {
    let spans: Vec<_> = CODE_SPAN.find_iter(text).map(|m| m.range()).collect();
    text.match_indices(needle)
        .map(|(i, _)| i)
        .find(|i| !spans.iter().any(|span| span.contains(i)))
}

fn find_block_start(text: &str) -> Option<(usize, Block)> {
    let dollars = find_outside_code(text, "$$").map(|i| (i, Block::Dollars));
    let bracket = find_outside_code(text, "\\[").map(|i| (i, Block::Bracket));
    match (dollars, bracket) {
        (Some(d), Some(b)) => Some(if d.0 <= b.0 { d } else { b }),
        (d, b) => d.or(b),
    }
}
