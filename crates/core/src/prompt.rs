//! System prompt sent ahead of every conversation.
use std::fs;
use std::path::Path;

/// Entries listed before the remainder is summarised.
const MAX_LISTED_FILES: usize = 50;

/// Builds the system prompt describing `cwd` and its entries.
pub fn system_prompt(cwd: &Path) -> String {
    format!(
        "You are a helpful AI assistant with access to the user's file system.
Current working directory: {cwd}
Files in current directory:
{files}

You can help users with:
- Reading and analyzing files (use relative or absolute paths)
- Writing or modifying files
- Answering questions about their code and projects
- General programming and technical assistance

When suggesting file operations, provide clear commands or code snippets.

IMPORTANT: When writing mathematical expressions or formulas, always use LaTeX notation:
- For inline math: use single dollar signs like $x = 2$
- For display math: use double dollar signs like $$E = mc^2$$
Always wrap math in these delimiters so it renders properly.",
        cwd = cwd.display(),
        files = list_files(cwd),
    )
}

fn list_files(dir: &Path) -> String {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => return format!("Error listing files: {e}"),
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut listing = names
        .iter()
        .take(MAX_LISTED_FILES)
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    if names.len() > MAX_LISTED_FILES {
        listing.push_str(&format!(
            "\n... and {} more files",
            names.len() - MAX_LISTED_FILES
        ));
    }
    listing
}
