//! Remote file layout

use std::sync::LazyLock;

use regex::Regex;

use crate::codec::markdown::DEFAULT_NOTEBOOK_DIR;

pub const README_PATH: &str = "README.md";
pub const CONFIG_PATH: &str = "config/data.json";
pub const NOTES_DIR: &str = "notes";

const MAX_FILE_NAME_CHARS: usize = 100;

static ID_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_([a-f0-9]{8})\.md$").expect("valid id suffix regex"));

/// Make a name safe for use as a single path segment
///
/// Replaces `<>:"/\|?*` with `_`, collapses whitespace runs into one `_`,
/// and keeps at most 100 characters.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                sanitized.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        sanitized.push(match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        });
    }
    sanitized.chars().take(MAX_FILE_NAME_CHARS).collect()
}

/// `notes/<notebook>/<title>_<id8>.md`
#[must_use]
pub fn note_path(notebook_name: Option<&str>, title: &str, id: &str) -> String {
    let notebook = notebook_name
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_NOTEBOOK_DIR);
    let prefix: String = id.chars().take(8).collect();
    format!(
        "{NOTES_DIR}/{}/{}_{prefix}.md",
        sanitize_file_name(notebook),
        sanitize_file_name(title)
    )
}

/// The 8-hex id prefix embedded in a note file name, if any
#[must_use]
pub fn id_suffix(file_name: &str) -> Option<&str> {
    ID_SUFFIX
        .captures(file_name)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}
