//! Note documents: a front-matter block followed by the raw Markdown body
//!
//! ```text
//! ---
//! id: 0b9f4c1e-...
//! title: "Weekly \"plan\""
//! notebook: Work
//! folder: Projects
//! tags: ["rust", "sync"]
//! is_pinned: 0
//! sort_order: 0
//! created_at: 2024-01-01T00:00:00.000Z
//! updated_at: 2024-01-02T00:00:00.000Z
//! ---
//!
//! body
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Note;

/// Notebook name written when a note has none
pub const DEFAULT_NOTEBOOK_DIR: &str = "default";

static FRONT_MATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---(?:\r?\n(.*))?\z").expect("valid front matter regex")
});

/// Note fields recovered from a document; absent fields stay `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedNote {
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    pub notebook: Option<String>,
    pub folder: Option<String>,
    pub tags: Vec<String>,
    pub is_pinned: bool,
    pub sort_order: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Render a note as a front-matter document
#[must_use]
pub fn encode(
    note: &Note,
    notebook_name: Option<&str>,
    folder_name: Option<&str>,
    tags: &[String],
) -> String {
    let notebook = notebook_name
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_NOTEBOOK_DIR);
    let tags = tags
        .iter()
        .map(|tag| format!("\"{tag}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "---\n\
         id: {id}\n\
         title: \"{title}\"\n\
         notebook: {notebook}\n\
         folder: {folder}\n\
         tags: [{tags}]\n\
         is_pinned: {pinned}\n\
         sort_order: {sort_order}\n\
         created_at: {created_at}\n\
         updated_at: {updated_at}\n\
         ---\n\
         \n\
         {content}",
        id = note.id,
        title = note.title.replace('"', "\\\""),
        folder = folder_name.unwrap_or_default(),
        pinned = u8::from(note.is_pinned),
        sort_order = note.sort_order,
        created_at = note.created_at,
        updated_at = note.updated_at,
        content = note.content,
    )
}

/// Parse a note document
///
/// Never fails: unknown or malformed fields fall back to their defaults, and a
/// document without front matter becomes the content of a note titled after
/// `file_name`.
#[must_use]
pub fn decode(document: &str, file_name: &str) -> DecodedNote {
    let fallback_title = file_name.strip_suffix(".md").unwrap_or(file_name);

    let Some(captures) = FRONT_MATTER.captures(document) else {
        return DecodedNote {
            title: fallback_title.to_string(),
            content: document.to_string(),
            ..DecodedNote::default()
        };
    };

    let front_matter = captures.get(1).map_or("", |m| m.as_str());
    let body = captures.get(2).map_or("", |m| m.as_str());
    let field = |key: &str| front_matter_value(front_matter, key);

    DecodedNote {
        id: field("id").filter(|id| !id.is_empty()),
        title: field("title")
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| fallback_title.to_string()),
        content: body.trim().to_string(),
        notebook: field("notebook").filter(|name| !name.is_empty()),
        folder: field("folder").filter(|name| !name.is_empty()),
        tags: raw_value(front_matter, "tags")
            .map(parse_tags)
            .unwrap_or_default(),
        is_pinned: field("is_pinned").is_some_and(|value| parse_flag(&value)),
        sort_order: field("sort_order")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0),
        created_at: field("created_at").filter(|value| !value.is_empty()),
        updated_at: field("updated_at").filter(|value| !value.is_empty()),
    }
}

/// Raw text after `key:` on the first line declaring it
fn raw_value<'a>(front_matter: &'a str, key: &str) -> Option<&'a str> {
    front_matter.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name.trim() == key).then(|| value.trim())
    })
}

/// Value of `key` with optional surrounding quotes removed
fn front_matter_value(front_matter: &str, key: &str) -> Option<String> {
    raw_value(front_matter, key).map(unquote)
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\\\"", "\""),
        None => value.to_string(),
    }
}

fn parse_tags(raw: &str) -> Vec<String> {
    let inner = raw
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(raw);
    inner
        .split(',')
        .map(|tag| unquote(tag.trim()).trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn parse_flag(value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" => true,
        other => other.parse::<i64>().is_ok_and(|number| number != 0),
    }
}
