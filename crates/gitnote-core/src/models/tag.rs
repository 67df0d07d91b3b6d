//! Tag model

use serde::{Deserialize, Serialize};

use crate::util::now_iso;

/// A tag for organizing notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique identifier
    pub id: String,
    /// Tag name (globally unique, case-sensitive)
    pub name: String,
    /// Creation timestamp (ISO-8601, UTC)
    pub created_at: String,
}

impl Tag {
    /// Create a new tag with the given name
    ///
    /// The name is kept as written; tag names are case-sensitive.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: super::new_id(),
            name: name.into(),
            created_at: now_iso(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_new_keeps_case() {
        let tag = Tag::new("Rust");
        assert_eq!(tag.name, "Rust");
    }

    #[test]
    fn test_tag_id_unique() {
        assert_ne!(Tag::new("a").id, Tag::new("a").id);
    }
}
