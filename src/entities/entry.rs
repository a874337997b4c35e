// 📝 Entry Entity - a single blog post
//
// Created once per source item during read, immutable afterward.
// Category references are resolved against the category lookup at parse
// time; tags stay free-text and only become taxonomy terms at export.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::Category;

/// Entry - one post from the source export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Stable identity from the source export
    pub id: i64,

    pub title: String,

    /// Publish instant, source timezone offset preserved
    pub timestamp: DateTime<FixedOffset>,

    /// Post body (HTML passes through verbatim)
    pub content: String,

    /// Optional excerpt; exported as empty string when absent
    pub excerpt: Option<String>,

    /// Author display name as it appears in the source (not a resolved
    /// identity - entry authors are plain strings)
    pub author: String,

    /// Resolved category references, in source order.
    /// Not deduplicated at the entry level.
    pub categories: Vec<Category>,

    /// Free-text tags, in source order
    pub tags: Vec<String>,
}
