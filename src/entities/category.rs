// 🏷️ Category Entity - taxonomy term with stable source identity
//
// "Category title is a VALUE (display only), Category id is IDENTITY"
//
// Equality and hashing go by id alone: two entries referencing the same
// category id must collapse to a single term declaration in the export,
// even if their titles were edited between source documents.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Category - source-assigned taxonomy term
///
/// Identity: numeric id (never changes)
/// Values: title (display string), alias (URL-safe slug)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Stable identity from the source export
    pub id: i64,

    /// Display title (e.g., "News", "Zene")
    pub title: String,

    /// URL-safe slug used as the export nicename
    pub alias: String,
}

impl Category {
    pub fn new(id: i64, title: String, alias: String) -> Self {
        Category { id, title, alias }
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Category {}

impl Hash for Category {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
