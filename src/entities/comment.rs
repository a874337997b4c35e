// 💬 Comment Entity - a comment referencing its entry by id
//
// The entry reference is NOT validated at read time; comments pointing at
// an unknown entry are dropped by the exporter, not by the reader.
// Author name must not be read before the resolver flush has completed.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::Identity;

/// Comment - one comment from the source export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Stable identity from the source export
    pub id: i64,

    /// Foreign key to Entry.id; may reference an entry that is not
    /// present in the export (filtered downstream)
    pub entry_id: i64,

    pub author: Identity,

    /// Comment body; empty content means the comment is dropped at export
    pub content: String,

    pub timestamp: DateTime<FixedOffset>,

    /// Origin IP as recorded by the source; opaque pass-through,
    /// may be absent or malformed
    pub ip: Option<String>,
}
