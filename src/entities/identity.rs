// 👤 Identity - resolved commenter identity
//
// Two variants instead of the usual subclass pair:
// - Anonymous: name + email captured at parse time, never changes
// - Authenticated: a handle into the AuthorResolver's author table;
//   the display name lands in the table when resolution is flushed
//
// The handle avoids shared mutable references: every comment by the same
// authenticated user carries the same index, and all of them observe the
// resolved name through the table once flush() has completed.

use serde::{Deserialize, Serialize};

/// Index into the author resolver's authenticated-author table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorHandle(pub usize);

/// Commenter identity, anonymous or authenticated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// Fully known at parse time
    Anonymous { name: String, email: String },

    /// Known only by numeric id; name resolved later via cache or lookup
    Authenticated(AuthorHandle),
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }
}
