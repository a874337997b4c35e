// Entity Models - canonical blog export model
//
// Each entity keeps the source-assigned numeric id as its identity:
// - Category: identity by id, deduplicated across entries
// - Entry: a single post, owning resolved Category references
// - Comment: references its Entry by id; carries a resolved Identity
// - Identity: anonymous name/email, or a handle into the author table

pub mod category;
pub mod comment;
pub mod entry;
pub mod identity;

pub use category::Category;
pub use comment::Comment;
pub use entry::Entry;
pub use identity::{AuthorHandle, Identity};
