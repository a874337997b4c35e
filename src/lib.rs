// Fb2Wp - Freeblog → WordPress WXR converter
// Exposes all modules for use in the CLI and tests

pub mod authors;
pub mod entities;
pub mod exporter;
pub mod importer;
pub mod pipeline;
pub mod xml;

// Re-export commonly used types
pub use authors::{AuthorResolver, NameLookup, ProfileLookup, RawAuthor};
pub use entities::{AuthorHandle, Category, Comment, Entry, Identity};
pub use exporter::{Exporter, WxrExporter};
pub use importer::{CategoryMap, FreeblogImporter, Importer};
pub use pipeline::{run, PipelineConfig, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
