// 🔁 Pipeline Driver - linear conversion run
//
// read categories → read entries → read comments → flush author
// resolution → persist author cache → build → write
//
// Any read failure aborts the run before the target file is touched;
// the cache is only persisted once every pending lookup has completed.
//
// Importers and exporters are registered in an explicit config passed
// into the run, keyed by short format codes. Only "fb" and "wp" exist
// today; the registry is the seam for future formats.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::authors::{AuthorResolver, NameLookup, ProfileLookup, DEFAULT_CACHE_FILE};
use crate::exporter::{Exporter, WxrExporter};
use crate::importer::{FreeblogImporter, Importer};

pub type ImporterFactory = fn(&Path) -> Box<dyn Importer>;
pub type ExporterFactory = fn(base_url: &str) -> Box<dyn Exporter>;

/// Explicit pipeline configuration: format registries, cache location,
/// author-name lookup, and the base URL stamped into the output
pub struct PipelineConfig {
    pub importers: HashMap<String, ImporterFactory>,
    pub exporters: HashMap<String, ExporterFactory>,

    /// Short code of the source format to read ("fb")
    pub source_format: String,

    /// Short code of the target format to write ("wp")
    pub target_format: String,

    /// Author cache location; by convention users.txt in the working
    /// directory, not under the source or target paths
    pub cache_path: PathBuf,

    pub lookup: Arc<dyn NameLookup>,
    pub base_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut importers: HashMap<String, ImporterFactory> = HashMap::new();
        importers.insert("fb".to_string(), |root| Box::new(FreeblogImporter::new(root)));

        let mut exporters: HashMap<String, ExporterFactory> = HashMap::new();
        exporters.insert("wp".to_string(), |base_url| Box::new(WxrExporter::new(base_url)));

        PipelineConfig {
            importers,
            exporters,
            source_format: "fb".to_string(),
            target_format: "wp".to_string(),
            cache_path: PathBuf::from(DEFAULT_CACHE_FILE),
            lookup: Arc::new(ProfileLookup::default()),
            base_url: WxrExporter::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Counters reported back to the caller after a successful run
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub categories: usize,
    pub entries: usize,
    pub comments: usize,
    pub lookups: usize,
}

/// Execute one full conversion. The target file is only written at the
/// very end; nothing is produced on failure.
pub async fn run(source: &Path, target: &Path, config: &PipelineConfig) -> Result<RunSummary> {
    let make_importer = config
        .importers
        .get(&config.source_format)
        .with_context(|| format!("unknown source format '{}'", config.source_format))?;
    let make_exporter = config
        .exporters
        .get(&config.target_format)
        .with_context(|| format!("unknown target format '{}'", config.target_format))?;

    let importer = make_importer(source);
    let exporter = make_exporter(&config.base_url);

    let categories = importer.read_categories()?;
    tracing::debug!(count = categories.len(), "read categories");

    let entries = importer.read_entries(&categories)?;
    tracing::debug!(count = entries.len(), "read entries");

    let mut resolver = AuthorResolver::load_cache(&config.cache_path)?;
    let comments = importer.read_comments(&mut resolver)?;
    tracing::debug!(
        count = comments.len(),
        pending_authors = resolver.pending_count(),
        "read comments"
    );

    let lookups = resolver.flush(Arc::clone(&config.lookup)).await;
    resolver.persist_cache(&config.cache_path)?;

    exporter.export(&entries, &comments, &resolver, target)?;

    Ok(RunSummary {
        categories: categories.len(),
        entries: entries.len(),
        comments: comments.len(),
        lookups,
    })
}
