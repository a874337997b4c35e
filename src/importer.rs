// 📥 Source Reader - Freeblog export parsing
//
// Three feed-like documents in the source directory, items under
// /rss/channel/item. Schema-specific fields sit in two namespaces
// (the "export" and "enyim" schemas); base feed fields are unqualified.
//
// Categories must be read before entries: entry category references are
// resolved at parse time against the category lookup, keyed by the
// string form of the id. Any missing required field, malformed
// timestamp, or unknown category reference is fatal.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::authors::{AuthorResolver, RawAuthor};
use crate::entities::{Category, Comment, Entry};
use crate::xml::Element;

/// Namespace of the export schema (entry refs, ips, emails)
pub const XMLNS_EXPORT: &str = "http://enyim.com/schemas/blossom/export/2008";

/// Namespace of the core feed extension schema (aliases, excerpts, tags)
pub const XMLNS_ENYIM: &str = "http://enyim.com/schemas/rss/core/2006";

const CATEGORIES_FILE: &str = "categories.xml";
const ENTRIES_FILE: &str = "entries.xml";
const COMMENTS_FILE: &str = "comments.xml";

/// Category lookup keyed by the source's string-encoded id
pub type CategoryMap = HashMap<String, Category>;

/// Source-format seam: one importer per supported export schema
pub trait Importer {
    fn read_categories(&self) -> Result<CategoryMap>;
    fn read_entries(&self, categories: &CategoryMap) -> Result<Vec<Entry>>;
    fn read_comments(&self, resolver: &mut AuthorResolver) -> Result<Vec<Comment>>;
}

/// Importer for the Freeblog XML export directory layout
pub struct FreeblogImporter {
    root: PathBuf,
}

impl FreeblogImporter {
    pub fn new(root: &Path) -> Self {
        FreeblogImporter {
            root: root.to_path_buf(),
        }
    }

    /// Parse one source document and return its channel items
    fn read_items(&self, file: &str) -> Result<Vec<Element>> {
        let root = Element::parse_file(&self.root.join(file))?;
        let channel = root
            .find(None, "channel")
            .with_context(|| format!("{}: no <channel> under the feed root", file))?;

        Ok(channel.find_all(None, "item").cloned().collect())
    }
}

impl Importer for FreeblogImporter {
    fn read_categories(&self) -> Result<CategoryMap> {
        let mut map = CategoryMap::new();

        for (index, item) in self.read_items(CATEGORIES_FILE)?.iter().enumerate() {
            let category = parse_category(item)
                .with_context(|| format!("{} item {}", CATEGORIES_FILE, index + 1))?;
            map.insert(category.id.to_string(), category);
        }

        Ok(map)
    }

    fn read_entries(&self, categories: &CategoryMap) -> Result<Vec<Entry>> {
        self.read_items(ENTRIES_FILE)?
            .iter()
            .enumerate()
            .map(|(index, item)| {
                parse_entry(item, categories)
                    .with_context(|| format!("{} item {}", ENTRIES_FILE, index + 1))
            })
            .collect()
    }

    fn read_comments(&self, resolver: &mut AuthorResolver) -> Result<Vec<Comment>> {
        self.read_items(COMMENTS_FILE)?
            .iter()
            .enumerate()
            .map(|(index, item)| {
                parse_comment(item, resolver)
                    .with_context(|| format!("{} item {}", COMMENTS_FILE, index + 1))
            })
            .collect()
    }
}

// ============================================================================
// PER-ITEM PARSERS
// ============================================================================

fn parse_category(item: &Element) -> Result<Category> {
    Ok(Category::new(
        required_id(item)?,
        required_text(item, None, "title")?,
        required_text(item, Some(XMLNS_ENYIM), "alias")?,
    ))
}

fn parse_entry(item: &Element, categories: &CategoryMap) -> Result<Entry> {
    let mut resolved = Vec::new();
    for reference in item.find_all(None, "category") {
        let key = reference.text_content().trim().to_string();
        let category = categories
            .get(&key)
            .with_context(|| format!("unknown category reference '{}'", key))?;
        resolved.push(category.clone());
    }

    Ok(Entry {
        id: required_id(item)?,
        title: required_text(item, None, "title")?,
        timestamp: required_timestamp(item)?,
        content: optional_text(item, None, "description").unwrap_or_default(),
        excerpt: optional_text(item, Some(XMLNS_ENYIM), "excerpt"),
        author: required_text(item, None, "author")?,
        categories: resolved,
        tags: item
            .find_all(Some(XMLNS_ENYIM), "tag")
            .map(|tag| tag.text_content())
            .collect(),
    })
}

fn parse_comment(item: &Element, resolver: &mut AuthorResolver) -> Result<Comment> {
    let author = item.find(None, "author").context("missing <author>")?;
    let raw = RawAuthor {
        authenticated: author.attribute("isAuthenticated") == Some("true"),
        value: author.text_content(),
        email: optional_text(item, Some(XMLNS_EXPORT), "email"),
    };

    Ok(Comment {
        id: required_id(item)?,
        entry_id: required_text(item, Some(XMLNS_EXPORT), "entry")?
            .trim()
            .parse()
            .context("entry reference is not numeric")?,
        author: resolver.resolve_author(&raw)?,
        content: optional_text(item, None, "description").unwrap_or_default(),
        timestamp: required_timestamp(item)?,
        ip: optional_text(item, Some(XMLNS_EXPORT), "ip"),
    })
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

fn required_text(item: &Element, namespace: Option<&str>, name: &str) -> Result<String> {
    optional_text(item, namespace, name).with_context(|| format!("missing <{}>", name))
}

fn optional_text(item: &Element, namespace: Option<&str>, name: &str) -> Option<String> {
    item.find(namespace, name).map(|el| el.text_content())
}

fn required_id(item: &Element) -> Result<i64> {
    required_text(item, None, "guid")?
        .trim()
        .parse()
        .context("<guid> is not a numeric id")
}

/// Publish timestamps use the fixed RFC 2822 feed format; the source
/// offset is preserved on the parsed instant.
fn required_timestamp(item: &Element) -> Result<DateTime<FixedOffset>> {
    let text = required_text(item, None, "pubDate")?;
    DateTime::parse_from_rfc2822(text.trim())
        .with_context(|| format!("malformed <pubDate> '{}'", text.trim()))
}
