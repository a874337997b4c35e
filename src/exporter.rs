// 📤 Target Builder - WordPress WXR document assembly
//
// Consumes the complete, already-validated entity set and derives every
// synthetic id deterministically from processing order:
// - author ids: distinct entry-author names (case-insensitive), first seen
// - term ids: distinct categories (by id) and tags (by exact string)
// - post ids: 0-based entry sequence index
// - comment ids: 0-based index within the entry's filtered comment group
//
// Comments referencing an unknown entry, or with empty content, are
// dropped here (policy, not an error). The builder does not re-validate
// anything the reader already guarantees.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::authors::AuthorResolver;
use crate::entities::{Category, Comment, Entry};
use crate::xml::{Element, Node};

/// The five namespaces declared on the WXR root element
pub const XMLNS_EXCERPT: &str = "http://wordpress.org/export/1.2/excerpt/";
pub const XMLNS_CONTENT: &str = "http://purl.org/rss/1.0/modules/content/";
pub const XMLNS_WFW: &str = "http://wellformedweb.org/CommentAPI/";
pub const XMLNS_DC: &str = "http://purl.org/dc/elements/1.1/";
pub const XMLNS_WP: &str = "http://wordpress.org/export/1.2/";

/// WXR schema version emitted in the channel
pub const WXR_VERSION: &str = "1.2";

/// Entry authors are exported as login only; the email is left for the
/// operator to fill in before importing.
const AUTHOR_EMAIL_PLACEHOLDER: &str = "PUT YOUR EMAIL HERE";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RFC1123_GMT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Target-format seam: one exporter per supported import schema
pub trait Exporter {
    fn export(
        &self,
        entries: &[Entry],
        comments: &[Comment],
        resolver: &AuthorResolver,
        target: &Path,
    ) -> Result<()>;
}

/// Exporter producing a WordPress WXR 1.2 import document
pub struct WxrExporter {
    base_url: String,
}

impl WxrExporter {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost";

    pub fn new(base_url: &str) -> Self {
        WxrExporter {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Assemble the full output tree. Pure function of its inputs;
    /// `generated_at` becomes the channel pubDate.
    pub fn build_document(
        &self,
        entries: &[Entry],
        comments: &[Comment],
        resolver: &AuthorResolver,
        generated_at: DateTime<Utc>,
    ) -> Element {
        let authors = AuthorIndex::build(entries);
        let grouped = group_comments(entries, comments);

        let mut channel = Element::new("channel")
            .with_child(Element::new("title").with_text("export"))
            .with_child(Element::new("language").with_text("hu-hu"))
            .with_child(wp_text("wxr_version", WXR_VERSION))
            .with_child(wp_text("base_site_url", &self.base_url))
            .with_child(wp_text("base_blog_url", &self.base_url))
            .with_child(
                Element::new("pubDate").with_text(&generated_at.format(RFC1123_GMT).to_string()),
            );

        add_section(&mut channel, "AUTHOR LIST", author_list(&authors));
        add_section(&mut channel, "CATEGORY LIST", category_list(entries));
        add_section(&mut channel, "TAG LIST", tag_list(entries));

        for (index, entry) in entries.iter().enumerate() {
            let entry_comments = grouped.get(&entry.id).map(Vec::as_slice).unwrap_or(&[]);
            channel.push_child(self.entry_item(entry, index, entry_comments, &authors, resolver));
        }

        Element::new("rss")
            .with_attr("xmlns:excerpt", XMLNS_EXCERPT)
            .with_attr("xmlns:content", XMLNS_CONTENT)
            .with_attr("xmlns:wfw", XMLNS_WFW)
            .with_attr("xmlns:dc", XMLNS_DC)
            .with_attr("xmlns:wp", XMLNS_WP)
            .with_child(channel)
    }

    fn entry_item(
        &self,
        entry: &Entry,
        index: usize,
        comments: &[&Comment],
        authors: &AuthorIndex,
        resolver: &AuthorResolver,
    ) -> Element {
        let permalink = format!("{}/?p={}", self.base_url, index);
        let local_date = entry.timestamp.format(DATE_FORMAT).to_string();
        let utc = entry.timestamp.with_timezone(&Utc);

        let mut item = Element::new("item")
            .with_child(Element::new("title").with_text(&entry.title))
            .with_child(Element::new("link").with_text(&permalink))
            .with_child(
                Element::new("guid")
                    .with_attr("isPermalink", "false")
                    .with_text(&permalink),
            )
            .with_child(
                Element::new("pubDate").with_text(&utc.format(RFC1123_GMT).to_string()),
            )
            .with_child(Element::new("dc:creator").with_text(&entry.author))
            .with_child(Element::new("description"))
            .with_child(Element::new("content:encoded").with_cdata(&entry.content))
            .with_child(
                Element::new("excerpt:encoded").with_cdata(entry.excerpt.as_deref().unwrap_or("")),
            )
            .with_child(wp_text("post_id", &index.to_string()))
            .with_child(wp_text("post_date", &local_date))
            .with_child(wp_text("post_date_gmt", &utc.format(DATE_FORMAT).to_string()))
            .with_child(wp_text("comment_status", "open"))
            .with_child(wp_text("ping_status", "open"))
            .with_child(wp_text("status", "publish"))
            .with_child(wp_text("post_parent", "0"))
            .with_child(wp_text("menu_order", "0"))
            .with_child(wp_text("is_sticky", "0"))
            .with_child(wp_text("post_type", "post"))
            .with_child(wp_text("post_name", &slugify(&entry.title)));

        for category in &entry.categories {
            item.push_child(
                Element::new("category")
                    .with_attr("domain", "category")
                    .with_attr("nicename", &category.alias)
                    .with_cdata(&category.title),
            );
        }

        for (comment_index, comment) in comments.iter().enumerate() {
            item.push_child(comment_element(comment, comment_index, authors, resolver));
        }

        for tag in &entry.tags {
            item.push_child(
                Element::new("category")
                    .with_attr("domain", "tag")
                    .with_attr("nicename", &slugify(tag))
                    .with_cdata(tag),
            );
        }

        item
    }
}

impl Exporter for WxrExporter {
    fn export(
        &self,
        entries: &[Entry],
        comments: &[Comment],
        resolver: &AuthorResolver,
        target: &Path,
    ) -> Result<()> {
        self.build_document(entries, comments, resolver, Utc::now())
            .write_file(target)
    }
}

impl Default for WxrExporter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_URL)
    }
}

// ============================================================================
// SYNTHETIC ID DERIVATIONS
// ============================================================================

/// Distinct entry-author names with synthetic ids in first-seen order.
/// Lookup is case-insensitive; the first-seen spelling is what gets
/// exported in the author list.
struct AuthorIndex {
    names: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl AuthorIndex {
    fn build(entries: &[Entry]) -> Self {
        let mut names = Vec::new();
        let mut by_name = HashMap::new();

        for entry in entries {
            let key = entry.author.to_lowercase();
            if !by_name.contains_key(&key) {
                by_name.insert(key, names.len());
                names.push(entry.author.clone());
            }
        }

        AuthorIndex { names, by_name }
    }

    fn id_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name.to_lowercase()).copied()
    }
}

/// Distinct categories across all entries, by id, first-seen order
fn distinct_categories(entries: &[Entry]) -> Vec<&Category> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for entry in entries {
        for category in &entry.categories {
            if seen.insert(category.id) {
                out.push(category);
            }
        }
    }

    out
}

/// Distinct tags across all entries, by exact string, first-seen order
fn distinct_tags(entries: &[Entry]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for entry in entries {
        for tag in &entry.tags {
            if seen.insert(tag.as_str()) {
                out.push(tag.as_str());
            }
        }
    }

    out
}

/// Group comments by entry id, keeping only comments that reference a
/// known entry and have non-empty content. Source order is preserved
/// within each group.
fn group_comments<'a>(entries: &[Entry], comments: &'a [Comment]) -> HashMap<i64, Vec<&'a Comment>> {
    let known: HashSet<i64> = entries.iter().map(|e| e.id).collect();
    let mut grouped: HashMap<i64, Vec<&Comment>> = HashMap::new();

    for comment in comments {
        if known.contains(&comment.entry_id) && !comment.content.is_empty() {
            grouped.entry(comment.entry_id).or_default().push(comment);
        }
    }

    grouped
}

/// Tag and post-name slugs replace spaces with hyphens; everything else
/// passes through verbatim.
fn slugify(input: &str) -> String {
    input.replace(' ', "-")
}

// ============================================================================
// XML ASSEMBLY
// ============================================================================

fn wp_text(name: &str, value: &str) -> Element {
    Element::new(&format!("wp:{}", name)).with_text(value)
}

/// Cosmetic section markers around a block of term declarations,
/// mirroring the layout WordPress's own exporter produces
fn add_section(channel: &mut Element, name: &str, elements: Vec<Element>) {
    channel.children.push(Node::Comment(format!("\n\t{}\n\t", name)));
    for el in elements {
        channel.push_child(el);
    }
    channel.children.push(Node::Comment("\n\n\t".to_string()));
}

fn author_list(authors: &AuthorIndex) -> Vec<Element> {
    authors
        .names
        .iter()
        .map(|name| {
            Element::new("wp:author")
                .with_child(wp_text("author_login", name))
                .with_child(wp_text("author_email", AUTHOR_EMAIL_PLACEHOLDER))
        })
        .collect()
}

fn category_list(entries: &[Entry]) -> Vec<Element> {
    distinct_categories(entries)
        .iter()
        .enumerate()
        .map(|(term_id, category)| {
            Element::new("wp:category")
                .with_child(wp_text("term_id", &term_id.to_string()))
                .with_child(wp_text("category_nicename", &category.alias))
                .with_child(wp_text("category_parent", ""))
                .with_child(
                    Element::new("wp:cat_name").with_cdata(&category.title),
                )
        })
        .collect()
}

fn tag_list(entries: &[Entry]) -> Vec<Element> {
    distinct_tags(entries)
        .iter()
        .enumerate()
        .map(|(term_id, tag)| {
            Element::new("wp:tag")
                .with_child(wp_text("term_id", &term_id.to_string()))
                .with_child(wp_text("tag_slug", &slugify(tag)))
                .with_child(Element::new("wp:tag_name").with_cdata(tag))
        })
        .collect()
}

fn comment_element(
    comment: &Comment,
    index: usize,
    authors: &AuthorIndex,
    resolver: &AuthorResolver,
) -> Element {
    let name = resolver.name_of(&comment.author);
    let user_id = if name.is_empty() {
        0
    } else {
        authors.id_of(name).unwrap_or(0)
    };
    let utc = comment.timestamp.with_timezone(&Utc);

    Element::new("wp:comment")
        .with_child(wp_text("comment_id", &index.to_string()))
        .with_child(wp_text("comment_author", name))
        .with_child(wp_text("comment_author_email", resolver.email_of(&comment.author)))
        .with_child(wp_text("comment_author_url", ""))
        .with_child(wp_text("comment_author_IP", comment.ip.as_deref().unwrap_or("")))
        .with_child(wp_text("comment_date", &comment.timestamp.format(DATE_FORMAT).to_string()))
        .with_child(wp_text("comment_date_gmt", &utc.format(DATE_FORMAT).to_string()))
        .with_child(Element::new("wp:comment_content").with_cdata(&comment.content))
        .with_child(wp_text("comment_approved", "1"))
        .with_child(wp_text("comment_type", ""))
        .with_child(wp_text("comment_parent", "0"))
        .with_child(wp_text("comment_user_id", &user_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Identity;
    use chrono::DateTime;

    fn ts(raw: &str) -> chrono::DateTime<chrono::FixedOffset> {
        DateTime::parse_from_rfc2822(raw).unwrap()
    }

    fn news_category() -> Category {
        Category::new(1, "News".to_string(), "news".to_string())
    }

    fn test_entry(id: i64, author: &str) -> Entry {
        Entry {
            id,
            title: "Hello World".to_string(),
            timestamp: ts("Sat, 07 Aug 2010 12:34:56 +0200"),
            content: "body".to_string(),
            excerpt: None,
            author: author.to_string(),
            categories: vec![news_category()],
            tags: vec!["intro".to_string()],
        }
    }

    fn test_comment(id: i64, entry_id: i64, name: &str, content: &str) -> Comment {
        Comment {
            id,
            entry_id,
            author: Identity::Anonymous {
                name: name.to_string(),
                email: format!("{}@x.com", name.to_lowercase()),
            },
            content: content.to_string(),
            timestamp: ts("Sun, 08 Aug 2010 09:00:00 +0200"),
            ip: Some("10.0.0.1".to_string()),
        }
    }

    /// Build, serialize and re-parse so assertions see resolved namespaces
    fn roundtrip(entries: &[Entry], comments: &[Comment]) -> Element {
        let resolver = AuthorResolver::new();
        let doc = WxrExporter::default().build_document(
            entries,
            comments,
            &resolver,
            DateTime::parse_from_rfc2822("Mon, 09 Aug 2010 00:00:00 +0000")
                .unwrap()
                .with_timezone(&Utc),
        );
        Element::parse_str(&doc.to_document_string().unwrap()).unwrap()
    }

    fn channel(doc: &Element) -> &Element {
        doc.find(None, "channel").unwrap()
    }

    fn wp_value<'a>(parent: &'a Element, name: &str) -> &'a Element {
        parent.find(Some(XMLNS_WP), name).unwrap()
    }

    #[test]
    fn test_end_to_end_single_entry() {
        let entries = vec![test_entry(100, "Jane")];
        let comments = vec![test_comment(200, 100, "Bob", "nice post")];
        let doc = roundtrip(&entries, &comments);
        let channel = channel(&doc);

        let items: Vec<_> = channel.find_all(None, "item").collect();
        assert_eq!(items.len(), 1);
        let item = items[0];

        assert_eq!(wp_value(item, "post_id").text_content(), "0");
        assert_eq!(item.find(None, "title").unwrap().text_content(), "Hello World");
        assert_eq!(wp_value(item, "post_name").text_content(), "Hello-World");
        assert_eq!(
            item.find(Some(XMLNS_DC), "creator").unwrap().text_content(),
            "Jane"
        );

        let cats: Vec<_> = item
            .find_all(None, "category")
            .filter(|c| c.attribute("domain") == Some("category"))
            .collect();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].attribute("nicename"), Some("news"));
        assert_eq!(cats[0].text_content(), "News");

        let tags: Vec<_> = item
            .find_all(None, "category")
            .filter(|c| c.attribute("domain") == Some("tag"))
            .collect();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].attribute("nicename"), Some("intro"));

        let wp_comments: Vec<_> = item.find_all(Some(XMLNS_WP), "comment").collect();
        assert_eq!(wp_comments.len(), 1);
        assert_eq!(wp_value(wp_comments[0], "comment_id").text_content(), "0");
        assert_eq!(wp_value(wp_comments[0], "comment_author").text_content(), "Bob");
        assert_eq!(wp_value(wp_comments[0], "comment_approved").text_content(), "1");
        assert_eq!(wp_value(wp_comments[0], "comment_author_IP").text_content(), "10.0.0.1");
    }

    #[test]
    fn test_channel_metadata() {
        let doc = roundtrip(&[test_entry(100, "Jane")], &[]);
        let channel = channel(&doc);

        assert_eq!(channel.find(None, "title").unwrap().text_content(), "export");
        assert_eq!(wp_value(channel, "wxr_version").text_content(), "1.2");
        assert_eq!(
            wp_value(channel, "base_site_url").text_content(),
            "http://localhost"
        );
        assert_eq!(
            channel.find(None, "pubDate").unwrap().text_content(),
            "Mon, 09 Aug 2010 00:00:00 GMT"
        );
    }

    #[test]
    fn test_orphan_comment_is_dropped() {
        let entries = vec![test_entry(100, "Jane")];
        let comments = vec![
            test_comment(200, 999, "Bob", "orphaned"),
            test_comment(201, 100, "Eve", "kept"),
        ];
        let doc = roundtrip(&entries, &comments);

        let item = channel(&doc).find(None, "item").unwrap();
        let wp_comments: Vec<_> = item.find_all(Some(XMLNS_WP), "comment").collect();

        assert_eq!(wp_comments.len(), 1);
        assert_eq!(wp_value(wp_comments[0], "comment_author").text_content(), "Eve");
    }

    #[test]
    fn test_empty_comment_is_dropped() {
        let entries = vec![test_entry(100, "Jane")];
        let comments = vec![test_comment(200, 100, "Bob", "")];
        let doc = roundtrip(&entries, &comments);

        let item = channel(&doc).find(None, "item").unwrap();
        assert_eq!(item.find_all(Some(XMLNS_WP), "comment").count(), 0);
    }

    #[test]
    fn test_shared_category_declared_once() {
        let mut second = test_entry(101, "Jane");
        second.categories = vec![Category::new(1, "News edited".to_string(), "news".to_string())];
        let entries = vec![test_entry(100, "Jane"), second];
        let doc = roundtrip(&entries, &[]);

        let terms: Vec<_> = channel(&doc).find_all(Some(XMLNS_WP), "category").collect();
        assert_eq!(terms.len(), 1);
        assert_eq!(wp_value(terms[0], "term_id").text_content(), "0");
        assert_eq!(wp_value(terms[0], "category_nicename").text_content(), "news");
    }

    #[test]
    fn test_author_ids_first_seen_case_insensitive() {
        let entries = vec![
            test_entry(100, "Jane"),
            test_entry(101, "JANE"),
            test_entry(102, "Joe"),
        ];
        let doc = roundtrip(&entries, &[]);
        let channel = channel(&doc);

        let authors: Vec<_> = channel.find_all(Some(XMLNS_WP), "author").collect();
        assert_eq!(authors.len(), 2);
        assert_eq!(wp_value(authors[0], "author_login").text_content(), "Jane");
        assert_eq!(wp_value(authors[1], "author_login").text_content(), "Joe");
    }

    #[test]
    fn test_comment_by_entry_author_gets_user_id() {
        let entries = vec![test_entry(100, "Jane"), test_entry(101, "Joe")];
        let comments = vec![
            test_comment(200, 100, "joe", "it me"),
            test_comment(201, 100, "Stranger", "hello"),
        ];
        let doc = roundtrip(&entries, &comments);

        let item = channel(&doc).find(None, "item").unwrap();
        let wp_comments: Vec<_> = item.find_all(Some(XMLNS_WP), "comment").collect();

        // "joe" matches entry author "Joe" (synthetic id 1)
        assert_eq!(wp_value(wp_comments[0], "comment_user_id").text_content(), "1");
        assert_eq!(wp_value(wp_comments[1], "comment_user_id").text_content(), "0");
    }

    #[test]
    fn test_tag_slug_replaces_spaces_only() {
        let mut entry = test_entry(100, "Jane");
        entry.tags = vec!["szép zene".to_string()];
        let doc = roundtrip(&[entry], &[]);
        let channel = channel(&doc);

        let tag = channel.find(Some(XMLNS_WP), "tag").unwrap();
        assert_eq!(wp_value(tag, "tag_slug").text_content(), "szép-zene");
    }

    #[test]
    fn test_content_with_cdata_terminator_survives() {
        let mut entry = test_entry(100, "Jane");
        entry.content = "if (a[b[0]]> c) { }".to_string();
        let comments = vec![test_comment(200, 100, "Bob", "see: x]]>y")];
        let doc = roundtrip(&[entry], &comments);

        let item = channel(&doc).find(None, "item").unwrap();
        assert_eq!(
            item.find(Some(XMLNS_CONTENT), "encoded").unwrap().text_content(),
            "if (a[b[0]]> c) { }"
        );

        let comment = item.find(Some(XMLNS_WP), "comment").unwrap();
        assert_eq!(
            wp_value(comment, "comment_content").text_content(),
            "see: x]]>y"
        );
    }

    #[test]
    fn test_dates_formatted_local_and_gmt() {
        let doc = roundtrip(&[test_entry(100, "Jane")], &[]);
        let item = channel(&doc).find(None, "item").unwrap();

        assert_eq!(wp_value(item, "post_date").text_content(), "2010-08-07 12:34:56");
        assert_eq!(wp_value(item, "post_date_gmt").text_content(), "2010-08-07 10:34:56");
        assert_eq!(
            item.find(None, "pubDate").unwrap().text_content(),
            "Sat, 07 Aug 2010 10:34:56 GMT"
        );
    }

    #[test]
    fn test_synthetic_ids_are_deterministic() {
        let entries = vec![test_entry(100, "Jane"), test_entry(101, "Joe")];
        let comments = vec![test_comment(200, 101, "Bob", "hi")];
        let resolver = AuthorResolver::new();
        let when = Utc::now();

        let exporter = WxrExporter::default();
        let first = exporter
            .build_document(&entries, &comments, &resolver, when)
            .to_document_string()
            .unwrap();
        let second = exporter
            .build_document(&entries, &comments, &resolver, when)
            .to_document_string()
            .unwrap();

        assert_eq!(first, second);
    }
}
