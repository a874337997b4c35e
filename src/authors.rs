// 👤 Author Resolver - commenter identity resolution with cache + lookup
//
// Anonymous commenters are fully known at parse time. Authenticated ones
// arrive as a numeric id; the display name comes from the on-disk cache
// (users.txt) or, failing that, from one remote profile lookup per id
// per run. All comments by the same id share one table slot, so the
// resolved name is visible everywhere once flush() returns.
//
// Lookup failures are not fatal: the name falls back to the stringified
// id and the pair still lands in the persisted cache.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::entities::{AuthorHandle, Identity};

/// Cache file name, resolved against the working directory
pub const DEFAULT_CACHE_FILE: &str = "users.txt";

/// Upper bound on in-flight profile lookups during flush
const MAX_CONCURRENT_LOOKUPS: usize = 8;

// ============================================================================
// NAME LOOKUP CONTRACT
// ============================================================================

/// External collaborator: numeric user id → display name.
///
/// Implementations may fail; the resolver absorbs the failure and falls
/// back to the id's string form.
#[async_trait]
pub trait NameLookup: Send + Sync {
    async fn display_name(&self, id: i64) -> Result<String>;
}

/// Production lookup: scrape the display name out of the remote profile
/// page. The heuristic is fragile and environment-specific by design.
pub struct ProfileLookup {
    client: reqwest::Client,
    base_url: String,
}

impl ProfileLookup {
    pub const DEFAULT_BASE_URL: &'static str = "http://admin.freeblog.hu";

    pub fn new(base_url: &str) -> Self {
        ProfileLookup {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for ProfileLookup {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl NameLookup for ProfileLookup {
    async fn display_name(&self, id: i64) -> Result<String> {
        let url = format!("{}/profile/{}/", self.base_url, id);
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", url))?
            .text()
            .await
            .context("profile page body was not readable")?;

        extract_profile_name(&body, id)
    }
}

/// Pull the display name out of a profile page.
///
/// The page renders the name inside the first <h1> with spaces encoded
/// as `&#32;`. A name starting with "Ez a " is the platform's "no public
/// name" placeholder page, in which case the id's string form is used.
/// Known " blogger"/" bloggerina" title suffixes are stripped.
pub fn extract_profile_name(html: &str, id: i64) -> Result<String> {
    let start = html.find("<h1>").context("profile page has no <h1> marker")? + 4;
    let end = html[start..]
        .find("</h1>")
        .context("profile page <h1> is not closed")?
        + start;

    let name = html[start..end].replace("&#32;", " ");

    if name.starts_with("Ez a ") {
        return Ok(id.to_string());
    }

    // order matters: " bloggerina" contains " blogger"
    let name = name.replace(" bloggerina", "");
    let name = name.replace(" blogger", "");
    Ok(name)
}

// ============================================================================
// RAW AUTHOR INPUT
// ============================================================================

/// Parsed author indicator from a source comment item
#[derive(Debug, Clone)]
pub struct RawAuthor {
    /// The item's "isAuthenticated" flag
    pub authenticated: bool,

    /// Display name (anonymous) or numeric user id (authenticated)
    pub value: String,

    /// Sibling email field, present for anonymous authors only
    pub email: Option<String>,
}

// ============================================================================
// AUTHOR RESOLVER
// ============================================================================

#[derive(Debug, Clone)]
struct AuthenticatedAuthor {
    id: i64,
    name: Option<String>,
}

/// Identity table for authenticated commenters plus the cache around it.
///
/// Handles returned by resolve_author index into the table; the driver
/// must await flush() before any consumer reads an authenticated name.
#[derive(Debug, Default)]
pub struct AuthorResolver {
    authors: Vec<AuthenticatedAuthor>,
    by_id: HashMap<i64, usize>,
}

impl AuthorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted id→name cache. A missing file is an empty
    /// cache; a malformed line is fatal.
    pub fn load_cache(path: &Path) -> Result<Self> {
        let mut resolver = Self::new();

        if !path.exists() {
            return Ok(resolver);
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("cannot read author cache {}", path.display()))?;

        for (number, line) in data.lines().enumerate() {
            let (id, name) = line.split_once('\t').with_context(|| {
                format!("author cache {}: line {} has no tab", path.display(), number + 1)
            })?;
            let id: i64 = id.trim().parse().with_context(|| {
                format!("author cache {}: line {} has a bad id", path.display(), number + 1)
            })?;
            resolver.insert(id, Some(name.to_string()));
        }

        Ok(resolver)
    }

    /// Resolve a raw author indicator into an Identity.
    ///
    /// Idempotent for authenticated ids: the same id always yields the
    /// same handle, so one resolved name serves every comment by that
    /// author.
    pub fn resolve_author(&mut self, raw: &RawAuthor) -> Result<Identity> {
        if !raw.authenticated {
            return Ok(Identity::Anonymous {
                name: raw.value.clone(),
                email: raw.email.clone().unwrap_or_default(),
            });
        }

        let id: i64 = raw
            .value
            .trim()
            .parse()
            .with_context(|| format!("authenticated author id '{}' is not numeric", raw.value))?;

        let index = match self.by_id.get(&id) {
            Some(&index) => index,
            None => self.insert(id, None),
        };

        Ok(Identity::Authenticated(AuthorHandle(index)))
    }

    fn insert(&mut self, id: i64, name: Option<String>) -> usize {
        let index = self.authors.len();
        self.authors.push(AuthenticatedAuthor { id, name });
        self.by_id.insert(id, index);
        index
    }

    /// Number of authenticated authors still awaiting a name
    pub fn pending_count(&self) -> usize {
        self.authors.iter().filter(|a| a.name.is_none()).count()
    }

    /// Perform every still-pending lookup, at most MAX_CONCURRENT_LOOKUPS
    /// in flight at once, and wait for all of them. Failed lookups fall
    /// back to the stringified id. Returns the number of lookups run.
    pub async fn flush(&mut self, lookup: Arc<dyn NameLookup>) -> usize {
        let pending: Vec<(usize, i64)> = self
            .authors
            .iter()
            .enumerate()
            .filter(|(_, a)| a.name.is_none())
            .map(|(index, a)| (index, a.id))
            .collect();

        let total = pending.len();
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_LOOKUPS));
        let mut tasks = JoinSet::new();

        for (index, id) in pending {
            let lookup = Arc::clone(&lookup);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                // the semaphore is never closed, so acquire cannot fail
                let _permit = semaphore.acquire_owned().await.ok();

                match lookup.display_name(id).await {
                    Ok(name) => {
                        tracing::debug!(user_id = id, name = %name, "resolved author");
                        (index, id, Some(name))
                    }
                    Err(err) => {
                        tracing::warn!(
                            user_id = id,
                            error = %err,
                            "author lookup failed, falling back to numeric id"
                        );
                        (index, id, None)
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, id, name)) => {
                    self.authors[index].name = Some(name.unwrap_or_else(|| id.to_string()));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "author lookup task panicked");
                }
            }
        }

        // invariant after flush: every authenticated author has a name
        for author in &mut self.authors {
            if author.name.is_none() {
                author.name = Some(author.id.to_string());
            }
        }

        total
    }

    /// Persist the full id→name mapping, overwriting the cache file
    pub fn persist_cache(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("cannot write author cache {}", path.display()))?;
        let mut out = std::io::BufWriter::new(file);

        for author in &self.authors {
            if let Some(name) = &author.name {
                writeln!(out, "{}\t{}", author.id, name)?;
            }
        }

        out.flush()?;
        Ok(())
    }

    /// Display name behind an identity. Authenticated names are only
    /// meaningful after flush() has completed.
    pub fn name_of<'a>(&'a self, identity: &'a Identity) -> &'a str {
        match identity {
            Identity::Anonymous { name, .. } => name,
            Identity::Authenticated(handle) => {
                self.authors[handle.0].name.as_deref().unwrap_or("")
            }
        }
    }

    /// Email behind an identity. Authenticated authors never get one;
    /// the export emits an empty email for them.
    pub fn email_of<'a>(&'a self, identity: &'a Identity) -> &'a str {
        match identity {
            Identity::Anonymous { email, .. } => email,
            Identity::Authenticated(_) => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapLookup {
        names: HashMap<i64, String>,
        calls: AtomicUsize,
    }

    impl MapLookup {
        fn new(pairs: &[(i64, &str)]) -> Self {
            MapLookup {
                names: pairs.iter().map(|(id, n)| (*id, n.to_string())).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NameLookup for MapLookup {
        async fn display_name(&self, id: i64) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.names.get(&id) {
                Some(name) => Ok(name.clone()),
                None => bail!("no such user"),
            }
        }
    }

    fn authenticated(id: i64) -> RawAuthor {
        RawAuthor {
            authenticated: true,
            value: id.to_string(),
            email: None,
        }
    }

    #[test]
    fn test_anonymous_author_is_complete() {
        let mut resolver = AuthorResolver::new();
        let identity = resolver
            .resolve_author(&RawAuthor {
                authenticated: false,
                value: "Bob".to_string(),
                email: Some("bob@x.com".to_string()),
            })
            .unwrap();

        assert_eq!(resolver.name_of(&identity), "Bob");
        assert_eq!(resolver.email_of(&identity), "bob@x.com");
        assert_eq!(resolver.pending_count(), 0);
    }

    #[test]
    fn test_same_id_shares_one_handle() {
        let mut resolver = AuthorResolver::new();
        let first = resolver.resolve_author(&authenticated(42)).unwrap();
        let second = resolver.resolve_author(&authenticated(42)).unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.pending_count(), 1);
    }

    #[test]
    fn test_non_numeric_authenticated_id_is_fatal() {
        let mut resolver = AuthorResolver::new();
        let raw = RawAuthor {
            authenticated: true,
            value: "not-a-number".to_string(),
            email: None,
        };
        assert!(resolver.resolve_author(&raw).is_err());
    }

    #[tokio::test]
    async fn test_flush_resolves_every_pending_author() {
        let mut resolver = AuthorResolver::new();
        let a = resolver.resolve_author(&authenticated(1)).unwrap();
        let b = resolver.resolve_author(&authenticated(2)).unwrap();

        let ran = resolver
            .flush(Arc::new(MapLookup::new(&[(1, "Jane"), (2, "Joe")])))
            .await;

        assert_eq!(ran, 2);
        assert_eq!(resolver.name_of(&a), "Jane");
        assert_eq!(resolver.name_of(&b), "Joe");
        assert_eq!(resolver.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_lookup_falls_back_to_id() {
        let mut resolver = AuthorResolver::new();
        let identity = resolver.resolve_author(&authenticated(77)).unwrap();

        resolver.flush(Arc::new(MapLookup::new(&[]))).await;

        assert_eq!(resolver.name_of(&identity), "77");
        assert_eq!(resolver.email_of(&identity), "");
    }

    #[tokio::test]
    async fn test_cached_author_is_not_looked_up_again() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("users.txt");
        fs::write(&cache, "42\tCached Name\n").unwrap();

        let mut resolver = AuthorResolver::load_cache(&cache).unwrap();
        let identity = resolver.resolve_author(&authenticated(42)).unwrap();

        let lookup = Arc::new(MapLookup::new(&[(42, "Fresh Name")]));
        let ran = resolver.flush(lookup.clone()).await;

        assert_eq!(ran, 0);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
        assert_eq!(resolver.name_of(&identity), "Cached Name");
    }

    #[test]
    fn test_cache_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = AuthorResolver::load_cache(&dir.path().join("nope.txt")).unwrap();
        assert_eq!(resolver.pending_count(), 0);
        assert!(resolver.authors.is_empty());
    }

    #[test]
    fn test_cache_malformed_line_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("users.txt");

        fs::write(&cache, "42 no tab here\n").unwrap();
        assert!(AuthorResolver::load_cache(&cache).is_err());

        fs::write(&cache, "notanumber\tJane\n").unwrap();
        assert!(AuthorResolver::load_cache(&cache).is_err());
    }

    #[test]
    fn test_cache_roundtrip_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("users.txt");
        let original = "1\tJane\n2\tJoe Blogs\n";
        fs::write(&cache, original).unwrap();

        let resolver = AuthorResolver::load_cache(&cache).unwrap();
        let out = dir.path().join("users-out.txt");
        resolver.persist_cache(&out).unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap(), original);
    }

    #[tokio::test]
    async fn test_persisted_cache_includes_new_resolutions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("users.txt");
        fs::write(&cache, "1\tJane\n").unwrap();

        let mut resolver = AuthorResolver::load_cache(&cache).unwrap();
        resolver.resolve_author(&authenticated(2)).unwrap();
        resolver.flush(Arc::new(MapLookup::new(&[(2, "Joe")]))).await;
        resolver.persist_cache(&cache).unwrap();

        let data = fs::read_to_string(&cache).unwrap();
        assert!(data.contains("1\tJane"));
        assert!(data.contains("2\tJoe"));
    }

    #[test]
    fn test_extract_profile_name() {
        let html = "<html><body><h1>Jane&#32;Doe blogger</h1></body></html>";
        assert_eq!(extract_profile_name(html, 9).unwrap(), "Jane Doe");

        let html = "<h1>Anna bloggerina</h1>";
        assert_eq!(extract_profile_name(html, 9).unwrap(), "Anna");
    }

    #[test]
    fn test_extract_profile_name_placeholder_page() {
        let html = "<h1>Ez a profil nem nyilv\u{e1}nos</h1>";
        assert_eq!(extract_profile_name(html, 123).unwrap(), "123");
    }

    #[test]
    fn test_extract_profile_name_missing_marker() {
        assert!(extract_profile_name("<html>no heading</html>", 1).is_err());
    }
}
