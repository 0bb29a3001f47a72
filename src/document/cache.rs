//! Bounded cache of derived per-document artifacts.
//!
//! Entries are keyed by URI and remember the version and language id they were
//! parsed from; a lookup with a different version or language replaces the
//! entry instead of updating it. Two independent policies bound the cache:
//! least-recently-used eviction when an insert exceeds capacity, and a
//! periodic sweep dropping entries idle for longer than the sweep interval.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower_lsp::lsp_types::Url;

use super::text::TextDocument;

/// Capacity and sweep settings for a [`DocumentCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct CacheEntry<T> {
    version: i32,
    language_id: String,
    value: Arc<T>,
    last_access: Instant,
}

type Parser<T> = Box<dyn Fn(&TextDocument) -> T + Send + Sync>;

/// Parse-or-return-cached store keyed by document identity and version.
pub struct DocumentCache<T> {
    entries: DashMap<Url, CacheEntry<T>>,
    config: CacheConfig,
    parse: Parser<T>,
}

impl<T> DocumentCache<T> {
    pub fn new(
        config: CacheConfig,
        parse: impl Fn(&TextDocument) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            parse: Box::new(parse),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Return the artifact for `document`, parsing it when absent or stale.
    pub fn get(&self, document: &TextDocument) -> Arc<T> {
        self.get_at(document, Instant::now())
    }

    pub(crate) fn get_at(&self, document: &TextDocument, now: Instant) -> Arc<T> {
        if let Some(mut entry) = self.entries.get_mut(document.uri()) {
            if entry.version == document.version() && entry.language_id == document.language_id()
            {
                entry.last_access = now;
                return Arc::clone(&entry.value);
            }
        }

        let value = Arc::new((self.parse)(document));
        self.entries.insert(
            document.uri().clone(),
            CacheEntry {
                version: document.version(),
                language_id: document.language_id().to_string(),
                value: Arc::clone(&value),
                last_access: now,
            },
        );
        evict_least_recent(&self.entries, self.config.max_entries);
        value
    }

    /// Drop the entry for `uri`, if any.
    pub fn invalidate(&self, uri: &Url) {
        self.entries.remove(uri);
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries idle for longer than the sweep interval. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        sweep_expired(&self.entries, now, self.config.sweep_interval)
    }
}

impl<T: Send + Sync + 'static> DocumentCache<T> {
    /// Run [`DocumentCache::sweep`] every sweep interval on the tokio runtime.
    ///
    /// The task holds a weak reference and stops once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let dropped = cache.sweep();
                if dropped > 0 {
                    tracing::debug!(dropped, remaining = cache.len(), "swept idle cache entries");
                }
            }
        })
    }
}

/// LRU policy: evict the least recently accessed entries until within capacity.
fn evict_least_recent<T>(entries: &DashMap<Url, CacheEntry<T>>, max_entries: usize) {
    while entries.len() > max_entries {
        let oldest = entries
            .iter()
            .min_by_key(|entry| entry.last_access)
            .map(|entry| entry.key().clone());
        match oldest {
            Some(uri) => {
                tracing::trace!(%uri, "evicting least recently used cache entry");
                entries.remove(&uri);
            }
            None => break,
        }
    }
}

/// Age policy: drop entries whose last access is older than `max_idle`.
fn sweep_expired<T>(entries: &DashMap<Url, CacheEntry<T>>, now: Instant, max_idle: Duration) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| now.saturating_duration_since(entry.last_access) <= max_idle);
    before - entries.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc(name: &str, version: i32) -> TextDocument {
        let uri = Url::parse(&format!("file:///{name}.html")).unwrap();
        TextDocument::new(uri, "html", version, format!("<p>{name}</p>"))
    }

    fn counting_cache(max_entries: usize) -> (DocumentCache<usize>, Arc<AtomicUsize>) {
        let parses = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&parses);
        let config = CacheConfig {
            max_entries,
            sweep_interval: Duration::from_secs(60),
        };
        let cache = DocumentCache::new(config, move |document: &TextDocument| {
            counter.fetch_add(1, Ordering::SeqCst);
            document.text().len()
        });
        (cache, parses)
    }

    #[test]
    fn returns_cached_value_for_same_version() {
        let (cache, parses) = counting_cache(10);
        let a = doc("a", 1);
        let first = cache.get(&a);
        let second = cache.get(&a);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(parses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reparses_on_version_change() {
        let (cache, parses) = counting_cache(10);
        cache.get(&doc("a", 1));
        cache.get(&doc("a", 2));
        assert_eq!(parses.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn reparses_on_language_change() {
        let (cache, parses) = counting_cache(10);
        let a = doc("a", 1);
        cache.get(&a);
        let renamed = TextDocument::new(a.uri().clone(), "vue", 1, a.text().to_string());
        cache.get(&renamed);
        assert_eq!(parses.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn evicts_least_recently_used() {
        let (cache, _) = counting_cache(2);
        let start = Instant::now();
        let (a, b, c) = (doc("a", 1), doc("b", 1), doc("c", 1));
        cache.get_at(&a, start);
        cache.get_at(&b, start + Duration::from_secs(1));
        cache.get_at(&a, start + Duration::from_secs(2));
        cache.get_at(&c, start + Duration::from_secs(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(a.uri()));
        assert!(!cache.contains(b.uri()));
        assert!(cache.contains(c.uri()));
    }

    #[test]
    fn sweep_drops_idle_entries() {
        let (cache, _) = counting_cache(10);
        let start = Instant::now();
        let (a, b) = (doc("a", 1), doc("b", 1));
        cache.get_at(&a, start);
        cache.get_at(&b, start + Duration::from_secs(50));
        let dropped = cache.sweep_at(start + Duration::from_secs(90));
        assert_eq!(dropped, 1);
        assert!(!cache.contains(a.uri()));
        assert!(cache.contains(b.uri()));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_drops_idle_entries() {
        let (cache, _) = counting_cache(10);
        let cache = Arc::new(cache);
        let (a, b) = (doc("a", 1), doc("b", 1));
        cache.get(&a);
        let sweeper = cache.spawn_sweeper();

        tokio::time::sleep(Duration::from_secs(90)).await;
        cache.get(&b);
        assert!(cache.contains(a.uri()));

        // The sweep at 120s finds `a` idle for 120s and `b` for 30s.
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(!cache.contains(a.uri()));
        assert!(cache.contains(b.uri()));

        drop(cache);
        // With the cache gone the task ends at its next tick.
        sweeper.await.unwrap();
    }

    #[test]
    fn invalidate_removes_entry() {
        let (cache, parses) = counting_cache(10);
        let a = doc("a", 1);
        cache.get(&a);
        cache.invalidate(a.uri());
        assert!(cache.is_empty());
        cache.get(&a);
        assert_eq!(parses.load(Ordering::SeqCst), 2);
    }
}
