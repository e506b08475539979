use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::blog::Viewer;

#[derive(Debug, Clone)]
struct CachedPage {
    body: Bytes,
    expires_at: Instant,
}

/// Rendered page bodies kept for a fixed time, at most `max_entries` of
/// them. Entries are never invalidated by writes; they simply age out.
pub struct PageCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CachedPage>>,
}

impl PageCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key for one page of a feed, scoped to the viewer. Built from the
    /// parsed page number so stray query parameters share an entry.
    pub fn key(viewer: &Viewer, path: &str, page: u64) -> String {
        format!("{}:{}?page={}", viewer.scope(), path, page)
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => {
                tracing::debug!("Page cache hit: {}", key);
                Some(entry.body.clone())
            }
            Some(_) => {
                entries.remove(key);
                tracing::debug!("Page cache expired: {}", key);
                None
            }
            None => {
                tracing::debug!("Page cache miss: {}", key);
                None
            }
        }
    }

    pub async fn insert(&self, key: String, body: Bytes) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            entries.retain(|_, entry| now < entry.expires_at);

            // Still full of live pages: drop the one closest to expiry
            while entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        tracing::debug!("Page cache full, evicting {}", k);
                        entries.remove(&k);
                    }
                    None => break,
                }
            }
        }

        entries.insert(
            key,
            CachedPage {
                body,
                expires_at: now + self.ttl,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
