use std::time::Duration;
use dashmap::DashMap;
use tokio::time::Instant;
use crate::types::Quote;

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub quote: Quote,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at < now
    }
}

/// Time-boxed quote store. Expiry is lazy: stale entries are dropped by the
/// read that finds them, there is no sweeper task.
pub struct QuoteCache {
    entries: DashMap<String, CacheEntry>,
    cache_time: Duration,
}

impl QuoteCache {
    pub fn new(cache_time: Duration) -> Self {
        QuoteCache {
            entries: DashMap::new(),
            cache_time,
        }
    }

    pub fn set(&self, key: &str, quote: Quote) {
        let expires_at = Instant::now() + self.cache_time;
        self.entries.insert(key.to_string(), CacheEntry { quote, expires_at });
    }

    pub fn get(&self, key: &str) -> Option<Quote> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.quote.clone());
            }
        }
        // The read guard is released above; re-check under the write lock so a
        // concurrent fresh `set` is not discarded.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn get_all(&self) -> Vec<Quote> {
        let now = Instant::now();
        let mut valid = Vec::with_capacity(self.entries.len());
        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                false
            } else {
                valid.push(entry.quote.clone());
                true
            }
        });
        valid
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Counts entries without expiring them.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn cache_time(&self) -> Duration {
        self.cache_time
    }
}
