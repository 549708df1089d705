//! In-memory LRU cache of transcript responses with a fixed TTL.
//! Key: sha256 of (video id | requested languages | timestamps flag).

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::TranscriptResult;

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_CAPACITY: usize = 1000;

/// Compute the cache key from request parameters.
///
/// `None` and an empty list are distinct, and language order matters.
pub fn fingerprint(video_id: &str, languages: Option<&[String]>, include_timestamps: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(video_id.as_bytes());
    hasher.update(b"|");
    match languages {
        Some(langs) => {
            hasher.update(b"[");
            hasher.update((langs.len() as u64).to_le_bytes());
            for lang in langs {
                hasher.update((lang.len() as u64).to_le_bytes());
                hasher.update(lang.as_bytes());
            }
            hasher.update(b"]");
        }
        None => hasher.update(b"-"),
    }
    hasher.update(b"|");
    hasher.update(if include_timestamps { b"1" } else { b"0" });
    format!("{:x}", hasher.finalize())
}

struct CacheEntry {
    result: TranscriptResult,
    expires_at: Instant,
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    // last_used tick -> key, oldest first
    recency: BTreeMap<u64, String>,
    tick: u64,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.last_used);
        }
    }
}

pub struct ResultCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    capacity: usize,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a cached response, marked `cached`. Returns None if absent or expired.
    pub fn get(&self, key: &str) -> Option<TranscriptResult> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<TranscriptResult> {
        let mut inner = self.inner.lock();
        let expired = now >= inner.entries.get(key)?.expires_at;
        if expired {
            debug!("Cache entry {key} expired");
            inner.remove(key);
            return None;
        }

        let tick = inner.next_tick();
        let Inner { entries, recency, .. } = &mut *inner;
        let entry = entries.get_mut(key)?;
        recency.remove(&entry.last_used);
        recency.insert(tick, key.to_string());
        entry.last_used = tick;

        Some(TranscriptResult {
            cached: true,
            ..entry.result.clone()
        })
    }

    /// Store a response, evicting the least recently used entries past capacity.
    pub fn put(&self, key: String, result: TranscriptResult) {
        self.put_at(key, result, Instant::now());
    }

    pub fn put_at(&self, key: String, result: TranscriptResult, now: Instant) {
        let mut inner = self.inner.lock();
        inner.remove(&key);

        let tick = inner.next_tick();
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                result,
                expires_at: now + self.ttl,
                last_used: tick,
            },
        );

        while inner.entries.len() > self.capacity {
            let Some((_, oldest)) = inner.recency.pop_first() else {
                break;
            };
            debug!("Cache full, evicting {oldest}");
            inner.entries.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(video_id: &str) -> TranscriptResult {
        TranscriptResult {
            success: true,
            video_id: video_id.to_string(),
            language: "en".to_string(),
            transcript: "[00:00] hello".to_string(),
            total_segments: 1,
            cached: false,
        }
    }

    #[test]
    fn test_put_then_get_marks_cached() {
        let cache = ResultCache::default();
        let stored = result("aaaaaaaaaaa");
        cache.put("k".to_string(), stored.clone());

        let hit = cache.get("k").unwrap();
        assert!(hit.cached);
        assert_eq!(TranscriptResult { cached: false, ..hit }, stored);
    }

    #[test]
    fn test_stored_result_is_not_mutated() {
        let cache = ResultCache::default();
        cache.put("k".to_string(), result("aaaaaaaaaaa"));
        cache.get("k");

        let inner = cache.inner.lock();
        assert!(!inner.entries["k"].result.cached);
    }

    #[test]
    fn test_missing_key() {
        let cache = ResultCache::default();
        assert!(cache.get("nope").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_is_absent_and_purged() {
        let cache = ResultCache::default();
        let now = Instant::now();
        cache.put_at("k".to_string(), result("aaaaaaaaaaa"), now);

        assert!(cache.get_at("k", now + DEFAULT_TTL - Duration::from_secs(1)).is_some());
        assert!(cache.get_at("k", now + DEFAULT_TTL + Duration::from_secs(1)).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ResultCache::new(2, DEFAULT_TTL);
        cache.put("a".to_string(), result("aaaaaaaaaaa"));
        cache.put("b".to_string(), result("bbbbbbbbbbb"));

        // touching "a" leaves "b" as the oldest
        assert!(cache.get("a").is_some());
        cache.put("c".to_string(), result("ccccccccccc"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let cache = ResultCache::new(2, DEFAULT_TTL);
        cache.put("a".to_string(), result("aaaaaaaaaaa"));
        cache.put("a".to_string(), result("zzzzzzzzzzz"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().video_id, "zzzzzzzzzzz");
    }

    #[test]
    fn test_fingerprint_distinguishes_parameters() {
        let en = vec!["en".to_string()];
        let en_pt = vec!["en".to_string(), "pt".to_string()];
        let pt_en = vec!["pt".to_string(), "en".to_string()];

        let base = fingerprint("dQw4w9WgXcQ", None, true);
        assert_eq!(base, fingerprint("dQw4w9WgXcQ", None, true));
        assert_eq!(base.len(), 64);

        assert_ne!(base, fingerprint("dQw4w9WgXcQ", None, false));
        assert_ne!(base, fingerprint("dQw4w9WgXcQ", Some(&[][..]), true));
        assert_ne!(base, fingerprint("aaaaaaaaaaa", None, true));
        assert_ne!(fingerprint("dQw4w9WgXcQ", Some(en.as_slice()), true), base);
        assert_ne!(
            fingerprint("dQw4w9WgXcQ", Some(en_pt.as_slice()), true),
            fingerprint("dQw4w9WgXcQ", Some(pt_en.as_slice()), true)
        );
    }

    #[test]
    fn test_fingerprint_language_boundaries() {
        let split = vec!["a".to_string(), "b".to_string()];
        let joined = vec!["a,b".to_string()];
        let shifted = vec!["ab".to_string(), String::new()];

        let split_key = fingerprint("dQw4w9WgXcQ", Some(split.as_slice()), true);
        assert_ne!(split_key, fingerprint("dQw4w9WgXcQ", Some(joined.as_slice()), true));
        assert_ne!(split_key, fingerprint("dQw4w9WgXcQ", Some(shifted.as_slice()), true));
    }
}
