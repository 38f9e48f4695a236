//! Bounded cache of synthesized phrases.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::provider::AudioClip;

/// Longest text worth caching. Long one-off sentences would evict the
/// short prompts the cache exists for.
const MAX_CACHEABLE_LEN: usize = 100;

/// LRU cache of synthesized clips keyed by exact text.
///
/// Entries are shared via `Arc`, so a clip evicted while the player is
/// still using it stays alive until playback finishes.
pub struct PhraseCache {
    capacity: usize,
    clips: HashMap<String, Arc<AudioClip>>,
    /// Front is the least recently used key.
    order: VecDeque<String>,
}

impl PhraseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clips: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns the cached clip and marks it most recently used.
    pub fn get(&mut self, text: &str) -> Option<Arc<AudioClip>> {
        let clip = self.clips.get(text)?.clone();
        self.touch(text);
        Some(clip)
    }

    /// Caches a clip. Texts beyond the cacheable length are ignored; the
    /// least recently used entry is dropped when full.
    pub fn insert(&mut self, text: &str, clip: Arc<AudioClip>) {
        if self.capacity == 0 || text.len() > MAX_CACHEABLE_LEN {
            return;
        }
        if self.clips.insert(text.to_string(), clip).is_some() {
            self.touch(text);
            return;
        }
        self.order.push_back(text.to_string());
        if self.clips.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.clips.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    fn touch(&mut self, text: &str) {
        if let Some(pos) = self.order.iter().position(|t| t == text) {
            if let Some(key) = self.order.remove(pos) {
                self.order.push_back(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn clip(text: &str) -> Arc<AudioClip> {
        Arc::new(AudioClip {
            data: Bytes::from(text.as_bytes().to_vec()),
        })
    }

    #[test]
    fn stores_and_returns() {
        let mut cache = PhraseCache::new(4);
        cache.insert("hello", clip("hello"));
        assert!(cache.get("hello").is_some());
        assert!(cache.get("missing").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_is_bounded_lru() {
        let mut cache = PhraseCache::new(2);
        cache.insert("a", clip("a"));
        cache.insert("b", clip("b"));

        // Touch "a" so "b" is the LRU victim.
        cache.get("a");
        cache.insert("c", clip("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn long_texts_are_not_cached() {
        let mut cache = PhraseCache::new(4);
        let long = "x".repeat(MAX_CACHEABLE_LEN + 1);
        cache.insert(&long, clip("long"));
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_caches_nothing() {
        let mut cache = PhraseCache::new(0);
        cache.insert("a", clip("a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn evicted_clip_survives_while_referenced() {
        let mut cache = PhraseCache::new(1);
        cache.insert("a", clip("a"));
        let held = cache.get("a").unwrap();

        cache.insert("b", clip("b"));
        assert!(cache.get("a").is_none(), "evicted from the cache");
        assert_eq!(&held.data[..], b"a", "but the clip itself is still alive");
    }

    #[test]
    fn reinsert_updates_clip() {
        let mut cache = PhraseCache::new(2);
        cache.insert("a", clip("one"));
        cache.insert("a", clip("two"));
        assert_eq!(cache.len(), 1);
        assert_eq!(&cache.get("a").unwrap().data[..], b"two");
    }
}
