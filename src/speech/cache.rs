use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use super::AudioClip;

/// Synthesized audio keyed by `cache_key`, falling back to the text itself.
///
/// Entries live as long as the cache; nothing expires and nothing is written
/// to disk.
#[derive(Default)]
pub struct NarrationCache {
    entries: Mutex<HashMap<String, AudioClip>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NarrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_for<'a>(text: &'a str, cache_key: Option<&'a str>) -> &'a str {
        cache_key.unwrap_or(text)
    }

    pub fn get(&self, key: &str) -> Option<AudioClip> {
        let found = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned();

        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: impl Into<String>, clip: AudioClip) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.into(), clip);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
