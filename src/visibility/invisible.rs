//! Per-shard bitmaps of invisible document ordinals
//!
//! Invisible documents are the exception, so the set stores them rather than
//! the visible majority.

use std::collections::BTreeMap;

use roaring::RoaringBitmap;
use serde_json::{json, Value};

/// Documents that must be excluded for one snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvisibleSet {
    shards: BTreeMap<u32, RoaringBitmap>,
}

impl InvisibleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a document invisible
    pub fn insert(&mut self, shard: u32, ordinal: u32) {
        self.shards.entry(shard).or_default().insert(ordinal);
    }

    /// True if the document was marked invisible
    pub fn is_invisible(&self, shard: u32, ordinal: u32) -> bool {
        self.shards.get(&shard).is_some_and(|b| b.contains(ordinal))
    }

    /// Total invisible documents across shards
    pub fn len(&self) -> u64 {
        self.shards.values().map(RoaringBitmap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bitmap for one shard
    pub fn shard(&self, shard: u32) -> Option<&RoaringBitmap> {
        self.shards.get(&shard)
    }

    /// Shards with at least one invisible document
    pub fn shards(&self) -> impl Iterator<Item = u32> + '_ {
        self.shards.keys().copied()
    }

    /// Drops hits that are invisible; `locate` maps a hit to `(shard, ordinal)`
    pub fn retain_visible<T, F>(&self, hits: Vec<T>, locate: F) -> Vec<T>
    where
        F: Fn(&T) -> (u32, u32),
    {
        if self.shards.is_empty() {
            return hits;
        }
        hits.into_iter()
            .filter(|hit| {
                let (shard, ordinal) = locate(hit);
                !self.is_invisible(shard, ordinal)
            })
            .collect()
    }

    /// `{ "<shard>": [ordinals...] }`
    pub fn to_json(&self) -> Value {
        let shards: serde_json::Map<String, Value> = self
            .shards
            .iter()
            .map(|(shard, bitmap)| (shard.to_string(), json!(bitmap.iter().collect::<Vec<u32>>())))
            .collect();
        Value::Object(shards)
    }
}
