//! Read-only projection of off-screen chunks and the per-chunk visibility
//! state that decides between preview and live content.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::document::models::{Chunk, ChunkKey};
use crate::document::wire::{RawBlock, RawBlockData, RawChunk, BLOCK_TYPE};

/// A chunk stripped down to paragraph text and metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewChunk {
    pub key: ChunkKey,
    pub version: u64,
    pub blocks: Vec<PreviewBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewBlock {
    pub id: String,
    pub speaker: Option<String>,
    pub text: String,
}

pub fn project(chunk: &Chunk) -> PreviewChunk {
    PreviewChunk {
        key: chunk.key,
        version: chunk.version,
        blocks: chunk
            .segments
            .iter()
            .map(|s| PreviewBlock {
                id: s.id.clone(),
                speaker: s.speaker.clone(),
                text: s.text(),
            })
            .collect(),
    }
}

impl PreviewChunk {
    /// Wire form with no entities and no style ranges.
    pub fn to_raw(&self) -> RawChunk {
        RawChunk {
            blocks: self
                .blocks
                .iter()
                .map(|b| RawBlock {
                    key: b.id.clone(),
                    kind: BLOCK_TYPE.to_string(),
                    text: b.text.clone(),
                    data: RawBlockData {
                        start: None,
                        end: None,
                        speaker: b.speaker.clone(),
                        id: b.id.clone(),
                    },
                    entity_ranges: Vec::new(),
                    inline_style_ranges: Vec::new(),
                })
                .collect(),
            entity_map: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Visibility {
    /// Rendered from the preview projection; read-only.
    #[default]
    Hidden,
    /// Rendered from live content; editable.
    Visible,
}

/// Per-chunk visibility. Chunks never signalled are `Hidden`.
#[derive(Debug, Default)]
pub struct VisibilityTracker {
    states: HashMap<ChunkKey, Visibility>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ChunkKey) -> Visibility {
        self.states.get(&key).copied().unwrap_or_default()
    }

    pub fn is_visible(&self, key: ChunkKey) -> bool {
        self.get(key) == Visibility::Visible
    }

    /// Apply a visibility signal. Repeating the current value is a no-op;
    /// returns whether the state changed.
    pub fn set(&mut self, key: ChunkKey, visible: bool) -> bool {
        let next = if visible {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
        let prev = self.states.insert(key, next).unwrap_or_default();
        if prev != next {
            debug!(chunk = %key, ?next, "Visibility changed");
        }
        prev != next
    }

    /// Drop state for a chunk that no longer exists (absorbed by a merge).
    pub fn forget(&mut self, key: ChunkKey) {
        self.states.remove(&key);
    }

    pub fn visible_keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.states
            .iter()
            .filter(|(_, v)| **v == Visibility::Visible)
            .map(|(k, _)| *k)
    }
}

/// Projections keyed by `(key, version)`; a version is never reused for
/// different content, so entries never go stale.
#[derive(Debug, Default)]
pub struct PreviewCache {
    entries: HashMap<(ChunkKey, u64), Arc<PreviewChunk>>,
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_project(&mut self, chunk: &Chunk) -> Arc<PreviewChunk> {
        self.entries
            .entry((chunk.key, chunk.version))
            .or_insert_with(|| Arc::new(project(chunk)))
            .clone()
    }

    /// Keep only entries for the given `(key, version)` pairs.
    pub fn retain_live(&mut self, live: &[(ChunkKey, u64)]) {
        self.entries.retain(|k, _| live.contains(k));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::models::{Segment, Token};

    fn chunk(version: u64) -> Chunk {
        Chunk {
            key: ChunkKey(2),
            version,
            segments: vec![
                Segment::new(
                    "P1",
                    Some("Ann".into()),
                    vec![
                        Token::new("a", "hello", 0.0, 1.0),
                        Token::new("b", "there", 1.0, 2.0),
                    ],
                ),
                Segment::new("P2", None, Vec::new()),
            ],
        }
    }

    #[test]
    fn projection_strips_annotations_but_keeps_text() {
        let c = chunk(0);
        let preview = project(&c);
        assert_eq!(preview.blocks[0].text, "hello there");
        assert_eq!(preview.blocks[0].speaker.as_deref(), Some("Ann"));
        assert_eq!(preview.blocks[1].text, "");

        let raw = preview.to_raw();
        assert!(raw.entity_map.is_empty());
        assert!(raw
            .blocks
            .iter()
            .all(|b| b.entity_ranges.is_empty() && b.inline_style_ranges.is_empty()));
        let texts: Vec<&str> = raw.blocks.iter().map(|b| b.text.as_str()).collect();
        let live = RawChunk::from_chunk(&c);
        let live_texts: Vec<&str> = live.blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, live_texts);
    }

    #[test]
    fn visibility_transitions_are_idempotent() {
        let mut tracker = VisibilityTracker::new();
        assert_eq!(tracker.get(ChunkKey(0)), Visibility::Hidden);
        assert!(!tracker.set(ChunkKey(0), false));
        assert!(tracker.set(ChunkKey(0), true));
        assert!(!tracker.set(ChunkKey(0), true));
        assert!(tracker.is_visible(ChunkKey(0)));
        assert_eq!(tracker.visible_keys().collect::<Vec<_>>(), vec![ChunkKey(0)]);
        assert!(tracker.set(ChunkKey(0), false));
        tracker.forget(ChunkKey(0));
        assert_eq!(tracker.get(ChunkKey(0)), Visibility::Hidden);
    }

    #[test]
    fn cache_is_keyed_by_version() {
        let mut cache = PreviewCache::new();
        let first = cache.get_or_project(&chunk(1));
        let again = cache.get_or_project(&chunk(1));
        assert!(Arc::ptr_eq(&first, &again));

        cache.get_or_project(&chunk(2));
        assert_eq!(cache.len(), 2);
        cache.retain_live(&[(ChunkKey(2), 2)]);
        assert_eq!(cache.len(), 1);
    }
}
