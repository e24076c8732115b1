use std::collections::{HashMap, HashSet};

use super::models::{Chunk, ChunkKey};

/// Where a token currently lives: chunk key plus positions inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLocation {
    pub chunk: ChunkKey,
    pub segment: usize,
    pub token: usize,
}

/// An id that is already owned elsewhere in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateId {
    Token(String),
    Segment(String),
}

impl std::fmt::Display for DuplicateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateId::Token(id) => write!(f, "duplicate token id {id}"),
            DuplicateId::Segment(id) => write!(f, "duplicate segment id {id}"),
        }
    }
}

/// Non-owning id → location index over the tokens and segments held by the
/// document store. Chunks own the data; this only records positions, so
/// rebuilding one chunk never leaves dangling references elsewhere.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    tokens: HashMap<String, TokenLocation>,
    segments: HashMap<String, ChunkKey>,
}

impl EntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Result<Self, DuplicateId> {
        let mut index = Self::new();
        for chunk in chunks {
            index.check(chunk, &[])?;
            index.insert(chunk);
        }
        Ok(index)
    }

    /// Would indexing `chunk` collide with ids owned by chunks other than
    /// `replacing`?
    pub fn check(&self, chunk: &Chunk, replacing: &[ChunkKey]) -> Result<(), DuplicateId> {
        let mut seen_segments = HashSet::new();
        let mut seen_tokens = HashSet::new();

        for segment in &chunk.segments {
            if !seen_segments.insert(segment.id.as_str()) {
                return Err(DuplicateId::Segment(segment.id.clone()));
            }
            if let Some(owner) = self.segments.get(&segment.id) {
                if !replacing.contains(owner) {
                    return Err(DuplicateId::Segment(segment.id.clone()));
                }
            }
            for token in &segment.words {
                if !seen_tokens.insert(token.id.as_str()) {
                    return Err(DuplicateId::Token(token.id.clone()));
                }
                if let Some(loc) = self.tokens.get(&token.id) {
                    if !replacing.contains(&loc.chunk) {
                        return Err(DuplicateId::Token(token.id.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Record every id in `chunk`. Callers run `check` first.
    pub fn insert(&mut self, chunk: &Chunk) {
        for (si, segment) in chunk.segments.iter().enumerate() {
            self.segments.insert(segment.id.clone(), chunk.key);
            for (ti, token) in segment.words.iter().enumerate() {
                self.tokens.insert(
                    token.id.clone(),
                    TokenLocation {
                        chunk: chunk.key,
                        segment: si,
                        token: ti,
                    },
                );
            }
        }
    }

    /// Drop the entries `chunk` contributed.
    pub fn remove(&mut self, chunk: &Chunk) {
        for segment in &chunk.segments {
            if self.segments.get(&segment.id) == Some(&chunk.key) {
                self.segments.remove(&segment.id);
            }
            for token in &segment.words {
                if self.tokens.get(&token.id).map(|loc| loc.chunk) == Some(chunk.key) {
                    self.tokens.remove(&token.id);
                }
            }
        }
    }

    pub fn token(&self, id: &str) -> Option<TokenLocation> {
        self.tokens.get(id).copied()
    }

    pub fn segment_chunk(&self, id: &str) -> Option<ChunkKey> {
        self.segments.get(id).copied()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::models::{Segment, Token};

    fn chunk(key: u64, segs: &[(&str, &[&str])]) -> Chunk {
        Chunk {
            key: ChunkKey(key),
            version: 0,
            segments: segs
                .iter()
                .map(|(id, words)| {
                    Segment::new(
                        *id,
                        None,
                        words.iter().map(|w| Token::new(*w, *w, 0.0, 0.0)).collect(),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn indexes_token_positions() {
        let c = chunk(0, &[("p1", &["a", "b"]), ("p2", &["c"])]);
        let index = EntityIndex::rebuild([&c]).unwrap();
        assert_eq!(
            index.token("c"),
            Some(TokenLocation {
                chunk: ChunkKey(0),
                segment: 1,
                token: 0
            })
        );
        assert_eq!(index.segment_chunk("p2"), Some(ChunkKey(0)));
        assert_eq!(index.token_count(), 3);
    }

    #[test]
    fn rejects_ids_owned_by_other_chunks() {
        let a = chunk(0, &[("p1", &["a"])]);
        let b = chunk(1, &[("p2", &["a"])]);
        assert_eq!(
            EntityIndex::rebuild([&a, &b]).unwrap_err(),
            DuplicateId::Token("a".into())
        );

        let index = EntityIndex::rebuild([&a]).unwrap();
        // Replacing the owner itself is fine.
        assert!(index.check(&chunk(0, &[("p1", &["a"])]), &[ChunkKey(0)]).is_ok());
        assert!(index.check(&chunk(1, &[("p1", &["z"])]), &[]).is_err());
    }

    #[test]
    fn remove_only_drops_own_entries() {
        let a = chunk(0, &[("p1", &["a"])]);
        let mut index = EntityIndex::rebuild([&a]).unwrap();
        index.remove(&chunk(1, &[("p1", &["a"])]));
        assert!(index.token("a").is_some());
        index.remove(&a);
        assert!(index.token("a").is_none());
        assert_eq!(index.segment_count(), 0);
    }
}
