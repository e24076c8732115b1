pub mod entities;
pub mod models;
pub mod wire;

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EditorError, EditorResult};
use entities::EntityIndex;
use models::*;

/// The ordered chunk sequence. Cloning is cheap: chunks are shared until
/// replaced, so a clone doubles as an undo snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentState {
    chunks: Vec<Arc<Chunk>>,
}

impl DocumentState {
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Segment ids of all chunks, concatenated in document order.
    pub fn segment_ids(&self) -> Vec<String> {
        self.chunks()
            .flat_map(|c| c.segment_ids().map(str::to_string))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Arc::new).collect(),
        }
    }
}

/// Owns every chunk, segment and token currently loaded.
#[derive(Debug)]
pub struct DocumentStore {
    meta: TranscriptMeta,
    state: DocumentState,
    index: EntityIndex,
    chunk_size: usize,
    next_key: u64,
    next_version: u64,
}

impl DocumentStore {
    /// Partition the transcript into chunks of `chunk_size` segments and
    /// index every token. Nothing is kept if the input is rejected.
    pub fn load(transcript: &Transcript, chunk_size: usize) -> EditorResult<Self> {
        if chunk_size == 0 {
            return Err(EditorError::Ingestion("chunk size must be at least 1".into()));
        }

        let segments = transcript
            .segments
            .iter()
            .map(build_segment)
            .collect::<EditorResult<Vec<_>>>()?;

        let mut store = DocumentStore {
            meta: TranscriptMeta {
                id: transcript.id.clone(),
                title: transcript.title.clone(),
                language: transcript.language.clone(),
            },
            state: DocumentState::default(),
            index: EntityIndex::new(),
            chunk_size,
            next_key: 0,
            next_version: 0,
        };

        for run in segments.chunks(chunk_size) {
            let chunk = Chunk {
                key: store.allocate_key(),
                version: store.allocate_version(),
                segments: run.to_vec(),
            };
            store.state.chunks.push(Arc::new(chunk));
        }

        store.index = EntityIndex::rebuild(store.state.chunks())
            .map_err(|dup| EditorError::Ingestion(dup.to_string()))?;

        info!(
            transcript = %store.meta.id,
            chunks = store.state.len(),
            segments = segments.len(),
            tokens = store.index.token_count(),
            "Loaded transcript"
        );
        Ok(store)
    }

    pub fn meta(&self) -> &TranscriptMeta {
        &self.meta
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn snapshot(&self) -> DocumentState {
        self.state.clone()
    }

    /// Swap in a previously captured state and rebuild the whole index.
    pub fn restore(&mut self, state: DocumentState) -> EditorResult<()> {
        let index = EntityIndex::rebuild(state.chunks())
            .map_err(|dup| EditorError::InvariantViolation(dup.to_string()))?;
        self.state = state;
        self.index = index;
        debug!(chunks = self.state.len(), "Document state restored");
        Ok(())
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.state.chunks()
    }

    pub fn chunk_keys(&self) -> Vec<ChunkKey> {
        self.state.chunks().map(|c| c.key).collect()
    }

    pub fn segment_ids(&self) -> Vec<String> {
        self.state.segment_ids()
    }

    pub fn get_chunk(&self, key: ChunkKey) -> EditorResult<&Chunk> {
        let pos = self.position(key)?;
        Ok(self.state.chunks[pos].as_ref())
    }

    /// The chunk following `key`, if any.
    pub fn next_chunk(&self, key: ChunkKey) -> EditorResult<Option<&Chunk>> {
        let pos = self.position(key)?;
        Ok(self.state.chunks.get(pos + 1).map(|c| c.as_ref()))
    }

    pub fn position(&self, key: ChunkKey) -> EditorResult<usize> {
        self.state
            .chunks
            .iter()
            .position(|c| c.key == key)
            .ok_or(EditorError::NotFound(key))
    }

    /// Resolve a token through the entity index.
    pub fn token(&self, id: &str) -> Option<&Token> {
        let loc = self.index.token(id)?;
        let chunk = self.state.chunks().find(|c| c.key == loc.chunk)?;
        chunk.segments.get(loc.segment)?.words.get(loc.token)
    }

    /// Chunk currently owning the token `id`.
    pub fn token_owner(&self, id: &str) -> Option<ChunkKey> {
        self.index.token(id).map(|loc| loc.chunk)
    }

    /// Chunk currently owning the segment `id`.
    pub fn segment_owner(&self, id: &str) -> Option<ChunkKey> {
        self.index.segment_chunk(id)
    }

    /// Substitute one chunk's segments, re-indexing only that chunk.
    pub fn replace_chunk(&mut self, key: ChunkKey, segments: Vec<Segment>) -> EditorResult<()> {
        let pos = self.position(key)?;
        let chunk = Chunk {
            key,
            version: self.next_version,
            segments,
        };
        chunk.check_timing().map_err(|e| {
            warn!(chunk = %key, error = %e, "Rejected chunk replacement");
            EditorError::InvariantViolation(format!("chunk {key}: {e}"))
        })?;
        self.index
            .check(&chunk, &[key])
            .map_err(|dup| EditorError::InvariantViolation(dup.to_string()))?;

        self.next_version += 1;
        let old = std::mem::replace(&mut self.state.chunks[pos], Arc::new(chunk));
        self.index.remove(&old);
        self.index.insert(&self.state.chunks[pos]);

        debug!(chunk = %key, version = self.state.chunks[pos].version, "Chunk replaced");
        Ok(())
    }

    /// Replace the contiguous run `first..=last` with `contents`, one chunk per
    /// entry. The first new chunk keeps `first`'s key; the rest get fresh keys.
    /// The concatenated segment order must be exactly the replaced run's.
    pub fn replace_range(
        &mut self,
        first: ChunkKey,
        last: ChunkKey,
        contents: Vec<Vec<Segment>>,
    ) -> EditorResult<Vec<ChunkKey>> {
        let start = self.position(first)?;
        let end = self.position(last)?;
        if end < start {
            return Err(EditorError::InvariantViolation(format!(
                "range {first}..={last} is reversed"
            )));
        }
        if contents.is_empty() || contents.iter().any(|c| c.is_empty()) {
            return Err(EditorError::InvariantViolation(format!(
                "replacement for {first}..={last} contains an empty chunk"
            )));
        }

        let old_ids: Vec<&str> = self.state.chunks[start..=end]
            .iter()
            .flat_map(|c| c.segment_ids())
            .collect();
        let new_ids: Vec<&str> = contents.iter().flatten().map(|s| s.id.as_str()).collect();
        if old_ids != new_ids {
            let detail = describe_divergence(&old_ids, &new_ids);
            warn!(first = %first, last = %last, %detail, "Rejected range replacement");
            return Err(EditorError::InvariantViolation(format!(
                "replacing {first}..={last} would change segment order: {detail}"
            )));
        }

        let replaced: Vec<ChunkKey> = self.state.chunks[start..=end].iter().map(|c| c.key).collect();
        let combined = Chunk {
            key: first,
            version: 0,
            segments: contents.iter().flatten().cloned().collect(),
        };
        combined.check_timing().map_err(|e| {
            EditorError::InvariantViolation(format!("replacing {first}..={last}: {e}"))
        })?;
        self.index
            .check(&combined, &replaced)
            .map_err(|dup| EditorError::InvariantViolation(dup.to_string()))?;

        let mut fresh = Vec::with_capacity(contents.len());
        for (i, segments) in contents.into_iter().enumerate() {
            let key = if i == 0 { first } else { self.allocate_key() };
            fresh.push(Arc::new(Chunk {
                key,
                version: self.allocate_version(),
                segments,
            }));
        }
        let keys: Vec<ChunkKey> = fresh.iter().map(|c| c.key).collect();

        let removed: Vec<Arc<Chunk>> = self.state.chunks.splice(start..=end, fresh).collect();
        for old in &removed {
            self.index.remove(old);
        }
        for chunk in &self.state.chunks[start..start + keys.len()] {
            self.index.insert(chunk);
        }

        info!(
            first = %first,
            last = %last,
            replaced = removed.len(),
            produced = keys.len(),
            "Chunk range replaced"
        );
        Ok(keys)
    }

    /// Re-split a chunk holding more than `chunk_size` segments into
    /// `chunk_size`-sized chunks. Returns the resulting keys in order.
    pub fn split_oversized(&mut self, key: ChunkKey) -> EditorResult<Vec<ChunkKey>> {
        let chunk = self.get_chunk(key)?;
        if chunk.segments.len() <= self.chunk_size {
            return Ok(vec![key]);
        }
        let contents: Vec<Vec<Segment>> = chunk
            .segments
            .chunks(self.chunk_size)
            .map(|run| run.to_vec())
            .collect();
        self.replace_range(key, key, contents)
    }

    fn allocate_key(&mut self) -> ChunkKey {
        let key = ChunkKey(self.next_key);
        self.next_key += 1;
        key
    }

    fn allocate_version(&mut self) -> u64 {
        let version = self.next_version;
        self.next_version += 1;
        version
    }
}

fn build_segment(input: &TranscriptSegment) -> EditorResult<Segment> {
    let mut words = Vec::with_capacity(input.words.len());
    for w in &input.words {
        let text = w.text.trim();
        if text.is_empty() {
            return Err(EditorError::Ingestion(format!(
                "word {} in segment {} has no text",
                w.id, input.id
            )));
        }
        if text.chars().any(char::is_whitespace) {
            return Err(EditorError::Ingestion(format!(
                "word {} in segment {} contains whitespace",
                w.id, input.id
            )));
        }
        words.push(Token::new(w.id.clone(), text, w.start, w.end));
    }

    let segment = Segment::new(input.id.clone(), input.speaker.clone(), words);
    segment
        .check_timing(f64::NEG_INFINITY)
        .map_err(|e| EditorError::Ingestion(format!("segment {}: {e}", input.id)))?;
    Ok(segment)
}

fn describe_divergence(old: &[&str], new: &[&str]) -> String {
    if old.len() != new.len() {
        let old_set: HashSet<&str> = old.iter().copied().collect();
        let new_set: HashSet<&str> = new.iter().copied().collect();
        let missing: Vec<&str> = old.iter().copied().filter(|id| !new_set.contains(id)).collect();
        let added: Vec<&str> = new.iter().copied().filter(|id| !old_set.contains(id)).collect();
        return format!(
            "{} segments became {} (missing: [{}], added: [{}])",
            old.len(),
            new.len(),
            missing.join(", "),
            added.join(", ")
        );
    }
    match old.iter().zip(new).position(|(a, b)| a != b) {
        Some(i) => format!("position {i} holds {} instead of {}", new[i], old[i]),
        None => "no divergence".to_string(),
    }
}
