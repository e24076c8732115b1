//! Applying user edits to a chunk, including the boundary merge that lets a
//! chunk absorb its successor when the cursor runs off its end.

mod retokenize;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::document::models::{Chunk, ChunkKey, Segment};
use crate::document::wire::RawEntityRange;
use crate::document::DocumentStore;
use crate::error::{EditorError, EditorResult};
use crate::ids::IdGenerator;

/// One block of edited chunk content, as reported by the editing surface.
/// Entity ranges say where surviving tokens sit in the new text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEdit {
    pub key: String,
    #[serde(default)]
    pub speaker: Option<String>,
    pub text: String,
    #[serde(default)]
    pub entity_ranges: Vec<RawEntityRange>,
}

impl BlockEdit {
    pub fn from_segment(segment: &Segment) -> Self {
        BlockEdit {
            key: segment.id.clone(),
            speaker: segment.speaker.clone(),
            text: segment.text(),
            entity_ranges: segment
                .words
                .iter()
                .map(|t| RawEntityRange {
                    key: t.id.clone(),
                    offset: t.offset,
                    length: t.length,
                })
                .collect(),
        }
    }
}

/// Collapsed cursor: block key plus char offset into that block's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub block: String,
    pub offset: usize,
}

/// An edit delta against one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEdit {
    pub chunk: ChunkKey,
    pub blocks: Vec<BlockEdit>,
    pub selection: Selection,
}

impl ChunkEdit {
    /// The chunk's current content with the given cursor; callers mutate the
    /// blocks from here.
    pub fn from_chunk(chunk: &Chunk, selection: Selection) -> Self {
        ChunkEdit {
            chunk: chunk.key,
            blocks: chunk.segments.iter().map(BlockEdit::from_segment).collect(),
            selection,
        }
    }

    /// Cursor at or past the end of the last block.
    pub fn cursor_at_end(&self) -> bool {
        match self.blocks.last() {
            Some(last) => {
                self.selection.block == last.key
                    && self.selection.offset >= last.text.chars().count()
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Only the cursor moved; nothing was written.
    SelectionOnly,
    Replaced { chunk: ChunkKey },
    Merged { into: ChunkKey, absorbed: ChunkKey },
}

impl EditOutcome {
    pub fn changed_content(&self) -> bool {
        !matches!(self, EditOutcome::SelectionOnly)
    }
}

pub struct EditMerger {
    ids: Box<dyn IdGenerator>,
}

impl EditMerger {
    pub fn new(ids: Box<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    /// True when the edit reproduces the chunk's current blocks exactly.
    pub fn is_selection_only(chunk: &Chunk, edit: &ChunkEdit) -> bool {
        chunk.segments.len() == edit.blocks.len()
            && chunk
                .segments
                .iter()
                .zip(&edit.blocks)
                .all(|(segment, block)| BlockEdit::from_segment(segment) == *block)
    }

    /// Apply `edit` to the store. Either the edited chunk is replaced in
    /// place, or, when the cursor ends at the chunk's end and a next chunk
    /// exists, the two are merged under the edited chunk's key. On error the
    /// store is unchanged.
    pub fn apply(&mut self, store: &mut DocumentStore, edit: &ChunkEdit) -> EditorResult<EditOutcome> {
        let chunk = store.get_chunk(edit.chunk)?;
        if Self::is_selection_only(chunk, edit) {
            debug!(chunk = %edit.chunk, "Selection-only edit");
            return Ok(EditOutcome::SelectionOnly);
        }
        if edit.blocks.is_empty() {
            return Err(EditorError::InvariantViolation(format!(
                "edit would leave chunk {} without segments",
                edit.chunk
            )));
        }

        let segments = self.rebuild_segments(store, edit);
        let next = store.next_chunk(edit.chunk)?.map(|c| c.key);

        match next {
            Some(next) if edit.cursor_at_end() => self.merge(store, edit.chunk, next, segments),
            _ => {
                store.replace_chunk(edit.chunk, segments)?;
                debug!(chunk = %edit.chunk, "Edit applied in place");
                Ok(EditOutcome::Replaced { chunk: edit.chunk })
            }
        }
    }

    fn merge(
        &mut self,
        store: &mut DocumentStore,
        key: ChunkKey,
        next: ChunkKey,
        edited: Vec<Segment>,
    ) -> EditorResult<EditOutcome> {
        let prior = store.snapshot();
        store.replace_chunk(key, edited)?;

        let mut merged = store.get_chunk(key)?.segments.clone();
        merged.extend(store.get_chunk(next)?.segments.iter().cloned());
        for segment in &mut merged {
            segment.reflow();
        }

        match store.replace_range(key, next, vec![merged]) {
            Ok(_) => {
                info!(into = %key, absorbed = %next, "Chunks merged at boundary");
                Ok(EditOutcome::Merged {
                    into: key,
                    absorbed: next,
                })
            }
            Err(err) => {
                warn!(into = %key, absorbed = %next, error = %err, "Merge aborted");
                store.restore(prior)?;
                Err(err)
            }
        }
    }

    /// New segment list for the edited chunk: text normalized to
    /// single-space separators, surviving tokens keep id and timing, new
    /// words get fresh ids with zero-length ranges.
    fn rebuild_segments(&mut self, store: &DocumentStore, edit: &ChunkEdit) -> Vec<Segment> {
        let key = edit.chunk;
        let resolve = |id: &str| -> Option<(f64, f64)> {
            if store.token_owner(id) != Some(key) {
                return None;
            }
            store.token(id).map(|t| (t.start, t.end))
        };
        let taken = |id: &str| store.token_owner(id).is_some();

        let mut claimed_tokens = HashSet::new();
        let mut claimed_segments: HashSet<String> = HashSet::new();
        let mut anchor = store
            .get_chunk(key)
            .ok()
            .and_then(|c| c.start())
            .unwrap_or(0.0);

        let mut segments = Vec::with_capacity(edit.blocks.len());
        for block in &edit.blocks {
            let reusable = !block.key.is_empty()
                && !claimed_segments.contains(&block.key)
                && store.segment_owner(&block.key).map_or(true, |owner| owner == key);
            let id = if reusable {
                block.key.clone()
            } else {
                loop {
                    let id = self.ids.next_id();
                    if !claimed_segments.contains(&id) && store.segment_owner(&id).is_none() {
                        break id;
                    }
                }
            };
            claimed_segments.insert(id.clone());

            let words = retokenize::split_words(&block.text, &block.entity_ranges);
            let tokens = retokenize::build_tokens(
                words,
                &resolve,
                &taken,
                &mut claimed_tokens,
                self.ids.as_mut(),
                anchor,
            );
            let segment = Segment::new(id, block.speaker.clone(), tokens);
            if let Some(end) = segment.end() {
                anchor = end;
            }
            segments.push(segment);
        }
        segments
    }
}
