//! The single dispatch point. Every signal from the editing surface (edit
//! deltas, playback time, viewport visibility, undo/redo) goes through
//! [`Editor::dispatch`], one event at a time.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::document::models::{ChunkKey, Transcript};
use crate::document::wire::RawChunk;
use crate::document::DocumentStore;
use crate::edit::{ChunkEdit, EditMerger, EditOutcome, Selection};
use crate::error::{EditorError, EditorResult};
use crate::history::HistoryManager;
use crate::ids::IdGenerator;
use crate::playhead::PlayheadState;
use crate::preview::{PreviewCache, PreviewChunk, VisibilityTracker};

/// An external signal, as read from an event stream.
///
/// ```json
/// {"type": "visibility", "chunk": "ed0", "visible": true}
/// {"type": "time", "ms": 1250}
/// {"type": "undo"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Edit(ChunkEdit),
    Time { ms: f64 },
    Visibility { chunk: ChunkKey, visible: bool },
    Undo,
    Redo,
    /// Re-split an oversized chunk back to the configured chunk size.
    Rebalance { chunk: ChunkKey },
}

/// What a dispatched event did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    SelectionOnly,
    Replaced { chunk: ChunkKey },
    Merged { into: ChunkKey, absorbed: ChunkKey },
    Split { chunks: Vec<ChunkKey> },
    Undone { label: String },
    Redone { label: String },
    Playhead { changed: bool, state: PlayheadState },
    Visibility { chunk: ChunkKey, visible: bool, changed: bool },
    /// Nothing to do: empty undo/redo stack, or a chunk already within size.
    Unchanged,
}

impl Outcome {
    pub fn changed_content(&self) -> bool {
        matches!(
            self,
            Outcome::Replaced { .. }
                | Outcome::Merged { .. }
                | Outcome::Split { .. }
                | Outcome::Undone { .. }
                | Outcome::Redone { .. }
        )
    }
}

/// Per-chunk content handed to the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedChunk {
    /// Full annotated content; editable.
    Live(RawChunk),
    /// Text-only projection; read-only.
    Preview(Arc<PreviewChunk>),
}

impl RenderedChunk {
    pub fn is_live(&self) -> bool {
        matches!(self, RenderedChunk::Live(_))
    }

    pub fn to_raw(&self) -> RawChunk {
        match self {
            RenderedChunk::Live(raw) => raw.clone(),
            RenderedChunk::Preview(preview) => preview.to_raw(),
        }
    }
}

pub struct Editor {
    store: DocumentStore,
    history: HistoryManager,
    merger: EditMerger,
    playhead: PlayheadState,
    visibility: VisibilityTracker,
    previews: PreviewCache,
    selection: Option<(ChunkKey, Selection)>,
}

impl Editor {
    pub fn new(
        transcript: &Transcript,
        config: &EditorConfig,
        ids: Box<dyn IdGenerator>,
    ) -> EditorResult<Self> {
        let store = DocumentStore::load(transcript, config.chunk_size)?;
        Ok(Editor {
            store,
            history: HistoryManager::new(config.history_depth),
            merger: EditMerger::new(ids),
            playhead: PlayheadState::default(),
            visibility: VisibilityTracker::new(),
            previews: PreviewCache::new(),
            selection: None,
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn playhead(&self) -> &PlayheadState {
        &self.playhead
    }

    pub fn visibility(&self) -> &VisibilityTracker {
        &self.visibility
    }

    /// Cursor from the last accepted edit event.
    pub fn selection(&self) -> Option<&(ChunkKey, Selection)> {
        self.selection.as_ref()
    }

    pub fn dispatch(&mut self, event: Event) -> EditorResult<Outcome> {
        match event {
            Event::Edit(edit) => self.edit(edit),
            Event::Time { ms } => Ok(self.observe_time(ms)),
            Event::Visibility { chunk, visible } => self.set_visibility(chunk, visible),
            Event::Undo => self.undo(),
            Event::Redo => self.redo(),
            Event::Rebalance { chunk } => self.rebalance(chunk),
        }
    }

    /// Live content for visible chunks, the cached preview otherwise.
    pub fn render(&mut self, key: ChunkKey) -> EditorResult<RenderedChunk> {
        let chunk = self.store.get_chunk(key)?;
        if self.visibility.is_visible(key) {
            Ok(RenderedChunk::Live(RawChunk::from_chunk(chunk)))
        } else {
            Ok(RenderedChunk::Preview(self.previews.get_or_project(chunk)))
        }
    }

    fn edit(&mut self, edit: ChunkEdit) -> EditorResult<Outcome> {
        self.store.get_chunk(edit.chunk)?;
        if !self.visibility.is_visible(edit.chunk) {
            return Err(EditorError::ReadOnly(edit.chunk));
        }

        let prior = self.store.snapshot();
        let outcome = self.merger.apply(&mut self.store, &edit)?;
        self.selection = Some((edit.chunk, edit.selection));

        let outcome = match outcome {
            EditOutcome::SelectionOnly => return Ok(Outcome::SelectionOnly),
            EditOutcome::Replaced { chunk } => {
                self.history.record(&format!("edit {chunk}"), prior);
                Outcome::Replaced { chunk }
            }
            EditOutcome::Merged { into, absorbed } => {
                self.history.record(&format!("merge {into}+{absorbed}"), prior);
                self.visibility.forget(absorbed);
                Outcome::Merged { into, absorbed }
            }
        };
        self.content_changed();
        Ok(outcome)
    }

    fn observe_time(&mut self, ms: f64) -> Outcome {
        let visibility = &self.visibility;
        let visible = self.store.chunks().filter(|c| visibility.is_visible(c.key));
        let changed = self.playhead.observe(ms, visible);
        if changed {
            debug!(
                time = ms,
                segment = ?self.playhead.position.segment_id,
                entity = ?self.playhead.position.entity_id,
                "Play-head moved"
            );
        }
        Outcome::Playhead {
            changed,
            state: self.playhead.clone(),
        }
    }

    fn set_visibility(&mut self, chunk: ChunkKey, visible: bool) -> EditorResult<Outcome> {
        self.store.get_chunk(chunk)?;
        let changed = self.visibility.set(chunk, visible);
        if changed {
            self.refresh_playhead();
        }
        Ok(Outcome::Visibility {
            chunk,
            visible,
            changed,
        })
    }

    fn undo(&mut self) -> EditorResult<Outcome> {
        let label = self.history.undo_label().unwrap_or_default().to_string();
        match self.history.undo(self.store.snapshot()) {
            Some(state) => {
                if let Err(err) = self.store.restore(state.clone()) {
                    // Put the entry back so history still matches the store.
                    self.history.redo(state);
                    warn!(%label, error = %err, "Undo failed, history left as it was");
                    return Err(err);
                }
                info!(%label, "Undid change");
                self.content_changed();
                Ok(Outcome::Undone { label })
            }
            None => Ok(Outcome::Unchanged),
        }
    }

    fn redo(&mut self) -> EditorResult<Outcome> {
        let label = self.history.redo_label().unwrap_or_default().to_string();
        match self.history.redo(self.store.snapshot()) {
            Some(state) => {
                if let Err(err) = self.store.restore(state.clone()) {
                    // Put the entry back so history still matches the store.
                    self.history.undo(state);
                    warn!(%label, error = %err, "Redo failed, history left as it was");
                    return Err(err);
                }
                info!(%label, "Redid change");
                self.content_changed();
                Ok(Outcome::Redone { label })
            }
            None => Ok(Outcome::Unchanged),
        }
    }

    fn rebalance(&mut self, chunk: ChunkKey) -> EditorResult<Outcome> {
        let prior = self.store.snapshot();
        let keys = self.store.split_oversized(chunk)?;
        if keys.len() == 1 {
            return Ok(Outcome::Unchanged);
        }
        self.history.record(&format!("split {chunk}"), prior);
        // New chunks inherit the split chunk's visibility.
        if self.visibility.is_visible(chunk) {
            for key in &keys[1..] {
                self.visibility.set(*key, true);
            }
        }
        self.content_changed();
        Ok(Outcome::Split { chunks: keys })
    }

    fn content_changed(&mut self) {
        let live: Vec<(ChunkKey, u64)> = self.store.chunks().map(|c| (c.key, c.version)).collect();
        self.previews.retain_live(&live);
        if let Some((key, _)) = &self.selection {
            if self.store.get_chunk(*key).is_err() {
                self.selection = None;
            }
        }
        self.refresh_playhead();
    }

    fn refresh_playhead(&mut self) {
        if let Some(time) = self.playhead.time {
            self.observe_time(time);
        }
    }
}
