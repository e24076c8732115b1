//! Chunked, time-coded transcript editing.
//!
//! A transcript is split into fixed-size chunks of paragraph segments, each
//! segment holding time-coded word tokens. Edits go through
//! [`session::Editor`], which merges chunks across boundaries, keeps
//! snapshot-based undo/redo, tracks the playback position and serves
//! read-only previews for chunks that are off screen.

pub mod config;
pub mod document;
pub mod edit;
pub mod error;
pub mod history;
pub mod ids;
pub mod ingest;
pub mod output;
pub mod playhead;
pub mod preview;
pub mod session;

pub use document::models::{ChunkKey, Transcript};
pub use document::{DocumentState, DocumentStore};
pub use error::{EditorError, EditorResult};
pub use session::{Editor, Event, Outcome, RenderedChunk};
