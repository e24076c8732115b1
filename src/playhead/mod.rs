use serde::Serialize;

use crate::document::models::Chunk;

/// Segment and token under a time value. Both `None` means the time is
/// outside every given segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playhead {
    pub segment_id: Option<String>,
    pub entity_id: Option<String>,
}

/// Resolve `time` (ms) against the chunks' segments in order. Intervals are
/// half-open, so a time equal to a segment's end belongs to the next one.
/// A time inside a segment but between its words resolves to the segment
/// alone.
pub fn locate<'a>(time: f64, chunks: impl IntoIterator<Item = &'a Chunk>) -> Playhead {
    if time.is_nan() {
        return Playhead::default();
    }
    for chunk in chunks {
        for segment in &chunk.segments {
            if segment.contains(time) {
                return Playhead {
                    segment_id: Some(segment.id.clone()),
                    entity_id: segment
                        .words
                        .iter()
                        .find(|w| w.contains(time))
                        .map(|w| w.id.clone()),
                };
            }
        }
    }
    Playhead::default()
}

/// Last observed time and what it resolved to. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayheadState {
    pub time: Option<f64>,
    #[serde(flatten)]
    pub position: Playhead,
}

impl PlayheadState {
    /// Recompute for a new time sample; returns whether the resolved
    /// segment or token changed.
    pub fn observe<'a>(&mut self, time: f64, chunks: impl IntoIterator<Item = &'a Chunk>) -> bool {
        let position = locate(time, chunks);
        self.time = Some(time);
        if position == self.position {
            return false;
        }
        self.position = position;
        true
    }
}
