use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use crate::document::models::{Transcript, TranscriptSegment, TranscriptWord};
use crate::error::{EditorError, EditorResult};
use crate::ids::IdGenerator;

/// Word-level export from the speech recognizer: a flat word list where
/// each word names the paragraph it belongs to.
#[derive(Debug, Deserialize)]
pub struct RawWords {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: String,
    pub words: Vec<RawWord>,
    /// Either an array indexed by the word's `speaker`, or an object keyed
    /// by it. Entries are `{ "name": ... }` or a bare name.
    #[serde(default)]
    pub speakers: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWord {
    pub time: f64,
    #[serde(default)]
    pub duration: f64,
    pub paragraph_id: Value,
    pub value: String,
    #[serde(default)]
    pub speaker: Option<Value>,
}

/// Group consecutive words sharing a `paragraphId` into segments. Every
/// paragraph, including the last, becomes a segment. Ids come from `ids`.
pub fn segment_words(raw: RawWords, ids: &mut dyn IdGenerator) -> EditorResult<Transcript> {
    let mut segments: Vec<TranscriptSegment> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut current: Option<String> = None;

    for (i, word) in raw.words.iter().enumerate() {
        let paragraph = value_key(&word.paragraph_id);
        if current.as_deref() != Some(paragraph.as_str()) {
            if !seen.insert(paragraph.clone()) {
                return Err(EditorError::Ingestion(format!(
                    "paragraph {paragraph} reappears at word {i} after other paragraphs"
                )));
            }
            segments.push(TranscriptSegment {
                id: ids.next_id(),
                speaker: word
                    .speaker
                    .as_ref()
                    .and_then(|s| speaker_name(&raw.speakers, s)),
                words: Vec::new(),
            });
            current = Some(paragraph);
        }

        let text = word.value.trim();
        if text.is_empty() {
            debug!(word = i, "Skipping blank word");
            continue;
        }
        if let Some(segment) = segments.last_mut() {
            segment.words.push(TranscriptWord {
                id: ids.next_id(),
                text: text.to_string(),
                start: word.time,
                end: word.time + word.duration,
            });
        }
    }

    if segments.len() != seen.len() {
        return Err(EditorError::Ingestion(format!(
            "{} paragraphs produced {} segments",
            seen.len(),
            segments.len()
        )));
    }

    let id = match raw.id {
        Some(v) if !v.is_null() => value_key(&v),
        _ => ids.next_id(),
    };
    debug!(transcript = %id, segments = segments.len(), "Segmented raw words");

    Ok(Transcript {
        id,
        title: raw.title,
        language: raw.language,
        segments,
    })
}

fn value_key(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn speaker_name(speakers: &Value, speaker: &Value) -> Option<String> {
    let entry = match (speakers, speaker) {
        (Value::Array(list), Value::Number(n)) => list.get(usize::try_from(n.as_u64()?).ok()?),
        (Value::Array(list), Value::String(s)) => list.get(s.parse::<usize>().ok()?),
        (Value::Object(map), key) => map.get(&value_key(key)),
        _ => None,
    }?;
    match entry {
        Value::String(name) => Some(name.clone()),
        Value::Object(fields) => fields.get("name")?.as_str().map(str::to_string),
        _ => None,
    }
}
