use unicode_width::UnicodeWidthStr;

use crate::document::models::{Chunk, ChunkKey, Segment};
use crate::document::DocumentStore;
use crate::error::EditorResult;
use crate::output::style::{playhead_styles, StyleMap};
use crate::playhead::PlayheadState;
use crate::preview::PreviewChunk;
use crate::session::Outcome;

/// Truncate a string to fit within max_width (respecting unicode width).
pub fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + cw + 3 > max_width {
            result.push_str("...");
            break;
        }
        result.push(ch);
        width += cw;
    }
    result
}

/// Milliseconds as `mm:ss`.
pub fn format_timestamp(ms: f64) -> String {
    let total = (ms.max(0.0) / 1000.0) as u64;
    let m = total / 60;
    let s = total % 60;
    format!("{m:02}:{s:02}")
}

fn format_range(chunk: &Chunk) -> String {
    match (chunk.start(), chunk.end()) {
        (Some(start), Some(end)) => {
            format!("{}-{}", format_timestamp(start), format_timestamp(end))
        }
        _ => "--".to_string(),
    }
}

/// Chunk overview for `tsedit load`.
pub fn print_chunk_summary(store: &DocumentStore) {
    let meta = store.meta();
    let title = if meta.title.is_empty() { "Untitled" } else { &meta.title };
    println!("Transcript: {} ({})", title, meta.id);
    if !meta.language.is_empty() {
        println!("  Language: {}", meta.language);
    }

    let chunk_count = store.state().len();
    println!(
        "  {} chunk{} of up to {} segments\n",
        chunk_count,
        if chunk_count == 1 { "" } else { "s" },
        store.chunk_size()
    );

    println!("  {:<6} {:<9} {:<7} {:<12} FIRST SEGMENT", "KEY", "SEGMENTS", "TOKENS", "RANGE");
    println!("  {}", "-".repeat(76));
    for chunk in store.chunks() {
        let first = chunk.segments.first().map(Segment::text).unwrap_or_default();
        println!(
            "  {:<6} {:<9} {:<7} {:<12} {}",
            chunk.key.to_string(),
            chunk.segments.len(),
            chunk.token_count(),
            format_range(chunk),
            truncate(&first, 36),
        );
    }
}

/// Print the whole document, one paragraph per segment, with tokens styled
/// by the play-head.
pub fn print_document(store: &DocumentStore, playhead: &PlayheadState, styles: &StyleMap) {
    let segments: Vec<&Segment> = store.chunks().flat_map(|c| &c.segments).collect();
    if segments.is_empty() {
        println!("No segments found.");
        return;
    }

    let style_of = playhead_styles(playhead, segments.iter().copied());

    for chunk in store.chunks() {
        println!("── {} ──", chunk.key);
        for seg in &chunk.segments {
            let time = seg.start().map(format_timestamp).unwrap_or_else(|| "--:--".into());
            let speaker = seg.speaker.as_deref().unwrap_or("");
            let words: Vec<String> = seg
                .words
                .iter()
                .map(|w| match style_of(&w.id) {
                    Some(style) => styles.effect(style).paint(&w.text),
                    None => w.text.clone(),
                })
                .collect();
            println!("  {speaker} [{time}]:");
            println!("    {}", words.join(" "));
        }
        println!();
    }
}

pub fn print_playhead(playhead: &PlayheadState) {
    let time = playhead.time.map(format_timestamp).unwrap_or_else(|| "--:--".into());
    match &playhead.position.segment_id {
        Some(segment) => {
            let entity = playhead.position.entity_id.as_deref().unwrap_or("(between words)");
            println!("[{time}] segment {segment}, token {entity}");
        }
        None => println!("[{time}] no segment at this time"),
    }
}

pub fn print_preview(preview: &PreviewChunk) {
    println!("Preview {} (version {}):\n", preview.key, preview.version);
    for block in &preview.blocks {
        let speaker = block.speaker.as_deref().unwrap_or("");
        println!("  {speaker}: {}", truncate(&block.text, 76));
    }
}

/// One-line summary of a dispatched event.
pub fn describe_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::SelectionOnly => "cursor moved".to_string(),
        Outcome::Replaced { chunk } => format!("edited {chunk}"),
        Outcome::Merged { into, absorbed } => format!("merged {absorbed} into {into}"),
        Outcome::Split { chunks } => {
            let keys: Vec<String> = chunks.iter().map(ChunkKey::to_string).collect();
            format!("split into {}", keys.join(", "))
        }
        Outcome::Undone { label } => format!("undid {label}"),
        Outcome::Redone { label } => format!("redid {label}"),
        Outcome::Playhead { changed, state } => {
            let time = state.time.map(format_timestamp).unwrap_or_else(|| "--:--".into());
            let at = match (&state.position.segment_id, &state.position.entity_id) {
                (Some(s), Some(e)) => format!("{s}/{e}"),
                (Some(s), None) => s.clone(),
                _ => "nothing".to_string(),
            };
            let verb = if *changed { "moved to" } else { "still on" };
            format!("[{time}] play-head {verb} {at}")
        }
        Outcome::Visibility {
            chunk,
            visible,
            changed,
        } => {
            let state = if *visible { "visible" } else { "hidden" };
            if *changed {
                format!("{chunk} now {state}")
            } else {
                format!("{chunk} already {state}")
            }
        }
        Outcome::Unchanged => "no change".to_string(),
    }
}

pub fn print_outcome(line: usize, result: &EditorResult<Outcome>) {
    match result {
        Ok(outcome) => println!("  {line:>4}  {}", describe_outcome(outcome)),
        Err(err) => println!("  {line:>4}  error: {err}"),
    }
}
