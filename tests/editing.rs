use tsedit::config::EditorConfig;
use tsedit::document::models::{Chunk, TranscriptSegment, TranscriptWord};
use tsedit::document::wire::RawChunk;
use tsedit::edit::{ChunkEdit, Selection};
use tsedit::ids::SequentialIdGen;
use tsedit::playhead::locate;
use tsedit::preview::project;
use tsedit::{ChunkKey, Editor, Event, Outcome, Transcript};

/// Segment `P{i+1}` holds `sizes[i]` words of 100ms, segments 1s apart.
fn transcript(sizes: &[usize]) -> Transcript {
    Transcript {
        id: "call-42".into(),
        title: "Weekly sync".into(),
        language: "en".into(),
        segments: sizes
            .iter()
            .enumerate()
            .map(|(si, n)| TranscriptSegment {
                id: format!("P{}", si + 1),
                speaker: Some(format!("S{}", si % 2)),
                words: (0..*n)
                    .map(|wi| {
                        let start = (si * 1000 + wi * 100) as f64;
                        TranscriptWord {
                            id: format!("t{}_{}", si + 1, wi),
                            text: format!("w{wi}"),
                            start,
                            end: start + 100.0,
                        }
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn editor(sizes: &[usize], chunk_size: usize) -> Editor {
    let config = EditorConfig {
        chunk_size,
        ..EditorConfig::default()
    };
    let mut editor =
        Editor::new(&transcript(sizes), &config, Box::new(SequentialIdGen::new("new"))).unwrap();
    for key in editor.store().chunk_keys() {
        editor
            .dispatch(Event::Visibility {
                chunk: key,
                visible: true,
            })
            .unwrap();
    }
    editor
}

/// Append `suffix` to the chunk's last block, cursor at the very end.
fn type_at_end(editor: &Editor, key: ChunkKey, suffix: &str) -> Event {
    let chunk = editor.store().get_chunk(key).unwrap();
    let last = chunk.segments.last().unwrap();
    let mut edit = ChunkEdit::from_chunk(
        chunk,
        Selection {
            block: last.id.clone(),
            offset: 0,
        },
    );
    let block = edit.blocks.last_mut().unwrap();
    block.text.push_str(suffix);
    edit.selection.offset = block.text.chars().count();
    Event::Edit(edit)
}

/// Replace the first block's text, keeping every token range that still fits.
fn retype_first_block(editor: &Editor, key: ChunkKey, text: &str) -> Event {
    let chunk = editor.store().get_chunk(key).unwrap();
    let mut edit = ChunkEdit::from_chunk(
        chunk,
        Selection {
            block: chunk.segments[0].id.clone(),
            offset: 0,
        },
    );
    let len = text.chars().count();
    let block = &mut edit.blocks[0];
    block.text = text.to_string();
    block.entity_ranges.retain(|r| r.offset + r.length <= len);
    Event::Edit(edit)
}

#[test]
fn boundary_typing_merges_and_preserves_the_absorbed_chunk() {
    let mut editor = editor(&[3, 2, 4], 2);
    let p3_before = editor.store().get_chunk(ChunkKey(1)).unwrap().segments[0].clone();

    let event = type_at_end(&editor, ChunkKey(0), "!");
    let outcome = editor.dispatch(event).unwrap();
    assert_eq!(
        outcome,
        Outcome::Merged {
            into: ChunkKey(0),
            absorbed: ChunkKey(1)
        }
    );

    let merged = editor.store().get_chunk(ChunkKey(0)).unwrap();
    assert_eq!(merged.segment_ids().collect::<Vec<_>>(), vec!["P1", "P2", "P3"]);
    assert_eq!(merged.segments[0].words.len(), 3);
    assert_eq!(merged.segments[1].words.len(), 3);
    assert_eq!(merged.segments[1].words[2].id, "new0");
    assert_eq!(merged.segments[2], p3_before);
    assert_eq!(editor.store().chunk_keys(), vec![ChunkKey(0)]);
}

#[test]
fn undo_and_redo_are_inverse_over_several_edits() {
    let mut editor = editor(&[4, 3, 2, 2], 2);
    let mut states = vec![editor.store().snapshot()];

    let edits = ["w0 w1 w2", "w0 w1", "w0"];
    for text in edits {
        let event = retype_first_block(&editor, ChunkKey(0), text);
        assert!(editor.dispatch(event).unwrap().changed_content());
        states.push(editor.store().snapshot());
    }
    let event = type_at_end(&editor, ChunkKey(1), " tail");
    editor.dispatch(event).unwrap();
    states.push(editor.store().snapshot());
    let n = states.len() - 1;

    for _ in 0..n {
        assert!(matches!(editor.dispatch(Event::Undo).unwrap(), Outcome::Undone { .. }));
    }
    assert_eq!(editor.store().snapshot(), states[0]);
    assert_eq!(editor.dispatch(Event::Undo).unwrap(), Outcome::Unchanged);

    for _ in 0..n {
        assert!(matches!(editor.dispatch(Event::Redo).unwrap(), Outcome::Redone { .. }));
    }
    assert_eq!(editor.store().snapshot(), states[n]);
    assert_eq!(editor.dispatch(Event::Redo).unwrap(), Outcome::Unchanged);
}

#[test]
fn new_edit_after_undo_discards_redo() {
    let mut editor = editor(&[3, 3], 1);
    let event = retype_first_block(&editor, ChunkKey(0), "w0");
    editor.dispatch(event).unwrap();
    editor.dispatch(Event::Undo).unwrap();
    assert!(editor.history().can_redo());

    let event = retype_first_block(&editor, ChunkKey(0), "w0 w1");
    editor.dispatch(event).unwrap();
    assert_eq!(editor.dispatch(Event::Redo).unwrap(), Outcome::Unchanged);
}

#[test]
fn segment_order_survives_merges_and_splits() {
    let source = transcript(&[2, 1, 3, 2, 2, 1, 1]);
    let expected: Vec<String> = source.segments.iter().map(|s| s.id.clone()).collect();
    let mut editor = editor(&[2, 1, 3, 2, 2, 1, 1], 2);

    for _ in 0..3 {
        let event = type_at_end(&editor, ChunkKey(0), " more");
        editor.dispatch(event).unwrap();
        assert_eq!(editor.store().segment_ids(), expected);
    }
    let outcome = editor.dispatch(Event::Rebalance { chunk: ChunkKey(0) }).unwrap();
    assert!(matches!(outcome, Outcome::Split { ref chunks } if chunks.len() == 4));
    assert_eq!(editor.store().segment_ids(), expected);

    editor.dispatch(Event::Undo).unwrap();
    assert_eq!(editor.store().segment_ids(), expected);
}

#[test]
fn playhead_follows_half_open_intervals() {
    let mut editor = editor(&[2, 2, 2], 2);
    // P1 spans [0, 200); P2 starts at 1000.
    let chunks: Vec<&Chunk> = editor.store().chunks().collect();
    assert_eq!(locate(199.9, chunks.clone()).segment_id.as_deref(), Some("P1"));
    assert_eq!(locate(200.0, chunks.clone()).segment_id, None);
    let at_end = locate(1200.0, chunks.clone());
    assert_eq!(at_end.segment_id, None);
    assert_eq!(locate(2000.0, chunks).segment_id.as_deref(), Some("P3"));

    let mut last_index = 0;
    for ms in (0..3000).step_by(50) {
        editor.dispatch(Event::Time { ms: ms as f64 }).unwrap();
        if let Some(id) = &editor.playhead().position.segment_id {
            let index: usize = id[1..].parse().unwrap();
            assert!(index >= last_index);
            last_index = index;
        }
    }
    assert_eq!(last_index, 3);
}

#[test]
fn hidden_chunks_render_as_stripped_previews() {
    let mut editor = editor(&[3, 2, 4], 2);
    editor
        .dispatch(Event::Visibility {
            chunk: ChunkKey(1),
            visible: false,
        })
        .unwrap();

    let rendered = editor.render(ChunkKey(1)).unwrap();
    assert!(!rendered.is_live());
    let raw = rendered.to_raw();
    assert!(raw.entity_map.is_empty());
    assert!(raw.blocks.iter().all(|b| b.entity_ranges.is_empty()));

    let chunk = editor.store().get_chunk(ChunkKey(1)).unwrap();
    let preview = project(chunk);
    assert_eq!(preview.blocks[0].text, chunk.segments[0].text());
    assert_eq!(raw.blocks[0].text, "w0 w1 w2 w3");
}

#[test]
fn wire_format_round_trips_through_json() {
    let editor = editor(&[3, 2, 4], 2);
    for chunk in editor.store().chunks() {
        let json = serde_json::to_string(&RawChunk::from_chunk(chunk)).unwrap();
        assert!(json.contains("\"entityMap\""));
        let raw: RawChunk = serde_json::from_str(&json).unwrap();
        let decoded = raw.into_chunk(chunk.key, chunk.version).unwrap();
        assert_eq!(&decoded, chunk);
    }
}
