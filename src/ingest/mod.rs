pub mod json;
pub mod words;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::document::models::Transcript;
use crate::ids::IdGenerator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Format {
    /// Preprocessed `{segments: [...]}` record.
    Transcript,
    /// Flat `{words: [...]}` export segmented by paragraph id.
    Words,
}

impl Format {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "transcript" | "segments" => Some(Format::Transcript),
            "words" | "raw" => Some(Format::Words),
            _ => None,
        }
    }

    /// Decide from the top-level keys of a parsed record.
    pub fn detect(value: &Value) -> Option<Self> {
        if value.get("segments").is_some_and(Value::is_array) {
            Some(Format::Transcript)
        } else if value.get("words").is_some_and(Value::is_array) {
            Some(Format::Words)
        } else {
            None
        }
    }
}

/// Read a transcript from `path`, or from stdin when `path` is `-`.
pub fn load_path(
    path: &str,
    format_override: Option<Format>,
    ids: &mut dyn IdGenerator,
) -> Result<Transcript> {
    let (content, origin) = if path == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read from stdin")?;
        (content, "stdin".to_string())
    } else {
        let p = Path::new(path);
        let content = std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read: {}", p.display()))?;
        (content, p.display().to_string())
    };

    let transcript = parse_content(&content, format_override, ids)
        .with_context(|| format!("Failed to ingest {origin}"))?;
    info!(
        "Ingested: {} ({} segments) from {origin}",
        transcript.id,
        transcript.segments.len()
    );
    Ok(transcript)
}

pub fn parse_content(
    content: &str,
    format_override: Option<Format>,
    ids: &mut dyn IdGenerator,
) -> Result<Transcript> {
    if content.trim().is_empty() {
        bail!("Empty input");
    }
    let value: Value = serde_json::from_str(content).context("Input is not valid JSON")?;

    let format = match format_override.or_else(|| Format::detect(&value)) {
        Some(f) => f,
        None => bail!("Cannot determine format: expected a top-level \"segments\" or \"words\" array"),
    };

    match format {
        Format::Transcript => json::parse_transcript(value),
        Format::Words => {
            let raw: words::RawWords =
                serde_json::from_value(value).context("Failed to parse raw words JSON")?;
            Ok(words::segment_words(raw, ids)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIdGen;

    #[test]
    fn detects_format_from_top_level_keys() {
        let mut ids = SequentialIdGen::default();
        let t = parse_content(
            r#"{"id": "t", "segments": [{"id": "s", "words": []}]}"#,
            None,
            &mut ids,
        )
        .unwrap();
        assert_eq!(t.segments[0].id, "s");

        let t = parse_content(
            r#"{"words": [{"time": 0, "duration": 5, "paragraphId": 1, "value": "x"}]}"#,
            None,
            &mut ids,
        )
        .unwrap();
        assert_eq!(t.segments.len(), 1);

        assert!(parse_content(r#"{"id": "t"}"#, None, &mut ids).is_err());
        assert!(parse_content("   ", None, &mut ids).is_err());
    }

    #[test]
    fn override_wins_over_detection() {
        let mut ids = SequentialIdGen::default();
        let content = r#"{"id": "t", "segments": [], "words": []}"#;
        let t = parse_content(content, Some(Format::Words), &mut ids).unwrap();
        assert!(t.segments.is_empty());
        assert_eq!(t.id, "t");
        assert_eq!(Format::from_str("RAW"), Some(Format::Words));
    }

    #[test]
    fn reads_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call.json");
        std::fs::write(&path, r#"{"id": "call", "segments": []}"#).unwrap();

        let mut ids = SequentialIdGen::default();
        let t = load_path(&path.display().to_string(), None, &mut ids).unwrap();
        assert_eq!(t.id, "call");

        let missing = dir.path().join("nope.json");
        let err = load_path(&missing.display().to_string(), None, &mut ids).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
