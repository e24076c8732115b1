use anyhow::{Context, Result};
use serde_json::Value;

use crate::document::models::Transcript;

/// Parse the preprocessed transcript record
/// (`{id, title, language, segments: [{id, speaker, words}]}`).
pub fn parse_transcript(value: Value) -> Result<Transcript> {
    let transcript: Transcript =
        serde_json::from_value(value).context("Failed to parse transcript JSON")?;
    Ok(transcript)
}
