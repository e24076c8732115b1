//! Chunk wire format: paragraph blocks with entity ranges plus an entity map
//! holding each token's timing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::models::{Chunk, ChunkKey, Segment, Token};
use crate::error::{EditorError, EditorResult};

pub const BLOCK_TYPE: &str = "paragraph";
pub const ENTITY_TYPE: &str = "TOKEN";
pub const ENTITY_MUTABILITY: &str = "MUTABLE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChunk {
    pub blocks: Vec<RawBlock>,
    #[serde(default)]
    pub entity_map: BTreeMap<String, RawEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub key: String,
    #[serde(rename = "type", default = "default_block_type")]
    pub kind: String,
    pub text: String,
    pub data: RawBlockData,
    #[serde(default)]
    pub entity_ranges: Vec<RawEntityRange>,
    #[serde(default)]
    pub inline_style_ranges: Vec<RawStyleRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlockData {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub speaker: Option<String>,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntityRange {
    pub key: String,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStyleRange {
    pub offset: usize,
    pub length: usize,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub mutability: String,
    pub data: RawTokenData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTokenData {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub offset: usize,
    pub length: usize,
    pub key: String,
}

fn default_block_type() -> String {
    BLOCK_TYPE.to_string()
}

impl RawBlock {
    pub fn from_segment(segment: &Segment) -> Self {
        RawBlock {
            key: segment.id.clone(),
            kind: BLOCK_TYPE.to_string(),
            text: segment.text(),
            data: RawBlockData {
                start: segment.start(),
                end: segment.end(),
                speaker: segment.speaker.clone(),
                id: segment.id.clone(),
            },
            entity_ranges: segment
                .words
                .iter()
                .map(|t| RawEntityRange {
                    key: t.id.clone(),
                    offset: t.offset,
                    length: t.length,
                })
                .collect(),
            inline_style_ranges: Vec::new(),
        }
    }
}

impl RawChunk {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        let mut entity_map = BTreeMap::new();
        for token in chunk.segments.iter().flat_map(|s| &s.words) {
            entity_map.insert(
                token.id.clone(),
                RawEntity {
                    kind: ENTITY_TYPE.to_string(),
                    mutability: ENTITY_MUTABILITY.to_string(),
                    data: RawTokenData {
                        start: token.start,
                        end: token.end,
                        text: token.text.clone(),
                        offset: token.offset,
                        length: token.length,
                        key: token.id.clone(),
                    },
                },
            );
        }
        RawChunk {
            blocks: chunk.segments.iter().map(RawBlock::from_segment).collect(),
            entity_map,
        }
    }

    /// Decode into segments. Block text must be exactly the single-space join
    /// of its tokens, and every entity range must resolve in the entity map.
    /// Tokens must be in time order across all blocks, and no token or block
    /// id may appear twice.
    pub fn to_segments(&self) -> EditorResult<Vec<Segment>> {
        let segments = self
            .blocks
            .iter()
            .map(|b| self.decode_block(b))
            .collect::<EditorResult<Vec<_>>>()?;

        let mut segment_ids = HashSet::new();
        let mut token_ids = HashSet::new();
        let mut floor = f64::NEG_INFINITY;
        for segment in &segments {
            if !segment_ids.insert(segment.id.as_str()) {
                return Err(EditorError::Ingestion(format!(
                    "block id {} appears more than once",
                    segment.id
                )));
            }
            if let Some(dup) = segment.words.iter().find(|w| !token_ids.insert(w.id.as_str())) {
                return Err(EditorError::Ingestion(format!(
                    "token {} appears more than once",
                    dup.id
                )));
            }
            floor = segment
                .check_timing(floor)
                .map_err(|e| EditorError::Ingestion(format!("block {}: {e}", segment.id)))?;
        }
        Ok(segments)
    }

    pub fn into_chunk(self, key: ChunkKey, version: u64) -> EditorResult<Chunk> {
        Ok(Chunk {
            key,
            version,
            segments: self.to_segments()?,
        })
    }

    fn decode_block(&self, block: &RawBlock) -> EditorResult<Segment> {
        if block.kind != BLOCK_TYPE {
            return Err(EditorError::Ingestion(format!(
                "block {} has unsupported type {}",
                block.key, block.kind
            )));
        }

        let chars: Vec<char> = block.text.chars().collect();
        let mut words = Vec::with_capacity(block.entity_ranges.len());

        for range in &block.entity_ranges {
            let entity = self.entity_map.get(&range.key).ok_or_else(|| {
                EditorError::Ingestion(format!(
                    "block {} references unknown entity {}",
                    block.key, range.key
                ))
            })?;
            if entity.kind != ENTITY_TYPE {
                return Err(EditorError::Ingestion(format!(
                    "entity {} has unsupported type {}",
                    range.key, entity.kind
                )));
            }
            let end = range.offset.checked_add(range.length).ok_or_else(|| {
                EditorError::Ingestion(format!(
                    "entity range {} in block {} overflows",
                    range.key, block.key
                ))
            })?;
            if end > chars.len() {
                return Err(EditorError::Ingestion(format!(
                    "entity range {} exceeds block {} text",
                    range.key, block.key
                )));
            }
            let covered: String = chars[range.offset..end].iter().collect();
            words.push(Token {
                id: range.key.clone(),
                text: covered,
                start: entity.data.start,
                end: entity.data.end,
                offset: range.offset,
                length: range.length,
            });
        }

        let id = if block.data.id.is_empty() {
            block.key.clone()
        } else {
            block.data.id.clone()
        };
        let segment = Segment::new(id, block.data.speaker.clone(), words.clone());
        if segment.text() != block.text || segment.words != words {
            return Err(EditorError::Ingestion(format!(
                "block {} text is not a single-space join of its tokens",
                block.key
            )));
        }
        Ok(segment)
    }
}
