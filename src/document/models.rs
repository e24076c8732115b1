use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable chunk identifier. Independent of the chunk's position, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChunkKey(pub u64);

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ed{}", self.0)
    }
}

impl FromStr for ChunkKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("ed").unwrap_or(s);
        digits
            .parse::<u64>()
            .map(ChunkKey)
            .map_err(|_| format!("invalid chunk key: {s}"))
    }
}

impl TryFrom<String> for ChunkKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChunkKey> for String {
    fn from(key: ChunkKey) -> Self {
        key.to_string()
    }
}

/// Ingestion record produced by the transcript preprocessing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: String,
    pub segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: String,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub id: String,
    pub text: String,
    /// Milliseconds.
    pub start: f64,
    pub end: f64,
}

/// Transcript-level fields kept alongside the chunked content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMeta {
    pub id: String,
    pub title: String,
    pub language: String,
}

/// One time-coded word. `offset`/`length` are char positions within the
/// owning segment's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub offset: usize,
    pub length: usize,
}

impl Token {
    pub fn new(id: impl Into<String>, text: impl Into<String>, start: f64, end: f64) -> Self {
        let text = text.into();
        let length = text.chars().count();
        Self {
            id: id.into(),
            text,
            start,
            end,
            offset: 0,
            length,
        }
    }

    /// Half-open `[start, end)` containment.
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }
}

/// A paragraph: speaker label plus its ordered tokens. The text is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub speaker: Option<String>,
    pub words: Vec<Token>,
}

impl Segment {
    pub fn new(id: impl Into<String>, speaker: Option<String>, words: Vec<Token>) -> Self {
        let mut segment = Self {
            id: id.into(),
            speaker,
            words,
        };
        segment.reflow();
        segment
    }

    /// Token texts joined by single spaces.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for (i, word) in self.words.iter().enumerate() {
            if i > 0 {
                text.push(' ');
            }
            text.push_str(&word.text);
        }
        text
    }

    /// Char length of `text()` without building it.
    pub fn text_len(&self) -> usize {
        match self.words.last() {
            Some(last) => last.offset + last.length,
            None => 0,
        }
    }

    pub fn start(&self) -> Option<f64> {
        self.words.first().map(|w| w.start)
    }

    pub fn end(&self) -> Option<f64> {
        self.words.last().map(|w| w.end)
    }

    /// Half-open `[start, end)` containment; an empty segment contains nothing.
    pub fn contains(&self, time: f64) -> bool {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => start <= time && time < end,
            _ => false,
        }
    }

    /// Recompute offsets and lengths so tokens partition the text with
    /// single-space separators.
    pub fn reflow(&mut self) {
        let mut offset = 0;
        for word in &mut self.words {
            word.length = word.text.chars().count();
            word.offset = offset;
            offset += word.length + 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Tokens must have finite `start <= end` ranges, in time order without
    /// overlap, the first starting no earlier than `floor`. Returns the floor
    /// for whatever follows: the last token's end, or `floor` if empty.
    pub fn check_timing(&self, floor: f64) -> Result<f64, String> {
        let mut prev_end = floor;
        for w in &self.words {
            if !w.start.is_finite() || !w.end.is_finite() || w.end < w.start {
                return Err(format!(
                    "token {} has invalid time range {}..{}",
                    w.id, w.start, w.end
                ));
            }
            if w.start < prev_end {
                return Err(format!(
                    "token {} starts at {} before the preceding token ends at {}",
                    w.id, w.start, prev_end
                ));
            }
            prev_end = w.end;
        }
        Ok(prev_end)
    }
}

/// A run of consecutive segments edited and virtualized as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub key: ChunkKey,
    /// Store-wide content version; a given `(key, version)` pair always
    /// names the same content.
    pub version: u64,
    pub segments: Vec<Segment>,
}

impl Chunk {
    pub fn segment_ids(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.id.as_str())
    }

    pub fn token_count(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }

    pub fn start(&self) -> Option<f64> {
        self.segments.iter().find_map(|s| s.start())
    }

    pub fn end(&self) -> Option<f64> {
        self.segments.iter().rev().find_map(|s| s.end())
    }

    /// Time order holds across segment boundaries too.
    pub fn check_timing(&self) -> Result<(), String> {
        let mut floor = f64::NEG_INFINITY;
        for segment in &self.segments {
            floor = segment.check_timing(floor)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_key_parses_with_or_without_prefix() {
        assert_eq!("ed4".parse::<ChunkKey>().unwrap(), ChunkKey(4));
        assert_eq!("4".parse::<ChunkKey>().unwrap(), ChunkKey(4));
        assert!("edx".parse::<ChunkKey>().is_err());
        assert_eq!(serde_json::to_string(&ChunkKey(2)).unwrap(), "\"ed2\"");
    }

    #[test]
    fn reflow_partitions_text() {
        let seg = Segment::new(
            "p1",
            None,
            vec![
                Token::new("a", "héllo", 0.0, 100.0),
                Token::new("b", "world", 100.0, 200.0),
            ],
        );
        assert_eq!(seg.text(), "héllo world");
        assert_eq!((seg.words[0].offset, seg.words[0].length), (0, 5));
        assert_eq!((seg.words[1].offset, seg.words[1].length), (6, 5));
        assert_eq!(seg.text_len(), seg.text().chars().count());
    }

    #[test]
    fn empty_segment_has_no_time_range() {
        let seg = Segment::new("p1", Some("Ann".into()), Vec::new());
        assert_eq!(seg.text(), "");
        assert_eq!(seg.start(), None);
        assert!(!seg.contains(0.0));
    }

    #[test]
    fn segment_range_is_half_open() {
        let seg = Segment::new("p1", None, vec![Token::new("a", "hi", 10.0, 20.0)]);
        assert!(seg.contains(10.0));
        assert!(seg.contains(19.9));
        assert!(!seg.contains(20.0));
    }

    #[test]
    fn timing_check_rejects_swapped_and_overlapping_tokens() {
        let swapped = Segment::new(
            "p1",
            None,
            vec![Token::new("b", "two", 100.0, 200.0), Token::new("a", "one", 0.0, 100.0)],
        );
        assert!(swapped.check_timing(f64::NEG_INFINITY).unwrap_err().contains("token a"));

        let backwards = Segment::new("p1", None, vec![Token::new("a", "x", 50.0, 40.0)]);
        assert!(backwards.check_timing(f64::NEG_INFINITY).is_err());

        let ok = Segment::new("p2", None, vec![Token::new("c", "x", 200.0, 200.0)]);
        assert_eq!(ok.check_timing(200.0), Ok(200.0));
        assert!(ok.check_timing(250.0).is_err());

        let chunk = Chunk {
            key: ChunkKey(0),
            version: 0,
            segments: vec![ok.clone(), Segment::new("p3", None, Vec::new()), swapped],
        };
        assert!(chunk.check_timing().is_err());
    }
}
