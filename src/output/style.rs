use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashMap};

use crate::document::models::Segment;
use crate::playhead::PlayheadState;

pub const ACTIVE: &str = "active";
pub const UNPLAYED: &str = "unplayed";
pub const PLAYED: &str = "played";

/// Visual effects a terminal can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Plain,
    Bold,
    Dim,
    Underline,
    Inverse,
}

impl Effect {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "plain" | "none" => Some(Effect::Plain),
            "bold" => Some(Effect::Bold),
            "dim" | "grey" | "gray" => Some(Effect::Dim),
            "underline" => Some(Effect::Underline),
            "inverse" | "reverse" => Some(Effect::Inverse),
            _ => None,
        }
    }

    pub fn paint(self, text: &str) -> String {
        let code = match self {
            Effect::Plain => return text.to_string(),
            Effect::Bold => 1,
            Effect::Dim => 2,
            Effect::Underline => 4,
            Effect::Inverse => 7,
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Style name → effect, built once from configuration and owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleMap {
    effects: BTreeMap<String, Effect>,
}

impl StyleMap {
    pub fn from_config(styles: &BTreeMap<String, String>) -> Result<Self> {
        let mut effects = BTreeMap::new();
        for (name, effect) in styles {
            match Effect::from_str(effect) {
                Some(e) => {
                    effects.insert(name.clone(), e);
                }
                None => bail!("Unknown effect \"{effect}\" for style \"{name}\""),
            }
        }
        Ok(StyleMap { effects })
    }

    /// Unknown style names render plain.
    pub fn effect(&self, style: &str) -> Effect {
        self.effects.get(style).copied().unwrap_or(Effect::Plain)
    }
}

/// Token id → style name for the current play-head position. Tokens before
/// the play-head are `played`, the active token is `active`, everything
/// after is `unplayed`. Without a resolved segment nothing is styled.
pub fn playhead_styles<'a>(
    playhead: &PlayheadState,
    segments: impl IntoIterator<Item = &'a Segment>,
) -> impl Fn(&str) -> Option<&'static str> {
    let mut styles: HashMap<String, &'static str> = HashMap::new();

    if let (Some(current), Some(time)) = (&playhead.position.segment_id, playhead.time) {
        let active = playhead.position.entity_id.as_deref();
        let mut seen_current = false;
        for segment in segments {
            let is_current = segment.id == *current;
            for token in &segment.words {
                let style = if is_current {
                    if Some(token.id.as_str()) == active {
                        ACTIVE
                    } else if token.end <= time {
                        PLAYED
                    } else {
                        UNPLAYED
                    }
                } else if seen_current {
                    UNPLAYED
                } else {
                    PLAYED
                };
                styles.insert(token.id.clone(), style);
            }
            seen_current |= is_current;
        }
    }

    move |token_id: &str| styles.get(token_id).copied()
}
