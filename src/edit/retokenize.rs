use std::collections::HashSet;

use crate::document::models::Token;
use crate::document::wire::RawEntityRange;
use crate::ids::IdGenerator;

/// A whitespace-delimited word of edited text, tagged with the token whose
/// entity range covers its first character (if any).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EditedWord {
    pub text: String,
    pub origin: Option<String>,
}

/// Split `text` into words. Inside an entity range only the first word
/// inherits the range's token; everything else is new text.
pub(crate) fn split_words(text: &str, ranges: &[RawEntityRange]) -> Vec<EditedWord> {
    let chars: Vec<char> = text.chars().collect();

    let mut sorted: Vec<&RawEntityRange> = ranges.iter().filter(|r| r.length > 0).collect();
    sorted.sort_by_key(|r| r.offset);

    let mut words = Vec::new();
    let mut cursor = 0;
    for range in sorted {
        if range.offset < cursor || range.offset >= chars.len() {
            continue;
        }
        let end = range.offset.saturating_add(range.length).min(chars.len());
        push_words(&chars[cursor..range.offset], None, &mut words);
        push_words(&chars[range.offset..end], Some(&range.key), &mut words);
        cursor = end;
    }
    push_words(&chars[cursor..], None, &mut words);
    words
}

fn push_words(chars: &[char], origin: Option<&str>, out: &mut Vec<EditedWord>) {
    let run: String = chars.iter().collect();
    for (i, word) in run.split_whitespace().enumerate() {
        out.push(EditedWord {
            text: word.to_string(),
            origin: if i == 0 { origin.map(str::to_string) } else { None },
        });
    }
}

/// Turn edited words into tokens. `resolve` yields the time range of a token
/// this segment may keep; `taken` reports ids owned anywhere in the document;
/// `claimed` tracks ids already used by this edit so a duplicated token keeps
/// its identity only once. A kept token starting before the previous kept
/// token's end (or before `anchor`) was moved out of time order and is
/// treated as new text. New tokens get fresh ids and a zero-length range at
/// the preceding token's end (or the next kept token's start, or `anchor`).
pub(crate) fn build_tokens(
    words: Vec<EditedWord>,
    resolve: &dyn Fn(&str) -> Option<(f64, f64)>,
    taken: &dyn Fn(&str) -> bool,
    claimed: &mut HashSet<String>,
    ids: &mut dyn IdGenerator,
    anchor: f64,
) -> Vec<Token> {
    let mut pending: Vec<(String, String, Option<(f64, f64)>)> = Vec::with_capacity(words.len());
    let mut floor = anchor;

    for word in words {
        let kept = word.origin.and_then(|id| {
            if claimed.contains(&id) {
                return None;
            }
            resolve(&id)
                .filter(|(start, _)| *start >= floor)
                .map(|range| (id, range))
        });
        match kept {
            Some((id, range)) => {
                floor = range.1;
                claimed.insert(id.clone());
                pending.push((id, word.text, Some(range)));
            }
            None => {
                let id = fresh_id(ids, claimed, taken);
                claimed.insert(id.clone());
                pending.push((id, word.text, None));
            }
        }
    }

    let mut next_start = vec![None; pending.len()];
    let mut upcoming = None;
    for (i, (_, _, range)) in pending.iter().enumerate().rev() {
        next_start[i] = upcoming;
        if let Some((start, _)) = range {
            upcoming = Some(*start);
        }
    }

    let mut prev_end: Option<f64> = None;
    let mut tokens = Vec::with_capacity(pending.len());
    for (i, (id, text, range)) in pending.into_iter().enumerate() {
        let (start, end) = match range {
            Some(range) => range,
            None => {
                let at = prev_end.or(next_start[i]).unwrap_or(anchor);
                (at, at)
            }
        };
        prev_end = Some(end);
        tokens.push(Token::new(id, text, start, end));
    }
    tokens
}

fn fresh_id(
    ids: &mut dyn IdGenerator,
    claimed: &HashSet<String>,
    taken: &dyn Fn(&str) -> bool,
) -> String {
    loop {
        let id = ids.next_id();
        if !claimed.contains(&id) && !taken(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIdGen;

    fn range(key: &str, offset: usize, length: usize) -> RawEntityRange {
        RawEntityRange {
            key: key.into(),
            offset,
            length,
        }
    }

    #[test]
    fn uncovered_text_becomes_new_words() {
        let words = split_words("hello worldx", &[range("a", 0, 5), range("b", 6, 5)]);
        let origins: Vec<Option<&str>> = words.iter().map(|w| w.origin.as_deref()).collect();
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "world", "x"]);
        assert_eq!(origins, vec![Some("a"), Some("b"), None]);
    }

    #[test]
    fn space_typed_inside_a_range_splits_it() {
        let words = split_words("wor ld", &[range("a", 0, 6)]);
        assert_eq!(words[0].origin.as_deref(), Some("a"));
        assert_eq!(words[1].origin, None);
        assert_eq!(words[1].text, "ld");
    }

    #[test]
    fn deleted_range_text_drops_the_token() {
        let words = split_words("hello   ", &[range("a", 0, 5), range("b", 6, 2)]);
        assert_eq!(words.len(), 1);
    }

    #[test]
    fn oversized_range_length_is_clamped() {
        let words = split_words("hello there", &[range("a", 0, 5), range("b", 6, usize::MAX)]);
        let origins: Vec<Option<&str>> = words.iter().map(|w| w.origin.as_deref()).collect();
        assert_eq!(origins, vec![Some("a"), Some("b")]);
        assert_eq!(words[1].text, "there");
    }

    #[test]
    fn out_of_bounds_and_overlapping_ranges_are_ignored() {
        let words = split_words("hi", &[range("a", 0, 2), range("b", 1, 1), range("c", 9, 1)]);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].origin.as_deref(), Some("a"));
    }

    #[test]
    fn new_tokens_get_zero_length_placeholders() {
        let words = vec![
            EditedWord { text: "so".into(), origin: None },
            EditedWord { text: "hello".into(), origin: Some("a".into()) },
            EditedWord { text: "there".into(), origin: None },
        ];
        let resolve = |id: &str| (id == "a").then_some((100.0, 200.0));
        let mut claimed = HashSet::new();
        let mut ids = SequentialIdGen::new("n");
        let tokens = build_tokens(words, &resolve, &|_| false, &mut claimed, &mut ids, 0.0);

        assert_eq!(tokens[0].id, "n0");
        assert_eq!((tokens[0].start, tokens[0].end), (100.0, 100.0));
        assert_eq!((tokens[1].start, tokens[1].end), (100.0, 200.0));
        assert_eq!((tokens[2].start, tokens[2].end), (200.0, 200.0));
    }

    #[test]
    fn duplicated_token_keeps_identity_once() {
        let words = vec![
            EditedWord { text: "hi".into(), origin: Some("a".into()) },
            EditedWord { text: "hi".into(), origin: Some("a".into()) },
        ];
        let resolve = |id: &str| (id == "a").then_some((0.0, 50.0));
        let mut claimed = HashSet::new();
        let mut ids = SequentialIdGen::new("n");
        let tokens = build_tokens(words, &resolve, &|_| false, &mut claimed, &mut ids, 0.0);
        assert_eq!(tokens[0].id, "a");
        assert_eq!(tokens[1].id, "n0");
        assert_eq!(tokens[1].start, 50.0);
    }

    #[test]
    fn fresh_ids_skip_ids_already_in_use() {
        let words = vec![EditedWord { text: "x".into(), origin: None }];
        let taken = |id: &str| id == "n0";
        let mut claimed = HashSet::new();
        let mut ids = SequentialIdGen::new("n");
        let tokens = build_tokens(words, &|_| None, &taken, &mut claimed, &mut ids, 7.0);
        assert_eq!(tokens[0].id, "n1");
        assert_eq!(tokens[0].start, 7.0);
    }

    #[test]
    fn tokens_moved_out_of_time_order_become_new() {
        // "c a b": c was spoken last but now comes first.
        let words = vec![
            EditedWord { text: "c".into(), origin: Some("c".into()) },
            EditedWord { text: "a".into(), origin: Some("a".into()) },
            EditedWord { text: "b".into(), origin: Some("b".into()) },
        ];
        let resolve = |id: &str| match id {
            "a" => Some((0.0, 100.0)),
            "b" => Some((100.0, 200.0)),
            "c" => Some((200.0, 300.0)),
            _ => None,
        };
        let mut claimed = HashSet::new();
        let mut ids = SequentialIdGen::new("n");
        let tokens = build_tokens(words, &resolve, &|_| false, &mut claimed, &mut ids, 0.0);

        let ids: Vec<&str> = tokens.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "n0", "n1"]);
        assert!(tokens.iter().all(|t| (t.start, t.end) == (300.0, 300.0) || t.id == "c"));
        assert!(!claimed.contains("a"));
    }

    #[test]
    fn kept_tokens_never_start_before_the_anchor() {
        let words = vec![EditedWord { text: "a".into(), origin: Some("a".into()) }];
        let resolve = |id: &str| (id == "a").then_some((0.0, 100.0));
        let mut claimed = HashSet::new();
        let mut ids = SequentialIdGen::new("n");
        let tokens = build_tokens(words, &resolve, &|_| false, &mut claimed, &mut ids, 500.0);
        assert_eq!(tokens[0].id, "n0");
        assert_eq!((tokens[0].start, tokens[0].end), (500.0, 500.0));
    }
}
