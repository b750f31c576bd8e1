//! Narration text chunker.
//!
//! Speech backends cap the amount of text accepted per request, so long
//! narration is split into windows of at most `max_chars` characters.
//! Each window is cut right after the nearest sentence terminator found
//! near its end; when none exists the window is hard-cut at the limit.
//! Consecutive windows overlap by `overlap` characters for smoother
//! transitions between synthesized chunks.
//!
//! Lengths are counted in Unicode scalar values, not bytes.

use serde::Serialize;

use crate::error::CoreError;

/// Default character budget per chunk.
pub const DEFAULT_MAX_CHARS: usize = 1000;

/// Default overlap between consecutive chunks.
pub const DEFAULT_OVERLAP: usize = 50;

/// How far back from the tentative window end to look for a terminator.
pub const SENTENCE_SEARCH_WINDOW: usize = 200;

const TERMINATORS: [char; 3] = ['.', '!', '?'];
const TERMINATOR_FOLLOWERS: [char; 2] = [' ', '\n'];

/// One bounded slice of narration text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// 0-based position among the emitted chunks.
    pub ordinal: usize,
    /// Trimmed chunk text, never empty.
    pub text: String,
}

impl TextChunk {
    /// Letter label for this chunk (`A`, `B`, ... `Z`, `AA`, ...).
    pub fn label(&self) -> String {
        ordinal_label(self.ordinal)
    }
}

/// Map a 0-based ordinal to a spreadsheet-style letter label.
///
/// ```
/// use sketchcast_core::chunking::ordinal_label;
///
/// assert_eq!(ordinal_label(0), "A");
/// assert_eq!(ordinal_label(25), "Z");
/// assert_eq!(ordinal_label(26), "AA");
/// ```
pub fn ordinal_label(ordinal: usize) -> String {
    let mut n = ordinal + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Split `text` into overlapping chunks of at most `max_chars` characters.
///
/// Returns an error when `max_chars` is zero or `overlap` is not smaller
/// than `max_chars`; both would otherwise make the window never advance.
pub fn chunk_text(
    text: &str,
    max_chars: usize,
    overlap: usize,
) -> Result<Vec<TextChunk>, CoreError> {
    if max_chars == 0 {
        return Err(CoreError::Validation(
            "max_chars must be greater than 0".to_string(),
        ));
    }
    if overlap >= max_chars {
        return Err(CoreError::Validation(format!(
            "overlap ({overlap}) must be smaller than max_chars ({max_chars})"
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= max_chars {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![TextChunk {
            ordinal: 0,
            text: trimmed.to_string(),
        }]);
    }

    let mut chunks = Vec::new();
    let mut cursor = 0usize;

    while cursor < len {
        let mut end = (cursor + max_chars).min(len);

        if end < len {
            let search_start = cursor.max(end.saturating_sub(SENTENCE_SEARCH_WINDOW));
            if let Some(cut) = find_sentence_break(&chars, search_start, end) {
                end = cut;
            }
        }

        let window: String = chars[cursor..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(TextChunk {
                ordinal: chunks.len(),
                text: trimmed.to_string(),
            });
        }

        cursor = if end < len {
            // Overlap only when it still moves the cursor forward.
            end.checked_sub(overlap)
                .filter(|&next| next > cursor)
                .unwrap_or(end)
        } else {
            end
        };
    }

    Ok(chunks)
}

/// Position just after the last terminator pair lying entirely inside
/// `[start, end)`, if any.
fn find_sentence_break(chars: &[char], start: usize, end: usize) -> Option<usize> {
    (start..end.saturating_sub(1))
        .rev()
        .find(|&p| TERMINATORS.contains(&chars[p]) && TERMINATOR_FOLLOWERS.contains(&chars[p + 1]))
        .map(|p| p + 2)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    /// `count` sentences of exactly 120 characters each (`aaa…a. `).
    fn uniform_sentences(count: usize) -> String {
        let sentence = format!("{}. ", "a".repeat(118));
        sentence.repeat(count)
    }

    fn slice(text: &str, start: usize, end: usize) -> String {
        text.chars().skip(start).take(end - start).collect()
    }

    #[test]
    fn short_text_is_single_trimmed_chunk() {
        let chunks = chunk_text("  Hello there. General Kenobi.\n", 1000, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].ordinal, 0);
        assert_eq!(chunks[0].text, "Hello there. General Kenobi.");
    }

    #[test]
    fn text_exactly_at_limit_is_single_chunk() {
        let text = "b".repeat(1000);
        let chunks = chunk_text(&text, 1000, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn blank_text_yields_no_chunks() {
        assert!(chunk_text("   \n\t ", 1000, 50).unwrap().is_empty());
        assert!(chunk_text("", 10, 0).unwrap().is_empty());
    }

    #[test]
    fn zero_max_chars_is_rejected() {
        assert_matches!(chunk_text("abc", 0, 0), Err(CoreError::Validation(_)));
    }

    #[test]
    fn overlap_not_smaller_than_max_is_rejected() {
        assert_matches!(chunk_text("abc", 10, 10), Err(CoreError::Validation(_)));
        assert_matches!(chunk_text("abc", 10, 25), Err(CoreError::Validation(_)));
    }

    #[test]
    fn long_text_cuts_at_sentence_boundaries_with_overlap() {
        let text = uniform_sentences(20);
        assert_eq!(text.chars().count(), 2400);

        let chunks = chunk_text(&text, 1000, 50).unwrap();

        assert_eq!(chunks.len(), 3);
        // First window [0, 1000) ends on the terminator at 958..960.
        assert_eq!(chunks[0].text, slice(&text, 0, 960).trim());
        // Second window starts 50 characters before the first cut.
        assert_eq!(chunks[1].text, slice(&text, 910, 1800).trim());
        assert_eq!(chunks[2].text, slice(&text, 1750, 2400).trim());
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1000);
        }
    }

    #[test]
    fn unterminated_text_is_hard_cut() {
        let text = "x".repeat(2500);
        let chunks = chunk_text(&text, 1000, 0).unwrap();
        let lens: Vec<usize> = chunks.iter().map(|c| c.text.len()).collect();
        assert_eq!(lens, vec![1000, 1000, 500]);
    }

    #[test]
    fn nearest_terminator_wins() {
        // '. ' early in the window, '? ' closer to the end.
        let text = format!("{}. {}? {}", "a".repeat(10), "b".repeat(10), "c".repeat(40));
        let chunks = chunk_text(&text, 30, 0).unwrap();
        assert_eq!(chunks[0].text, format!("{}. {}?", "a".repeat(10), "b".repeat(10)));
    }

    #[test]
    fn newline_counts_as_terminator_follower() {
        let text = format!("{}!\n{}", "a".repeat(8), "b".repeat(20));
        let chunks = chunk_text(&text, 15, 0).unwrap();
        assert_eq!(chunks[0].text, format!("{}!", "a".repeat(8)));
    }

    #[test]
    fn terminator_outside_search_window_is_ignored() {
        // The only terminator sits 300+ characters before the window end.
        let text = format!("{}. {}", "a".repeat(10), "b".repeat(1500));
        let chunks = chunk_text(&text, 400, 0).unwrap();
        assert_eq!(chunks[0].text.chars().count(), 400);
    }

    #[test]
    fn early_terminator_still_advances_past_overlap() {
        let text = format!("a. {}", "b".repeat(30));
        let chunks = chunk_text(&text, 10, 5).unwrap();
        assert_eq!(chunks[0].text, "a.");
        assert!(chunks.len() > 1);
        assert!(chunks.last().unwrap().text.ends_with('b'));
    }

    #[test]
    fn every_chunk_respects_budget_for_mixed_text() {
        let mut text = String::new();
        for i in 0..300 {
            let words = "word ".repeat(i % 17 + 1);
            let end = [". ", "! ", "? ", ".\n", ", "][i % 5];
            text.push_str(&format!("Line {i} {words}{end}"));
        }
        let chunks = chunk_text(&text, 350, 40).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 350);
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn ordinals_are_contiguous_from_zero() {
        let text = uniform_sentences(40);
        let chunks = chunk_text(&text, 500, 20).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert_eq!(chunk.label(), ordinal_label(i));
        }
        assert_eq!(chunks[0].label(), "A");
        assert_eq!(chunks[1].label(), "B");
    }

    #[test]
    fn chunking_is_idempotent() {
        let text = uniform_sentences(33);
        assert_eq!(
            chunk_text(&text, 700, 50).unwrap(),
            chunk_text(&text, 700, 50).unwrap()
        );
    }

    #[test]
    fn lengths_are_counted_in_characters() {
        // 'é' is two bytes but one character.
        let text = "é".repeat(20);
        let chunks = chunk_text(&text, 20, 0).unwrap();
        assert_eq!(chunks.len(), 1);

        let chunks = chunk_text(&"é".repeat(25), 10, 0).unwrap();
        let lens: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        assert_eq!(lens, vec![10, 10, 5]);
    }

    #[test]
    fn labels_continue_past_z() {
        assert_eq!(ordinal_label(1), "B");
        assert_eq!(ordinal_label(27), "AB");
        assert_eq!(ordinal_label(51), "AZ");
        assert_eq!(ordinal_label(52), "BA");
        assert_eq!(ordinal_label(701), "ZZ");
        assert_eq!(ordinal_label(702), "AAA");
    }
}
