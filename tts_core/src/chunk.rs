//! Splitting long input into independently synthesized chunks.

use std::sync::OnceLock;

use regex::Regex;

/// Default upper bound on chunk length, in characters.
pub const MAX_CHUNK_LENGTH: usize = 300;

/// Tokens ending in a period that do not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "Sr.", "Jr.", "St.", "Ave.", "Rd.", "Blvd.", "Dept.",
    "Inc.", "Ltd.", "Co.", "Corp.", "etc.", "vs.", "i.e.", "e.g.", "Ph.D.", "a.m.", "p.m.",
];

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"))
}

fn sentence_boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence pattern is valid"))
}

/// Split `text` into chunks of at most `max_len` characters.
///
/// Paragraphs (blank-line separated) never share a chunk. Inside a paragraph whole
/// sentences are packed greedily; a sentence longer than `max_len` is emitted on its
/// own rather than cut. Returns an empty vector when `text` has no non-blank content.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();

    for paragraph in paragraph_re().split(text.trim()) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in split_sentences(paragraph) {
            let sentence_len = sentence.chars().count();

            if !current.is_empty() && current_len + sentence_len + 1 > max_len {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }

            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(sentence);
            current_len += sentence_len;
        }

        if !current.is_empty() {
            chunks.push(current);
        }
    }

    chunks
}

/// Split a paragraph at `.`, `!` or `?` followed by whitespace, skipping boundaries
/// that close an abbreviation or an initial. Returned sentences are trimmed and
/// non-empty.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;

    for m in sentence_boundary_re().find_iter(text) {
        // The punctuation mark is one byte wide, so this slice ends right after it.
        let candidate = &text[start..m.start() + 1];
        if ends_with_abbreviation(candidate) || ends_with_initial(candidate) {
            continue;
        }
        let sentence = candidate.trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }

    sentences
}

/// Whether the token preceding the final character starts at a word boundary.
fn preceded_by_boundary(text: &str, token_len: usize) -> bool {
    text[..text.len() - token_len]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric())
}

fn ends_with_abbreviation(text: &str) -> bool {
    ABBREVIATIONS
        .iter()
        .any(|abbr| text.ends_with(abbr) && preceded_by_boundary(text, abbr.len()))
}

fn ends_with_initial(text: &str) -> bool {
    let mut tail = text.chars().rev();
    match (tail.next(), tail.next()) {
        (Some('.'), Some(letter)) if letter.is_uppercase() => {
            preceded_by_boundary(text, '.'.len_utf8() + letter.len_utf8())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk_text("Hello there. How are you?", 300), vec!["Hello there. How are you?"]);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 300).is_empty());
        assert!(chunk_text(" \n\n \t", 300).is_empty());
    }

    #[test]
    fn test_paragraphs_are_split() {
        let chunks = chunk_text("First paragraph.\n\nSecond paragraph.\n  \n\nThird.", 300);
        assert_eq!(chunks, vec!["First paragraph.", "Second paragraph.", "Third."]);
    }

    #[test]
    fn test_sentences_are_packed_greedily() {
        let text = "aaaa. bbbb. cccc. dddd.";
        // "aaaa. bbbb." is 11 chars, adding " cccc." would make 17.
        let chunks = chunk_text(text, 12);
        assert_eq!(chunks, vec!["aaaa. bbbb.", "cccc. dddd."]);
    }

    #[test]
    fn test_exact_fit_is_accepted() {
        // 5 + 1 + 5 == 11
        assert_eq!(chunk_text("aaaa. bbbb.", 11), vec!["aaaa. bbbb."]);
        assert_eq!(chunk_text("aaaa. bbbb.", 10), vec!["aaaa.", "bbbb."]);
    }

    #[test]
    fn test_oversized_sentence_is_not_split() {
        let long = "word ".repeat(20).trim_end().to_string() + ".";
        let text = format!("Short one. {long} Tail.");
        let chunks = chunk_text(&text, 30);
        assert_eq!(chunks, vec!["Short one.".to_string(), long, "Tail.".to_string()]);
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        let sentences = split_sentences("Dr. Smith met Mrs. Jones at 5 p.m. today. They talked.");
        assert_eq!(
            sentences,
            vec!["Dr. Smith met Mrs. Jones at 5 p.m. today.", "They talked."]
        );
        let sentences = split_sentences("Apples, pears, etc. are fruit. Acme Inc. agrees.");
        assert_eq!(sentences, vec!["Apples, pears, etc. are fruit.", "Acme Inc. agrees."]);
    }

    #[test]
    fn test_abbreviation_requires_word_boundary() {
        // "MADr." is not the title "Dr."
        let sentences = split_sentences("It was MADr. Then it ended.");
        assert_eq!(sentences, vec!["It was MADr.", "Then it ended."]);
    }

    #[test]
    fn test_initials_do_not_split() {
        let sentences = split_sentences("J. R. R. Tolkien wrote books. He died in 1973.");
        assert_eq!(sentences, vec!["J. R. R. Tolkien wrote books.", "He died in 1973."]);
    }

    #[test]
    fn test_question_and_exclamation_split() {
        let sentences = split_sentences("Really? Yes! Fine.");
        assert_eq!(sentences, vec!["Really?", "Yes!", "Fine."]);
    }

    #[test]
    fn test_no_chunk_exceeds_limit_unless_single_sentence() {
        let text = "One sentence here. Another one follows it. A third sentence is a bit longer than the others. \
                    Short. And then a final sentence that closes the paragraph.\n\n\
                    New paragraph starts. It continues for a while, with commas, and clauses.";
        for max_len in [20, 40, 60, 100] {
            for chunk in chunk_text(text, max_len) {
                let len = chunk.chars().count();
                assert!(
                    len <= max_len || split_sentences(&chunk).len() == 1,
                    "chunk {chunk:?} exceeds {max_len}"
                );
            }
        }
    }

    #[test]
    fn test_chunking_preserves_content_and_order() {
        let text = "Mr. Brown arrived.   He sat down!\nThen he left?\n\n\nNext day, e.g. Monday, he returned. The end.";
        for max_len in [1, 15, 40, 300] {
            let joined: String = chunk_text(text, max_len).concat();
            assert_eq!(squash(&joined), squash(text), "max_len {max_len}");
        }
    }
}
