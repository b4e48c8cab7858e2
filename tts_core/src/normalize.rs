//! Text canonicalization ahead of vocabulary lookup.
//!
//! The model vocabulary only covers a constrained character set, so raw input is
//! decomposed, stripped of emoji and selected diacritics, and respaced before it is
//! indexed. Every step is infallible: characters no rule matches pass through and
//! are later mapped to the unknown id by the indexer.

use std::fmt;
use std::ops::Deref;
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Text that went through [`normalize`]. Re-normalizing yields the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Length in Unicode scalar values, the unit the indexer works in.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl Deref for NormalizedText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

const CHAR_REPLACEMENTS: &[(&str, &str)] = &[
    ("\u{2013}", "-"), // en dash
    ("\u{2011}", "-"), // non-breaking hyphen
    ("\u{2014}", "-"), // em dash
    ("\u{201C}", "\""),
    ("\u{201D}", "\""),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("[", " "),
    ("]", " "),
    ("|", " "),
    ("/", " "),
    ("#", " "),
    ("\u{2192}", " "), // →
    ("\u{2190}", " "), // ←
    ("_", " "),
    ("\u{00AF}", " "), // macron
];

/// Combining marks dropped after decomposition. Acute and grave accents are
/// deliberately absent: the vocabulary carries them.
const STRIPPED_DIACRITICS: &[char] = &[
    '\u{0302}', '\u{0303}', '\u{0304}', '\u{0305}', '\u{0306}', '\u{0307}', '\u{0308}',
    '\u{030A}', '\u{030B}', '\u{030C}', '\u{0327}', '\u{0328}', '\u{0329}', '\u{032A}',
    '\u{032B}', '\u{032C}', '\u{032D}', '\u{032E}', '\u{032F}',
];

const STRIPPED_SYMBOLS: &[char] = &['\u{2665}', '\u{2606}', '\u{2661}', '\u{00A9}', '\\'];

const EXPRESSION_REPLACEMENTS: &[(&str, &str)] = &[
    ("@", " at "),
    ("e.g.,", "for example, "),
    ("i.e.,", "that is, "),
];

const DUPLICATE_QUOTES: &[(&str, &str)] = &[("\"\"", "\""), ("''", "'"), ("``", "`")];

/// Characters a normalized string may end with; anything else gets a period.
pub const TERMINAL_PUNCTUATION: &[char] = &[
    '.', '!', '?', ';', ':', ',', '\'', '"', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}',
    ')', ']', '}', '\u{2026}', '\u{3002}', '\u{300D}', '\u{300F}', '\u{3011}', '\u{3009}',
    '\u{300B}', '\u{203A}', '\u{00BB}',
];

fn emoji_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}",
            r"\x{1F700}-\x{1F77F}\x{1F780}-\x{1F7FF}\x{1F800}-\x{1F8FF}",
            r"\x{1F900}-\x{1F9FF}\x{1FA00}-\x{1FA6F}\x{1FA70}-\x{1FAFF}",
            r"\x{2600}-\x{26FF}\x{2700}-\x{27BF}\x{1F1E6}-\x{1F1FF}\x{FE0F}]+"
        ))
        .expect("emoji pattern is valid")
    })
}

fn space_before_punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+([,.!?;:'])").expect("punctuation pattern is valid"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// Canonicalize `text` for the vocabulary indexer.
pub fn normalize(text: &str) -> NormalizedText {
    let mut text: String = text.nfkd().collect();

    text = emoji_re().replace_all(&text, "").into_owned();

    for (from, to) in CHAR_REPLACEMENTS {
        if text.contains(from) {
            text = text.replace(from, to);
        }
    }

    text.retain(|c| !STRIPPED_DIACRITICS.contains(&c) && !STRIPPED_SYMBOLS.contains(&c));
    // removed characters can leave neighbouring combining marks out of canonical order
    text = text.nfkd().collect();

    // each pass can expose a new match for the others
    loop {
        let before = text.clone();

        for (from, to) in EXPRESSION_REPLACEMENTS {
            if text.contains(from) {
                text = text.replace(from, to);
            }
        }

        text = space_before_punct_re().replace_all(&text, "$1").into_owned();

        for (pair, single) in DUPLICATE_QUOTES {
            while text.contains(pair) {
                text = text.replace(pair, single);
            }
        }

        if text == before {
            break;
        }
    }

    text = whitespace_re().replace_all(&text, " ").trim().to_string();

    if !text.ends_with(TERMINAL_PUNCTUATION) {
        text.push('.');
    }

    NormalizedText(text)
}
