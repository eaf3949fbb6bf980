//! Text segmentation helpers
//!
//! Sentence splitting, word tokenization and pronoun tables shared by the
//! gender resolver and the graph extraction strategies.

use std::collections::HashSet;

use kgt_core::{Gender, TextSpan};
use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?\n]+(?:[.!?]+|\n|$)").expect("valid sentence regex"));

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("valid word regex"));

const MALE_PRONOUNS: &[&str] = &["he", "him", "his", "himself"];
const FEMALE_PRONOUNS: &[&str] = &["she", "her", "hers", "herself"];
const OTHER_PRONOUNS: &[&str] = &[
    "i", "me", "my", "mine", "myself", "we", "us", "our", "ours", "ourselves", "you", "your",
    "yours", "yourself", "yourselves", "they", "them", "their", "theirs", "themselves", "it",
    "its", "itself", "who", "whom", "whose", "one",
];

/// Words skipped when reading a connecting phrase between two entities
const FUNCTION_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "nor", "of", "in", "on", "at", "to", "for", "from",
    "by", "with", "into", "onto", "about", "as", "than", "that", "this", "these", "those", "s",
];

/// Longest connecting phrase kept, in words
const MAX_PHRASE_WORDS: usize = 3;

/// A word token with its position in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    /// Byte offset in the source text
    pub start: usize,
    /// Index of the sentence containing the token
    pub sentence: usize,
}

/// Sentence spans in text order, surrounding whitespace excluded
pub fn sentences(text: &str) -> Vec<TextSpan> {
    SENTENCE_RE
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str();
            let leading = raw.len() - raw.trim_start().len();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                None
            } else {
                let start = m.start() + leading;
                Some(TextSpan::new(start, start + trimmed.len()))
            }
        })
        .collect()
}

/// Index of the sentence containing `offset`, if any
pub fn sentence_of(spans: &[TextSpan], offset: usize) -> Option<usize> {
    spans
        .iter()
        .position(|s| offset >= s.start && offset < s.end)
}

/// Split on whitespace and punctuation, tagging each word with its sentence
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let spans = sentences(text);

    WORD_RE
        .find_iter(text)
        .map(|m| Token {
            text: m.as_str(),
            start: m.start(),
            sentence: sentence_of(&spans, m.start()).unwrap_or(spans.len()),
        })
        .collect()
}

/// Gender signalled by a single pronoun token, if it is a gendered pronoun
pub fn pronoun_gender(token: &str) -> Option<Gender> {
    let lower = bare_word(token);
    if MALE_PRONOUNS.contains(&lower.as_str()) {
        Some(Gender::Male)
    } else if FEMALE_PRONOUNS.contains(&lower.as_str()) {
        Some(Gender::Female)
    } else {
        None
    }
}

/// Whether the whole span is a single pronoun (gendered or not)
pub fn is_pronoun(span: &str) -> bool {
    let lower = bare_word(span);
    MALE_PRONOUNS.contains(&lower.as_str())
        || FEMALE_PRONOUNS.contains(&lower.as_str())
        || OTHER_PRONOUNS.contains(&lower.as_str())
}

/// Verb-like phrase linking two entities, read from the text between them.
///
/// Takes the first run of content words (function words and pronouns end
/// the run), capped at a few words and joined with `_`. `None` when the
/// gap holds no content word.
pub fn connecting_phrase(between: &str) -> Option<String> {
    let words: Vec<String> = WORD_RE
        .find_iter(between)
        .map(|m| m.as_str().to_lowercase())
        .skip_while(|w| is_function_word(w))
        .take_while(|w| !is_function_word(w))
        .take(MAX_PHRASE_WORDS)
        .collect();

    (!words.is_empty()).then(|| words.join("_"))
}

/// Lowercased span with surrounding punctuation removed
fn bare_word(span: &str) -> String {
    span.trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn is_function_word(word: &str) -> bool {
    FUNCTION_WORDS.contains(&word) || is_pronoun(word)
}

/// Lowercased lookup set from a configured stoplist
pub fn stoplist_set<S: AsRef<str>>(words: &[S]) -> HashSet<String> {
    words.iter().map(|w| w.as_ref().to_lowercase()).collect()
}

/// Tokens that look like proper nouns: capitalized, not a pronoun, not in
/// the stoplist. Text order is preserved.
pub fn capitalized_tokens<'a>(text: &'a str, stoplist: &HashSet<String>) -> Vec<Token<'a>> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.text.chars().next().is_some_and(char::is_uppercase))
        .filter(|t| !is_pronoun(t.text))
        .filter(|t| !stoplist.contains(&t.text.to_lowercase()))
        .collect()
}
