use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::vocabulary::Vocabulary;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_trailing_amount, r"[\s.,]*\d+[.,]\d{2}\s*$");
re!(re_non_letter, r"[^A-Za-z\s]");
re!(re_multi_space, r"\s{2,}");

pub const DEFAULT_MAX_LINE_WORDS: usize = 5;
pub const DEFAULT_LOOSE_MAX_WORDS: usize = 4;

// ── Types ─────────────────────────────────────────────────────────────────────

/// Normalized word tokens from one receipt line, in line order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSequence(Vec<String>);

impl TokenSequence {
    pub fn new(tokens: Vec<String>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn joined(&self) -> String {
        self.0.join(" ")
    }
}

/// Why a line was dropped. Rejection is the normal fate of most receipt lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("nothing left after cleanup")]
    Empty,
    #[error("mostly digits or noise")]
    Noise,
    #[error("looks like receipt metadata")]
    Metadata,
    #[error("{words} words exceeds the limit of {max}")]
    TooLong { words: usize, max: usize },
    #[error("no tokens left after dropping units")]
    NoTokens,
    #[error("starts with stopword '{0}'")]
    LeadingStopword(String),
}

// ── Line filter ───────────────────────────────────────────────────────────────

pub struct LineFilter<'v> {
    vocab: &'v Vocabulary,
    max_words: usize,
}

impl<'v> LineFilter<'v> {
    pub fn new(vocab: &'v Vocabulary) -> Self {
        Self { vocab, max_words: DEFAULT_MAX_LINE_WORDS }
    }

    pub fn with_max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }

    /// Clean one raw line and turn it into tokens, or say why it was dropped.
    pub fn filter(&self, raw: &str) -> Result<TokenSequence, Rejection> {
        let line = clean_line(raw);
        if line.is_empty() {
            return Err(Rejection::Empty);
        }
        if is_noise(&line) {
            return Err(Rejection::Noise);
        }
        if self.vocab.contains_stopword(&line) || self.vocab.matches_metadata(&line) {
            return Err(Rejection::Metadata);
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() > self.max_words {
            return Err(Rejection::TooLong { words: words.len(), max: self.max_words });
        }

        let tokens = self.normalize_tokens(&words);
        let Some(first) = tokens.first() else {
            return Err(Rejection::NoTokens);
        };
        if self.vocab.is_stopword(first) {
            return Err(Rejection::LeadingStopword(first.clone()));
        }
        Ok(TokenSequence(tokens))
    }

    /// Lowercase, drop unit tokens, singularize.
    pub fn normalize_tokens(&self, words: &[&str]) -> Vec<String> {
        words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty() && !self.vocab.is_unit(w))
            .map(|w| singularize(&w))
            .collect()
    }
}

/// Strip a trailing price column, replace non-letters with spaces, lowercase
/// and squeeze whitespace.
pub fn clean_line(raw: &str) -> String {
    let without_amount = re_trailing_amount().replace(raw, " ");
    let letters_only = re_non_letter().replace_all(&without_amount, " ").to_lowercase();
    re_multi_space()
        .replace_all(&letters_only, " ")
        .trim()
        .to_string()
}

fn is_noise(line: &str) -> bool {
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    let digits = line.chars().filter(|c| c.is_ascii_digit()).count();
    digits > letters || letters == 0
}

/// Naive English singular: "berries" → "berry", "tomatoes" → "tomato",
/// "apples" → "apple". Short words are left alone.
pub fn singularize(word: &str) -> String {
    let len = word.chars().count();
    if len > 4 {
        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{stem}y");
        }
        if let Some(stem) = word.strip_suffix("oes") {
            return format!("{stem}o");
        }
    }
    if len > 3 {
        if let Some(stem) = word.strip_suffix('s') {
            return stem.to_string();
        }
    }
    word.to_string()
}

// ── Loose pass ────────────────────────────────────────────────────────────────

/// The simplified last-resort filter: letters only, no stopword substrings,
/// between one and `max_words` words. Returns sorted unique candidates.
pub fn loose_candidates(text: &str, vocab: &Vocabulary, max_words: usize) -> Vec<String> {
    let mut candidates = BTreeSet::new();
    for raw in text.lines() {
        let letters_only = re_non_letter().replace_all(raw, " ").to_lowercase();
        let line = re_multi_space().replace_all(letters_only.trim(), " ").into_owned();
        if line.is_empty() || vocab.contains_stopword(&line) {
            continue;
        }
        let words = line.split_whitespace().count();
        if (1..=max_words).contains(&words) {
            candidates.insert(line);
        }
    }
    candidates.into_iter().collect()
}
