use crate::filter::TokenSequence;
use crate::similarity::closest_match;
use crate::vocabulary::Vocabulary;

pub const DEFAULT_FUZZY_CUTOFF: f32 = 0.86;

/// One strategy for mapping a token sequence onto a vocabulary name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Matcher {
    /// Joined tokens equal a multi-word phrase.
    ExactPhrase,
    /// Two or three tokens whose joined text is close to a multi-word phrase.
    FuzzyPhrase,
    /// A lone token that is a single-word ingredient.
    ExactWord,
    /// A lone token close to a single-word ingredient.
    FuzzyWord,
    /// Ingredient followed by descriptors ("chicken breast").
    LeadingWord,
    /// Descriptors followed by an ingredient ("fresh tomato").
    TrailingWord,
}

impl Matcher {
    /// Default evaluation order; the first hit wins.
    pub const CASCADE: [Matcher; 6] = [
        Matcher::ExactPhrase,
        Matcher::FuzzyPhrase,
        Matcher::ExactWord,
        Matcher::FuzzyWord,
        Matcher::LeadingWord,
        Matcher::TrailingWord,
    ];

    /// Returns the matched vocabulary name and its similarity score.
    pub fn try_match<'v>(
        self,
        tokens: &TokenSequence,
        vocab: &'v Vocabulary,
        cutoff: f32,
    ) -> Option<(&'v str, f32)> {
        match self {
            Matcher::ExactPhrase => vocab.phrase(&tokens.joined()).map(|p| (p, 1.0)),
            Matcher::FuzzyPhrase => {
                if !(2..=3).contains(&tokens.len()) {
                    return None;
                }
                closest_match(&tokens.joined(), vocab.phrases(), cutoff)
            }
            Matcher::ExactWord => match tokens.tokens() {
                [only] => vocab.single_word(only).map(|w| (w, 1.0)),
                _ => None,
            },
            Matcher::FuzzyWord => match tokens.tokens() {
                [only] => closest_match(only, vocab.single_words(), cutoff),
                _ => None,
            },
            Matcher::LeadingWord => {
                if tokens.len() < 2 {
                    return None;
                }
                vocab.single_word(tokens.first()?).map(|w| (w, 1.0))
            }
            Matcher::TrailingWord => {
                if tokens.len() < 2 {
                    return None;
                }
                vocab.single_word(tokens.last()?).map(|w| (w, 1.0))
            }
        }
    }
}

impl std::fmt::Display for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::ExactPhrase => write!(f, "exact_phrase"),
            Matcher::FuzzyPhrase => write!(f, "fuzzy_phrase"),
            Matcher::ExactWord => write!(f, "exact_word"),
            Matcher::FuzzyWord => write!(f, "fuzzy_word"),
            Matcher::LeadingWord => write!(f, "leading_word"),
            Matcher::TrailingWord => write!(f, "trailing_word"),
        }
    }
}

/// A canonical ingredient name plus how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMatch {
    pub name: String,
    pub matcher: Matcher,
    pub score: f32,
}

pub struct Canonicalizer<'v> {
    vocab: &'v Vocabulary,
    cutoff: f32,
    cascade: Vec<Matcher>,
}

impl<'v> Canonicalizer<'v> {
    pub fn new(vocab: &'v Vocabulary) -> Self {
        Self {
            vocab,
            cutoff: DEFAULT_FUZZY_CUTOFF,
            cascade: Matcher::CASCADE.to_vec(),
        }
    }

    pub fn with_cutoff(mut self, cutoff: f32) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Replace the matcher order, e.g. to disable fuzzy matching.
    pub fn with_cascade(mut self, cascade: Vec<Matcher>) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn canonicalize(&self, tokens: &TokenSequence) -> Option<CanonicalMatch> {
        if tokens.is_empty() {
            return None;
        }
        self.cascade.iter().find_map(|&matcher| {
            matcher
                .try_match(tokens, self.vocab, self.cutoff)
                .map(|(name, score)| CanonicalMatch { name: name.to_string(), matcher, score })
        })
    }
}
