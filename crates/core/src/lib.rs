pub mod canonical;
pub mod config;
pub mod degrade;
pub mod error;
pub mod filter;
pub mod similarity;
pub mod vocabulary;

pub use canonical::{CanonicalMatch, Canonicalizer, Matcher, DEFAULT_FUZZY_CUTOFF};
pub use config::{
    ExtractorConfig, FallbackConfig, MatchingConfig, PreprocessConfig, RecognitionConfig,
};
pub use degrade::{Exhausted, Resolved, Tier, TwoTier};
pub use error::{ConfigError, VocabularyError};
pub use filter::{loose_candidates, LineFilter, Rejection, TokenSequence};
pub use similarity::{closest_match, similarity};
pub use vocabulary::Vocabulary;
