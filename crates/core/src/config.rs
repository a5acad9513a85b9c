use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canonical::DEFAULT_FUZZY_CUTOFF;
use crate::error::ConfigError;
use crate::filter::{DEFAULT_LOOSE_MAX_WORDS, DEFAULT_MAX_LINE_WORDS};

/// Tunables for the whole extraction pipeline. Every field has a default, so
/// an empty TOML document is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Replacement vocabulary file; the builtin grocery vocabulary otherwise.
    pub vocabulary_path: Option<PathBuf>,
    pub matching: MatchingConfig,
    pub fallback: FallbackConfig,
    pub preprocess: PreprocessConfig,
    pub recognition: RecognitionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    pub fuzzy_cutoff: f32,
    pub max_line_words: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_cutoff: DEFAULT_FUZZY_CUTOFF,
            max_line_words: DEFAULT_MAX_LINE_WORDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FallbackConfig {
    /// The loose pass keeps lines with 1..=max_words words.
    pub max_words: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self { max_words: DEFAULT_LOOSE_MAX_WORDS }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Upscale when the shorter side is below this many pixels.
    pub min_short_side: u32,
    pub upscale_factor: f32,
    /// Upscaling never grows either edge past this many pixels.
    pub max_dimension: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_short_side: 900,
            upscale_factor: 1.5,
            max_dimension: 20_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Preferred language; dropped when the engine lacks it.
    pub language: Option<String>,
    /// Page segmentation mode for the first attempt.
    pub page_seg_mode: Option<u32>,
    pub preserve_interword_spaces: bool,
    /// Engine data directory (e.g. tessdata).
    pub data_path: Option<String>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: Some("eng".to_string()),
            page_seg_mode: Some(6),
            preserve_interword_spaces: true,
            data_path: None,
        }
    }
}

impl ExtractorConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        // Relative vocabulary paths are relative to the config file.
        if let (Some(vocab), Some(dir)) = (config.vocabulary_path.as_mut(), path.parent()) {
            if vocab.is_relative() {
                *vocab = dir.join(&*vocab);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cutoff = self.matching.fuzzy_cutoff;
        if !(cutoff > 0.0 && cutoff <= 1.0) {
            return Err(invalid("matching.fuzzy_cutoff", format!("{cutoff} is not in (0, 1]")));
        }
        if self.matching.max_line_words == 0 {
            return Err(invalid("matching.max_line_words", "must be at least 1"));
        }
        if self.fallback.max_words == 0 {
            return Err(invalid("fallback.max_words", "must be at least 1"));
        }
        let factor = self.preprocess.upscale_factor;
        if !(factor.is_finite() && factor >= 1.0) {
            return Err(invalid("preprocess.upscale_factor", format!("{factor} is below 1.0")));
        }
        if self.preprocess.max_dimension == 0 {
            return Err(invalid("preprocess.max_dimension", "must be at least 1"));
        }
        if matches!(self.recognition.language.as_deref(), Some(l) if l.trim().is_empty()) {
            return Err(invalid("recognition.language", "must not be blank"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = ExtractorConfig::from_toml("").unwrap();
        assert_eq!(config, ExtractorConfig::default());
        assert_eq!(config.matching.fuzzy_cutoff, 0.86);
        assert_eq!(config.matching.max_line_words, 5);
        assert_eq!(config.fallback.max_words, 4);
        assert_eq!(config.preprocess.min_short_side, 900);
        assert_eq!(config.recognition.language.as_deref(), Some("eng"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ExtractorConfig::from_toml(
            r#"
            [matching]
            fuzzy_cutoff = 0.9

            [recognition]
            page_seg_mode = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.matching.fuzzy_cutoff, 0.9);
        assert_eq!(config.matching.max_line_words, 5);
        assert_eq!(config.recognition.page_seg_mode, Some(4));
        assert!(config.recognition.preserve_interword_spaces);
    }

    #[test]
    fn rejects_out_of_range_cutoff() {
        let err = ExtractorConfig::from_toml("[matching]\nfuzzy_cutoff = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "matching.fuzzy_cutoff", .. }));
    }

    #[test]
    fn rejects_zero_word_limits() {
        assert!(ExtractorConfig::from_toml("[matching]\nmax_line_words = 0\n").is_err());
        assert!(ExtractorConfig::from_toml("[fallback]\nmax_words = 0\n").is_err());
    }

    #[test]
    fn rejects_shrinking_upscale() {
        let err = ExtractorConfig::from_toml("[preprocess]\nupscale_factor = 0.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "preprocess.upscale_factor", .. }));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            ExtractorConfig::from_toml("[matching"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_resolves_relative_vocabulary_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("larder.toml");
        std::fs::write(&path, "vocabulary_path = \"vocab.toml\"\n").unwrap();
        let config = ExtractorConfig::load(&path).unwrap();
        assert_eq!(config.vocabulary_path, Some(dir.path().join("vocab.toml")));
    }
}
