use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use larder_core::{
    loose_candidates, Canonicalizer, ExtractorConfig, FallbackConfig, LineFilter, MatchingConfig,
    Resolved, Tier, TwoTier, Vocabulary, VocabularyError,
};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::hash;
use crate::preprocess::{ImageNormalizer, NormalizedImage, RawImage};
use crate::recognizer::{OcrBackend, OcrError, TextRecognizer};
use crate::types::{ExtractionPass, ExtractionResult};

/// Why a pass produced nothing usable; only drives the strict → loose hand-off.
#[derive(Debug, Error)]
enum PassError {
    #[error("no line matched the vocabulary")]
    NothingMatched,
    #[error(transparent)]
    Ocr(#[from] OcrError),
}

/// Orchestrates: hash → decode → normalize → OCR → strict pass → loose pass.
///
/// Holds no per-call state, so one extractor can serve many threads.
pub struct IngredientExtractor<B: OcrBackend> {
    recognizer: TextRecognizer<B>,
    normalizer: ImageNormalizer,
    vocab: Arc<Vocabulary>,
    matching: MatchingConfig,
    fallback: FallbackConfig,
}

impl<B: OcrBackend> IngredientExtractor<B> {
    /// Default config with the builtin vocabulary.
    pub fn new(backend: B) -> Self {
        Self::with_vocabulary(backend, &ExtractorConfig::default(), Vocabulary::builtin())
    }

    /// Uses `config.vocabulary_path` when set, else the builtin vocabulary.
    pub fn from_config(backend: B, config: &ExtractorConfig) -> Result<Self, VocabularyError> {
        let vocab = match &config.vocabulary_path {
            Some(path) => Vocabulary::load(path)?,
            None => Vocabulary::builtin(),
        };
        Ok(Self::with_vocabulary(backend, config, vocab))
    }

    pub fn with_vocabulary(backend: B, config: &ExtractorConfig, vocab: Vocabulary) -> Self {
        Self {
            recognizer: TextRecognizer::new(backend, &config.recognition),
            normalizer: ImageNormalizer::from(&config.preprocess),
            vocab: Arc::new(vocab),
            matching: config.matching.clone(),
            fallback: config.fallback.clone(),
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Process an image file on disk. Never fails; an unreadable file gives
    /// an empty result.
    pub fn extract(&self, path: &Path) -> ExtractionResult {
        match std::fs::read(path) {
            Ok(data) => self.extract_bytes(&data),
            Err(e) => {
                error!(path = %path.display(), "Failed to read image: {e}");
                ExtractionResult::unreadable(None)
            }
        }
    }

    /// Process raw bytes (from camera capture or file read).
    pub fn extract_bytes(&self, data: &[u8]) -> ExtractionResult {
        let digest = hash::source_digest(data);
        let raw = match RawImage::decode(data) {
            Ok(raw) => raw,
            Err(e) => {
                error!(digest = %digest, "Failed to decode image: {e}");
                return ExtractionResult::unreadable(Some(digest));
            }
        };

        let image = self.normalizer.normalize(raw);
        let raw_text = self.recognizer.recognize(&image);

        let passes = TwoTier::new(
            |text: &str| self.strict_pass(text),
            |_: &str, e: &PassError| {
                info!(digest = %digest, "Strict pass found nothing ({e}), running loose pass");
                self.loose_image_pass(&image)
            },
        );
        let (ingredients, pass) = match passes.run(raw_text.as_str()) {
            Ok(resolved) => split(resolved),
            Err(e) => {
                error!(digest = %digest, "Loose pass failed: {}", e.fallback);
                (vec![], ExtractionPass::Loose)
            }
        };
        debug!(digest = %digest, %pass, count = ingredients.len(), "Extraction finished");

        ExtractionResult { raw_text, ingredients, pass, source_digest: Some(digest) }
    }

    /// Run both passes over already-recognized text; the loose pass reuses
    /// the same text instead of re-running OCR.
    pub fn extract_text(&self, text: &str) -> ExtractionResult {
        let passes = TwoTier::new(
            |text: &str| self.strict_pass(text),
            |text: &str, _: &PassError| Ok(self.loose_text_pass(text)),
        );
        let (ingredients, pass) = match passes.run(text) {
            Ok(resolved) => split(resolved),
            Err(e) => {
                error!("Loose pass failed: {}", e.fallback);
                (vec![], ExtractionPass::Loose)
            }
        };
        ExtractionResult {
            raw_text: text.to_string(),
            ingredients,
            pass,
            source_digest: None,
        }
    }

    /// Sorted unique canonical names for every line that survives the filter
    /// and matches the vocabulary.
    pub fn canonical_names(&self, text: &str) -> Vec<String> {
        let filter = LineFilter::new(&self.vocab).with_max_words(self.matching.max_line_words);
        let canonicalizer = Canonicalizer::new(&self.vocab).with_cutoff(self.matching.fuzzy_cutoff);

        let mut found = BTreeSet::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            // A failing line is logged and skipped; it never ends the scan.
            match filter.filter(line).map(|tokens| canonicalizer.canonicalize(&tokens)) {
                Ok(Some(m)) => {
                    debug!(line, matcher = %m.matcher, score = m.score, "Matched {}", m.name);
                    found.insert(m.name);
                }
                Ok(None) => debug!(line, "No vocabulary match"),
                Err(rejection) => debug!(line, "Line rejected: {rejection}"),
            }
        }
        found.into_iter().collect()
    }

    fn strict_pass(&self, text: &str) -> Result<Vec<String>, PassError> {
        let names = self.canonical_names(text);
        if names.is_empty() {
            return Err(PassError::NothingMatched);
        }
        Ok(names)
    }

    fn loose_image_pass(&self, image: &NormalizedImage) -> Result<Vec<String>, PassError> {
        let text = self.recognizer.recognize_plain(image)?;
        Ok(self.loose_text_pass(&text))
    }

    fn loose_text_pass(&self, text: &str) -> Vec<String> {
        loose_candidates(text, &self.vocab, self.fallback.max_words)
    }
}

fn split(resolved: Resolved<Vec<String>>) -> (Vec<String>, ExtractionPass) {
    let pass = match resolved.tier {
        Tier::Primary => ExtractionPass::Strict,
        Tier::Fallback => ExtractionPass::Loose,
    };
    (resolved.value, pass)
}

// ── Async batch processing ────────────────────────────────────────────────────

impl<B: OcrBackend + 'static> IngredientExtractor<B> {
    /// Run `extract` on the blocking pool.
    pub async fn process_file(self: Arc<Self>, path: PathBuf) -> ExtractionResult {
        let shown = path.display().to_string();
        match tokio::task::spawn_blocking(move || self.extract(&path)).await {
            Ok(result) => result,
            Err(e) => {
                error!(path = %shown, "Extraction worker failed: {e}");
                ExtractionResult::unreadable(None)
            }
        }
    }

    /// Extract every path concurrently. Results keep the input order.
    pub async fn process_batch(self: Arc<Self>, paths: Vec<PathBuf>) -> Vec<(PathBuf, ExtractionResult)> {
        let tasks: Vec<_> = paths
            .into_iter()
            .map(|path| {
                let extractor = Arc::clone(&self);
                let task_path = path.clone();
                (path, tokio::task::spawn_blocking(move || extractor.extract(&task_path)))
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for (path, task) in tasks {
            let result = task.await.unwrap_or_else(|e| {
                error!(path = %path.display(), "Extraction worker failed: {e}");
                ExtractionResult::unreadable(None)
            });
            results.push((path, result));
        }
        results
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
