use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use larder_core::{RecognitionConfig, TwoTier};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::preprocess::NormalizedImage;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available, build with the `tesseract` feature")]
    NotAvailable,
    #[error("OCR engine returned no text")]
    EmptyOutput,
}

/// Engine settings for one recognition call. The default value means
/// "engine defaults, no language hint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizeOptions {
    pub language: Option<String>,
    pub page_seg_mode: Option<u32>,
    pub preserve_interword_spaces: bool,
}

impl RecognizeOptions {
    /// Same language, every other setting back to the engine default.
    pub fn reduced(&self) -> Self {
        Self { language: self.language.clone(), ..Self::default() }
    }
}

impl From<&RecognitionConfig> for RecognizeOptions {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            language: config.language.clone(),
            page_seg_mode: config.page_seg_mode,
            preserve_interword_spaces: config.preserve_interword_spaces,
        }
    }
}

/// Abstraction over an OCR backend.
/// Implementations accept raw PNG/JPEG image bytes and return the recognized text.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8], options: &RecognizeOptions) -> Result<String, OcrError>;

    /// Whether `language` can be requested. Backends without language data
    /// accept everything.
    fn supports_language(&self, _language: &str) -> Result<bool, OcrError> {
        Ok(true)
    }
}

// ── Recognizer with retry / degrade ──────────────────────────────────────────

/// Runs a backend with the configured options, retries once with reduced
/// options, and yields empty text when both attempts fail.
pub struct TextRecognizer<B: OcrBackend> {
    backend: B,
    options: RecognizeOptions,
}

impl<B: OcrBackend> TextRecognizer<B> {
    pub fn new(backend: B, config: &RecognitionConfig) -> Self {
        Self::with_options(backend, RecognizeOptions::from(config))
    }

    pub fn with_options(backend: B, options: RecognizeOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Configured options with the language dropped if the engine lacks it.
    pub fn effective_options(&self) -> RecognizeOptions {
        let mut options = self.options.clone();
        if let Some(lang) = options.language.as_deref() {
            match self.backend.supports_language(lang) {
                Ok(true) => {}
                Ok(false) => {
                    info!(language = lang, "OCR language not installed, using engine default");
                    options.language = None;
                }
                Err(e) => {
                    info!(language = lang, "Could not list OCR languages ({e}), using engine default");
                    options.language = None;
                }
            }
        }
        options
    }

    /// Never fails: total recognition failure is logged and yields "".
    pub fn recognize(&self, image: &NormalizedImage) -> String {
        match image.to_png() {
            Ok(png) => self.recognize_bytes(&png),
            Err(e) => {
                error!("OCR input could not be encoded: {e}");
                String::new()
            }
        }
    }

    pub fn recognize_bytes(&self, image_bytes: &[u8]) -> String {
        let primary = self.effective_options();
        let reduced = primary.reduced();
        let attempts = TwoTier::new(
            |bytes: &[u8]| self.backend.recognize(bytes, &primary),
            |bytes: &[u8], e: &OcrError| {
                warn!("OCR failed with configured options ({e}), retrying with defaults");
                self.backend.recognize(bytes, &reduced)
            },
        );
        match attempts.run(image_bytes) {
            Ok(resolved) => resolved.value,
            Err(e) => {
                error!("OCR failed: {e}");
                String::new()
            }
        }
    }

    /// One attempt with engine defaults and no language hint. Errors are
    /// returned so the caller decides how to degrade.
    pub fn recognize_plain(&self, image: &NormalizedImage) -> Result<String, OcrError> {
        let png = image
            .to_png()
            .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
        self.backend.recognize(&png, &RecognizeOptions::default())
    }
}

// ── Fallback backend ─────────────────────────────────────────────────────────

/// Tries `primary`; when it errors or returns only whitespace, asks `secondary`.
pub struct FallbackBackend<P, S> {
    primary: P,
    secondary: S,
}

impl<P: OcrBackend, S: OcrBackend> FallbackBackend<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P: OcrBackend, S: OcrBackend> OcrBackend for FallbackBackend<P, S> {
    fn recognize(&self, image_bytes: &[u8], options: &RecognizeOptions) -> Result<String, OcrError> {
        let backends = TwoTier::new(
            |bytes: &[u8]| {
                let text = self.primary.recognize(bytes, options)?;
                if text.trim().is_empty() {
                    return Err(OcrError::EmptyOutput);
                }
                Ok(text)
            },
            |bytes: &[u8], e: &OcrError| {
                warn!("Primary OCR backend unusable ({e}), trying secondary");
                self.secondary.recognize(bytes, options)
            },
        );
        backends
            .run(image_bytes)
            .map(|resolved| resolved.value)
            .map_err(|e| OcrError::Engine(e.to_string()))
    }

    fn supports_language(&self, language: &str) -> Result<bool, OcrError> {
        match self.primary.supports_language(language) {
            Ok(true) => Ok(true),
            _ => self.secondary.supports_language(language),
        }
    }
}

// ── Mock backends (always available, used for tests) ─────────────────────────

/// Returns a pre-set string. Useful for unit testing the extraction pipeline
/// without requiring Tesseract to be installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8], _options: &RecognizeOptions) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

/// Replays queued outcomes in order and records the options of every call.
/// Once the queue is drained every call fails.
#[derive(Default)]
pub struct ScriptedRecognizer {
    outcomes: Mutex<VecDeque<Result<String, OcrError>>>,
    calls: Mutex<Vec<RecognizeOptions>>,
    languages: Option<Vec<String>>,
}

impl ScriptedRecognizer {
    pub fn new(outcomes: impl IntoIterator<Item = Result<String, OcrError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Restrict `supports_language` to the given set.
    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.languages = Some(languages.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn calls(&self) -> Vec<RecognizeOptions> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl OcrBackend for ScriptedRecognizer {
    fn recognize(&self, _image_bytes: &[u8], options: &RecognizeOptions) -> Result<String, OcrError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(options.clone());
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(OcrError::Engine("script exhausted".into())))
    }

    fn supports_language(&self, language: &str) -> Result<bool, OcrError> {
        Ok(self
            .languages
            .as_ref()
            .map_or(true, |langs| langs.iter().any(|l| l == language)))
    }
}

/// Stand-in when no OCR engine is compiled in. Every call fails.
pub struct UnavailableRecognizer;

impl OcrBackend for UnavailableRecognizer {
    fn recognize(&self, _image_bytes: &[u8], _options: &RecognizeOptions) -> Result<String, OcrError> {
        Err(OcrError::NotAvailable)
    }

    fn supports_language(&self, _language: &str) -> Result<bool, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError, RecognizeOptions};
    use leptess::{LepTess, Variable};
    use std::path::PathBuf;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>) -> Self {
            Self { data_path }
        }

        /// Where `<lang>.traineddata` files live, if it can be determined.
        fn tessdata_dir(&self) -> Option<PathBuf> {
            if let Some(dir) = &self.data_path {
                return Some(PathBuf::from(dir));
            }
            let prefix = PathBuf::from(std::env::var_os("TESSDATA_PREFIX")?);
            let nested = prefix.join("tessdata");
            Some(if nested.is_dir() { nested } else { prefix })
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8], options: &RecognizeOptions) -> Result<String, OcrError> {
            let lang = options.language.as_deref().unwrap_or("");
            let mut lt = LepTess::new(self.data_path.as_deref(), lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            if let Some(psm) = options.page_seg_mode {
                lt.set_variable(Variable::TesseditPagesegMode, &psm.to_string())
                    .map_err(|e| OcrError::Engine(e.to_string()))?;
            }
            if options.preserve_interword_spaces {
                lt.set_variable(Variable::PreserveInterwordSpaces, "1")
                    .map_err(|e| OcrError::Engine(e.to_string()))?;
            }
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }

        fn supports_language(&self, language: &str) -> Result<bool, OcrError> {
            match self.tessdata_dir() {
                Some(dir) => Ok(dir.join(format!("{language}.traineddata")).is_file()),
                // Unknown data location: ask the engine directly.
                None => Ok(LepTess::new(None, language).is_ok()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    fn blank_image() -> NormalizedImage {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([255])));
        crate::preprocess::ImageNormalizer::default().normalize(img.into())
    }

    fn primary_options() -> RecognizeOptions {
        RecognizeOptions::from(&RecognitionConfig::default())
    }

    #[test]
    fn mock_returns_preset_text() {
        let r = MockRecognizer::new("WHOLE FOODS\nMILK 3.99\nVISA");
        let opts = RecognizeOptions::default();
        assert_eq!(r.recognize(b"fake image data", &opts).unwrap(), "WHOLE FOODS\nMILK 3.99\nVISA");
        assert_eq!(r.recognize(b"", &opts).unwrap(), "WHOLE FOODS\nMILK 3.99\nVISA");
    }

    #[test]
    fn reduced_options_keep_only_language() {
        let reduced = primary_options().reduced();
        assert_eq!(reduced.language.as_deref(), Some("eng"));
        assert_eq!(reduced.page_seg_mode, None);
        assert!(!reduced.preserve_interword_spaces);
    }

    #[test]
    fn first_attempt_success_is_returned() {
        let backend = ScriptedRecognizer::new([Ok("MILK".to_string())]);
        let r = TextRecognizer::with_options(backend, primary_options());
        assert_eq!(r.recognize(&blank_image()), "MILK");
        let calls = r.backend().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].page_seg_mode, Some(6));
        assert!(calls[0].preserve_interword_spaces);
    }

    #[test]
    fn failed_attempt_retries_with_reduced_options() {
        let backend = ScriptedRecognizer::new([
            Err(OcrError::Engine("bad psm".into())),
            Ok("EGGS".to_string()),
        ]);
        let r = TextRecognizer::with_options(backend, primary_options());
        assert_eq!(r.recognize(&blank_image()), "EGGS");
        let calls = r.backend().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], primary_options().reduced());
    }

    #[test]
    fn both_attempts_failing_yields_empty_text() {
        let backend = ScriptedRecognizer::new([
            Err(OcrError::Engine("one".into())),
            Err(OcrError::Engine("two".into())),
        ]);
        let r = TextRecognizer::with_options(backend, primary_options());
        assert_eq!(r.recognize(&blank_image()), "");
        assert_eq!(r.backend().calls().len(), 2);
    }

    #[test]
    fn empty_text_is_a_successful_attempt() {
        let backend = ScriptedRecognizer::new([Ok(String::new())]);
        let r = TextRecognizer::with_options(backend, primary_options());
        assert_eq!(r.recognize(&blank_image()), "");
        assert_eq!(r.backend().calls().len(), 1);
    }

    #[test]
    fn missing_language_is_dropped() {
        let backend = ScriptedRecognizer::new([Ok("x".to_string())]).with_languages(&["deu"]);
        let r = TextRecognizer::with_options(backend, primary_options());
        r.recognize(&blank_image());
        assert_eq!(r.backend().calls()[0].language, None);
        assert_eq!(r.backend().calls()[0].page_seg_mode, Some(6));
    }

    #[test]
    fn installed_language_is_kept() {
        let backend = ScriptedRecognizer::new([Ok("x".to_string())]).with_languages(&["eng"]);
        let r = TextRecognizer::with_options(backend, primary_options());
        r.recognize(&blank_image());
        assert_eq!(r.backend().calls()[0].language.as_deref(), Some("eng"));
    }

    #[test]
    fn plain_recognition_uses_engine_defaults() {
        let backend = ScriptedRecognizer::new([Ok("x".to_string())]);
        let r = TextRecognizer::with_options(backend, primary_options());
        assert_eq!(r.recognize_plain(&blank_image()).unwrap(), "x");
        assert_eq!(r.backend().calls()[0], RecognizeOptions::default());
    }

    #[test]
    fn unavailable_engine_degrades_to_empty() {
        let r = TextRecognizer::new(UnavailableRecognizer, &RecognitionConfig::default());
        assert_eq!(r.recognize(&blank_image()), "");
        assert!(matches!(r.recognize_plain(&blank_image()), Err(OcrError::NotAvailable)));
    }

    #[test]
    fn fallback_backend_used_when_primary_errors() {
        let backend = FallbackBackend::new(UnavailableRecognizer, MockRecognizer::new("BUTTER"));
        let text = backend.recognize(b"img", &RecognizeOptions::default()).unwrap();
        assert_eq!(text, "BUTTER");
    }

    #[test]
    fn fallback_backend_used_when_primary_is_blank() {
        let backend = FallbackBackend::new(MockRecognizer::new("  \n "), MockRecognizer::new("RICE"));
        let text = backend.recognize(b"img", &RecognizeOptions::default()).unwrap();
        assert_eq!(text, "RICE");
    }

    #[test]
    fn fallback_backend_prefers_primary() {
        let backend = FallbackBackend::new(MockRecognizer::new("FLOUR"), UnavailableRecognizer);
        let text = backend.recognize(b"img", &RecognizeOptions::default()).unwrap();
        assert_eq!(text, "FLOUR");
        assert!(backend.supports_language("eng").unwrap());
    }

    #[test]
    fn fallback_backend_reports_both_failures() {
        let backend = FallbackBackend::new(UnavailableRecognizer, UnavailableRecognizer);
        let err = backend.recognize(b"img", &RecognizeOptions::default()).unwrap_err();
        assert!(err.to_string().contains("primary failed"));
    }
}
