pub mod hash;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use hash::{sha256_bytes, source_digest, to_hex};
pub use pipeline::IngredientExtractor;
pub use preprocess::{ImageNormalizer, NormalizedImage, PreprocessError, RawImage};
pub use recognizer::{
    FallbackBackend, MockRecognizer, OcrBackend, OcrError, RecognizeOptions, ScriptedRecognizer,
    TextRecognizer, UnavailableRecognizer,
};
pub use types::{ExtractionPass, ExtractionResult};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
