use serde::{Deserialize, Serialize};

/// Which stage produced an extraction's ingredient list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPass {
    /// Vocabulary-matched names from the strict line filter.
    Strict,
    /// Best-effort candidates from the loose second pass.
    Loose,
    /// The image could not be read or decoded.
    Unreadable,
}

impl std::fmt::Display for ExtractionPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionPass::Strict => write!(f, "strict"),
            ExtractionPass::Loose => write!(f, "loose"),
            ExtractionPass::Unreadable => write!(f, "unreadable"),
        }
    }
}

/// Outcome of one extraction call. Always well-formed, even for garbage input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Text as returned by the recognizer, for audit and debugging.
    pub raw_text: String,
    /// Sorted, unique ingredient names.
    pub ingredients: Vec<String>,
    pub pass: ExtractionPass,
    /// SHA-256 hex digest of the source bytes, when they could be read.
    pub source_digest: Option<String>,
}

impl ExtractionResult {
    pub fn unreadable(source_digest: Option<String>) -> Self {
        Self {
            raw_text: String::new(),
            ingredients: vec![],
            pass: ExtractionPass::Unreadable,
            source_digest,
        }
    }

    /// `(raw_text, ingredients)`.
    pub fn into_parts(self) -> (String, Vec<String>) {
        (self.raw_text, self.ingredients)
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }
}
