use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::VocabularyError;

// ── Built-in tables ───────────────────────────────────────────────────────────

const STOPWORDS: &[&str] = &[
    "subtotal", "total", "tax", "vat", "change", "cash", "cashier", "operator", "clerk", "till",
    "merchant", "store", "branch", "receipt", "invoice", "order", "sale", "refund", "qty", "item",
    "card", "visa", "mastercard", "debit", "credit", "auth", "approval", "terminal", "ref", "pos",
    "date", "time", "no", "#", "phone", "tel", "fax", "www", "com", "net", "org", "po", "box",
    "dubai", "uae", "street", "st", "road", "rd", "avenue", "ave", "blvd", "mall", "floor",
];

const UNITS: &[&str] = &[
    "kg", "g", "mg", "l", "ml", "oz", "lb", "lbs", "doz", "pkt", "pc", "pcs", "each", "ea",
];

/// Canonical names are singular so that a name re-fed through the line filter
/// survives singularization unchanged.
const INGREDIENTS: &[&str] = &[
    "apple", "banana", "orange", "lemon", "lime", "tomato", "potato", "onion", "garlic", "ginger",
    "carrot", "broccoli", "spinach", "lettuce", "cucumber", "mushroom", "pepper", "chili",
    "chicken", "beef", "pork", "fish", "salmon", "tuna", "egg", "milk", "butter", "yogurt",
    "cheese", "cream", "flour", "sugar", "salt", "olive oil", "vegetable oil", "canola oil",
    "rice", "pasta", "noodle", "bread", "oat", "honey", "vinegar", "soy sauce", "baking powder",
    "baking soda", "cocoa powder", "cornstarch", "yeast", "vanilla", "cinnamon", "paprika", "cumin",
    "turmeric", "basil", "parsley", "cilantro", "thyme", "rosemary", "oregano", "chickpea", "bean",
    "lentil", "tomato paste", "tomato sauce", "pea", "corn", "bell pepper", "red onion",
];

const METADATA_PATTERNS: &[&str] = &[
    r"(?i)\b(trn|tax|vat|invoice|order|cashier|operator|clerk|terminal|auth|approval)\b",
    r"(www\.|\.com|\.net|\.org|@)",
    r"(?i)\b(tel|phone|fax)\b",
    r"(?i)\b(st|rd|ave|blvd|street|road|avenue|mall|floor|po box)\b",
];

// ── Vocabulary ────────────────────────────────────────────────────────────────

/// Domain knowledge for receipt filtering: stopwords, unit tokens, known
/// ingredient names and metadata patterns. Immutable once built.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    stopwords: BTreeSet<String>,
    units: BTreeSet<String>,
    single_words: BTreeSet<String>,
    phrases: BTreeSet<String>,
    metadata_patterns: Vec<Regex>,
}

/// On-disk shape of a substitute vocabulary.
#[derive(Debug, Deserialize)]
struct VocabularyFile {
    #[serde(default)]
    stopwords: Vec<String>,
    #[serde(default)]
    units: Vec<String>,
    ingredients: Vec<String>,
    #[serde(default)]
    metadata_patterns: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary. Entries are lowercased and trimmed; ingredient names
    /// containing a space go to the multi-word set.
    pub fn new<S: AsRef<str>>(
        stopwords: &[S],
        units: &[S],
        ingredients: &[S],
        metadata_patterns: &[S],
    ) -> Result<Self, VocabularyError> {
        let (phrases, single_words): (BTreeSet<String>, BTreeSet<String>) =
            normalize_entries(ingredients)
                .into_iter()
                .partition(|name| name.contains(' '));
        if phrases.is_empty() && single_words.is_empty() {
            return Err(VocabularyError::NoIngredients);
        }

        let metadata_patterns = metadata_patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|source| VocabularyError::Pattern {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            stopwords: normalize_entries(stopwords),
            units: normalize_entries(units),
            single_words,
            phrases,
            metadata_patterns,
        })
    }

    /// The grocery vocabulary shipped with the crate.
    pub fn builtin() -> Self {
        static BUILTIN: OnceLock<Vocabulary> = OnceLock::new();
        BUILTIN
            .get_or_init(|| {
                Self::new(STOPWORDS, UNITS, INGREDIENTS, METADATA_PATTERNS)
                    .expect("invalid builtin vocabulary")
            })
            .clone()
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, VocabularyError> {
        let file: VocabularyFile = toml::from_str(toml_content)?;
        Self::new(
            &file.stopwords,
            &file.units,
            &file.ingredients,
            &file.metadata_patterns,
        )
    }

    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let content = std::fs::read_to_string(path)?;
        let vocab = Self::from_toml(&content)?;
        tracing::info!(
            "Loaded vocabulary from {}: {} ingredients, {} stopwords",
            path.display(),
            vocab.ingredient_count(),
            vocab.stopwords.len()
        );
        Ok(vocab)
    }

    // ── Lookups ───────────────────────────────────────────────────────────────

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Whether any stopword occurs anywhere in `line`, including inside a
    /// longer word.
    pub fn contains_stopword(&self, line: &str) -> bool {
        self.stopwords.iter().any(|sw| line.contains(sw.as_str()))
    }

    pub fn is_unit(&self, token: &str) -> bool {
        self.units.contains(token)
    }

    pub fn matches_metadata(&self, line: &str) -> bool {
        self.metadata_patterns.iter().any(|p| p.is_match(line))
    }

    pub fn is_single_word(&self, token: &str) -> bool {
        self.single_words.contains(token)
    }

    pub fn is_phrase(&self, joined: &str) -> bool {
        self.phrases.contains(joined)
    }

    /// The stored single-word ingredient equal to `token`, if any.
    pub fn single_word(&self, token: &str) -> Option<&str> {
        self.single_words.get(token).map(String::as_str)
    }

    /// The stored multi-word ingredient equal to `joined`, if any.
    pub fn phrase(&self, joined: &str) -> Option<&str> {
        self.phrases.get(joined).map(String::as_str)
    }

    /// Whether `name` is a literal member of either ingredient set.
    pub fn is_known(&self, name: &str) -> bool {
        self.is_single_word(name) || self.is_phrase(name)
    }

    /// Single-word ingredient names, in sorted order.
    pub fn single_words(&self) -> impl Iterator<Item = &str> {
        self.single_words.iter().map(String::as_str)
    }

    /// Multi-word ingredient phrases, in sorted order.
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.phrases.iter().map(String::as_str)
    }

    pub fn ingredient_count(&self) -> usize {
        self.single_words.len() + self.phrases.len()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn normalize_entries<S: AsRef<str>>(entries: &[S]) -> BTreeSet<String> {
    entries
        .iter()
        .map(|e| e.as_ref().trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_splits_single_and_multi_word() {
        let v = Vocabulary::builtin();
        assert!(v.is_single_word("tomato"));
        assert!(!v.is_single_word("bell pepper"));
        assert!(v.is_phrase("bell pepper"));
        assert!(v.phrases().all(|p| p.contains(' ')));
        assert!(v.single_words().all(|w| !w.contains(' ')));
    }

    #[test]
    fn set_lookups_return_stored_names() {
        let v = Vocabulary::builtin();
        assert_eq!(v.single_word("tomato"), Some("tomato"));
        assert_eq!(v.single_word("bell pepper"), None);
        assert_eq!(v.phrase("bell pepper"), Some("bell pepper"));
        assert_eq!(v.phrase("tomato"), None);
    }

    #[test]
    fn stopword_substring_detection() {
        let v = Vocabulary::builtin();
        assert!(v.contains_stopword("subtotal"));
        // "st" hides inside "yeast".
        assert!(v.contains_stopword("dry yeast"));
        assert!(!v.contains_stopword("milk"));
    }

    #[test]
    fn metadata_patterns_match_anywhere() {
        let v = Vocabulary::builtin();
        assert!(v.matches_metadata("TRN 100234"));
        assert!(v.matches_metadata("visit www.shop.example"));
        assert!(v.matches_metadata("info@shop"));
        assert!(v.matches_metadata("12 Main Rd"));
        assert!(!v.matches_metadata("green apple"));
    }

    #[test]
    fn units_are_recognized() {
        let v = Vocabulary::builtin();
        assert!(v.is_unit("kg"));
        assert!(v.is_unit("pcs"));
        assert!(!v.is_unit("milk"));
    }

    #[test]
    fn from_toml_builds_substitute_vocabulary() {
        let toml = r#"
            stopwords = ["total"]
            units = ["kg"]
            ingredients = ["Mango", "passion fruit"]
            metadata_patterns = ['(?i)\bmember\b']
        "#;
        let v = Vocabulary::from_toml(toml).unwrap();
        assert!(v.is_single_word("mango"));
        assert!(v.is_phrase("passion fruit"));
        assert!(v.matches_metadata("MEMBER 123"));
        assert!(!v.is_known("tomato"));
        assert_eq!(v.ingredient_count(), 2);
    }

    #[test]
    fn from_toml_rejects_bad_pattern() {
        let toml = r#"
            ingredients = ["mango"]
            metadata_patterns = ["("]
        "#;
        assert!(matches!(
            Vocabulary::from_toml(toml),
            Err(VocabularyError::Pattern { .. })
        ));
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            Vocabulary::new(&empty, &empty, &empty, &empty),
            Err(VocabularyError::NoIngredients)
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.toml");
        std::fs::write(&path, "ingredients = [\"kale\"]\n").unwrap();
        let v = Vocabulary::load(&path).unwrap();
        assert!(v.is_single_word("kale"));
    }
}
