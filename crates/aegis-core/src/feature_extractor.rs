//! Feature Extractor (C2): turns a [`PipelineError`] into a dense feature
//! vector for the ML Classifier (C3). Grounded on the teacher's
//! row-by-row, explicit-field style (`ci_diagnostics::parse_stage_diagnostics`
//! builds up a `Vec<Diagnostic>` field by field rather than through a
//! dataframe) — generalized here into an explicit row-by-row extractor
//! writing into a dense `ndarray::Array1<f64>`, per the design note that a
//! pandas-shaped extractor must be replaced by one with a column count fixed
//! at load time.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::domain::PipelineError;

/// The 20 recognized error-pattern families used for the one-hot block
/// (feature group iv). Order is significant: it fixes column offsets.
pub const ERROR_PATTERN_FAMILIES: [&str; 20] = [
    "module_not_found",
    "import_error",
    "permission_denied",
    "connection_refused",
    "timeout",
    "dns_failure",
    "ssl_error",
    "out_of_memory",
    "disk_full",
    "compilation_error",
    "undefined_reference",
    "assertion_failure",
    "test_timeout",
    "deployment_failed",
    "image_pull_error",
    "crash_loop",
    "vulnerability_found",
    "syntax_error",
    "type_error",
    "null_reference",
];

const TRIGRAM_VOCAB_SIZE: usize = 256;

/// A bounded bag-of-trigrams vocabulary fitted once against a training
/// corpus and applied identically at inference (§4.2 group i).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    /// trigram -> column index, capped at [`TRIGRAM_VOCAB_SIZE`] entries.
    index: std::collections::BTreeMap<String, usize>,
}

fn trigrams(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    if chars.len() < 3 {
        return Vec::new();
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

impl Vocabulary {
    /// Fits a vocabulary from a training corpus, keeping the
    /// [`TRIGRAM_VOCAB_SIZE`] most frequent trigrams by count (ties broken
    /// lexicographically for determinism).
    pub fn fit<'a>(messages: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
        for message in messages {
            for trigram in trigrams(message) {
                *counts.entry(trigram).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let index = ranked
            .into_iter()
            .take(TRIGRAM_VOCAB_SIZE)
            .enumerate()
            .map(|(i, (trigram, _))| (trigram, i))
            .collect();
        Self { index }
    }

    pub fn len(&self) -> usize {
        self.index.len().max(TRIGRAM_VOCAB_SIZE)
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn transform_into(&self, text: &str, out: &mut [f64]) {
        for trigram in trigrams(text) {
            if let Some(&col) = self.index.get(&trigram) {
                out[col] += 1.0;
            }
        }
    }
}

const STRUCTURAL_FEATURES: usize = 4;
const BOOLEAN_COUNT_FEATURES: usize = 6;
const LIBRARY_FAMILY_FEATURES: usize = 3;
const CONTEXT_FEATURES: usize = 4;

/// Extracts fixed-width feature vectors. The total column count is
/// `vocabulary.len() + STRUCTURAL + BOOLEAN_COUNT + 20 (families) +
/// LIBRARY_FAMILY + CONTEXT`, fixed the moment a `FeatureExtractor` is
/// constructed and identical for every call against it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureExtractor {
    vocabulary: Vocabulary,
}

impl FeatureExtractor {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn feature_count(&self) -> usize {
        self.vocabulary.len()
            + STRUCTURAL_FEATURES
            + BOOLEAN_COUNT_FEATURES
            + ERROR_PATTERN_FAMILIES.len()
            + LIBRARY_FAMILY_FEATURES
            + CONTEXT_FEATURES
    }

    /// Extracts the dense feature vector for one error. Fields absent from
    /// `error.context` contribute a zero for their component (§4.2 "Behavior
    /// on missing fields").
    pub fn extract(&self, error: &PipelineError) -> Array1<f64> {
        let n = self.feature_count();
        let mut row = vec![0.0; n];
        let mut offset = 0;

        // (i) bag-of-trigrams
        self.vocabulary.transform_into(&error.message, &mut row[offset..offset + self.vocabulary.len()]);
        offset += self.vocabulary.len();

        // (ii) structural features
        let lines: Vec<&str> = error.message.lines().collect();
        let line_count = lines.len().max(1);
        let lengths: Vec<usize> = lines.iter().map(|l| l.len()).collect();
        let mean_len = lengths.iter().sum::<usize>() as f64 / line_count as f64;
        let max_len = lengths.iter().copied().max().unwrap_or(0) as f64;
        row[offset] = error.message.len() as f64;
        row[offset + 1] = line_count as f64;
        row[offset + 2] = mean_len;
        row[offset + 3] = max_len;
        offset += STRUCTURAL_FEATURES;

        // (iii) boolean/count features
        let lower = error.message.to_lowercase();
        let error_words = ["error", "warning", "exception", "failed"];
        let error_word_count: f64 = error_words.iter().map(|w| lower.matches(w).count() as f64).sum();
        row[offset] = if lower.contains("error") { 1.0 } else { 0.0 };
        row[offset + 1] = if lower.contains("warning") { 1.0 } else { 0.0 };
        row[offset + 2] = if lower.contains("exception") { 1.0 } else { 0.0 };
        row[offset + 3] = if lower.contains("failed") { 1.0 } else { 0.0 };
        row[offset + 4] = error_word_count;
        row[offset + 5] = if error.stack_trace.is_some() { 1.0 } else { 0.0 };
        offset += BOOLEAN_COUNT_FEATURES;

        // (iv) one-hot recognized error-pattern families
        for (i, family) in ERROR_PATTERN_FAMILIES.iter().enumerate() {
            let keyword = family.replace('_', " ");
            if lower.contains(&keyword) || lower.contains(family) {
                row[offset + i] = 1.0;
            }
        }
        offset += ERROR_PATTERN_FAMILIES.len();

        // (v) library-family flags
        let web_markers = ["express", "django", "flask", "react", "fastapi"];
        let ds_markers = ["pandas", "numpy", "tensorflow", "pytorch", "sklearn"];
        let devops_markers = ["docker", "kubernetes", "kubectl", "terraform", "ansible"];
        row[offset] = if web_markers.iter().any(|m| lower.contains(m)) { 1.0 } else { 0.0 };
        row[offset + 1] = if ds_markers.iter().any(|m| lower.contains(m)) { 1.0 } else { 0.0 };
        row[offset + 2] = if devops_markers.iter().any(|m| lower.contains(m)) { 1.0 } else { 0.0 };
        offset += LIBRARY_FAMILY_FEATURES;

        // (vi) context features
        let has_line_number = error.context.contains_key("line_number");
        let surrounding = error
            .context
            .get("surrounding_context")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        row[offset] = if has_line_number { 1.0 } else { 0.0 };
        row[offset + 1] = surrounding.len() as f64;
        row[offset + 2] = surrounding.lines().count() as f64;
        let code_shape_re_decl = surrounding.contains("let ") || surrounding.contains("const ") || surrounding.contains("var ");
        let code_shape_assign = surrounding.contains('=') && !surrounding.contains("==");
        row[offset + 3] = if code_shape_re_decl || code_shape_assign { 1.0 } else { 0.0 };

        Array1::from_vec(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, PipelineError, Severity, Stage};
    use chrono::Utc;

    fn sample(message: &str) -> PipelineError {
        PipelineError::new("run-1", message, Severity::High, Category::Dependency, Stage::Build, Utc::now())
    }

    #[test]
    fn feature_count_is_fixed_and_matches_vector_length() {
        let vocab = Vocabulary::fit(["ModuleNotFoundError: No module named 'requests'"]);
        let extractor = FeatureExtractor::new(vocab);
        let vector = extractor.extract(&sample("ModuleNotFoundError: No module named 'flask'"));
        assert_eq!(vector.len(), extractor.feature_count());
    }

    #[test]
    fn missing_context_fields_zero_out_context_block() {
        let extractor = FeatureExtractor::new(Vocabulary::default());
        let vector = extractor.extract(&sample("plain message"));
        let n = vector.len();
        // last 4 columns are the context block; all zero when context is empty.
        assert_eq!(&vector.as_slice().unwrap()[n - 4..], &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn boolean_features_detect_keywords() {
        let extractor = FeatureExtractor::new(Vocabulary::default());
        let vector = extractor.extract(&sample("Exception: something failed badly"));
        let offset = extractor.vocabulary.len() + STRUCTURAL_FEATURES;
        assert_eq!(vector[offset + 2], 1.0); // exception present
        assert_eq!(vector[offset + 3], 1.0); // failed present
    }
}
