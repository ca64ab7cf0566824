//! Synonym classification.
//!
//! Tokenizes both inputs, embeds each with a separate model call, scores the
//! pair with zero-padded cosine similarity and compares against a tolerance.
//! Every failure is returned as an error, never as a `false` verdict.

use std::sync::Arc;
use std::time::Duration;

use crate::assets::{self, AssetError};
use crate::config::Config;
use crate::semantic::embeddings::{
    EmbeddingError, EmbeddingModel, EmbeddingVector, OnnxEmbeddingModel, OnnxOptions,
    TimeoutModel,
};
use crate::semantic::similarity::{cosine_similarity, SimilarityError};
use crate::semantic::tokenizer::{TokenizeError, Tokenizer};
use crate::semantic::vocab::{VocabError, VocabularyIndex};

/// Errors that can occur while classifying a pair.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Input text is empty")]
    EmptyInput,

    #[error("Tolerance must be a finite number, got {0}")]
    InvalidTolerance(f32),

    #[error("Cannot tokenize {text:?}: {source}")]
    Tokenize {
        text: String,
        #[source]
        source: TokenizeError,
    },

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Similarity error: {0}")]
    Similarity(#[from] SimilarityError),

    #[error("Vocabulary error: {0}")]
    Vocab(#[from] VocabError),

    #[error("Asset error: {0}")]
    Assets(#[from] AssetError),
}

/// Model type assembled from configuration.
pub type ConfiguredModel = TimeoutModel<OnnxEmbeddingModel>;

/// Decides whether two strings are synonyms.
pub struct SynonymClassifier<M> {
    tokenizer: Tokenizer,
    model: M,
}

impl<M: EmbeddingModel> SynonymClassifier<M> {
    pub fn new(vocab: Arc<VocabularyIndex>, model: M) -> Self {
        Self {
            tokenizer: Tokenizer::new(vocab),
            model,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<EmbeddingVector, ClassifyError> {
        let ids = self
            .tokenizer
            .encode(text)
            .map_err(|source| ClassifyError::Tokenize {
                text: text.to_string(),
                source,
            })?;
        log::debug!("tokenized {text:?} into {} ids", ids.len());

        Ok(self.model.infer(&ids)?)
    }

    fn try_score(&self, a: &str, b: &str) -> Result<f32, ClassifyError> {
        // reject both inputs before spending an inference call
        if a.is_empty() || b.is_empty() {
            return Err(ClassifyError::EmptyInput);
        }

        let embedding_a = self.embed(a)?;
        let embedding_b = self.embed(b)?;
        Ok(cosine_similarity(&embedding_a, &embedding_b)?)
    }

    /// Similarity score of two strings. Failures are logged with both inputs.
    pub fn score(&self, a: &str, b: &str) -> Result<f32, ClassifyError> {
        self.try_score(a, b).inspect_err(|e| {
            log::warn!("similarity of {a:?} and {b:?} could not be computed: {e}");
        })
    }

    /// Returns `true` iff the similarity of `a` and `b` is at least
    /// `tolerance`. With `debug` set the score is logged.
    pub fn check(
        &self,
        a: &str,
        b: &str,
        tolerance: f32,
        debug: bool,
    ) -> Result<bool, ClassifyError> {
        let span = tracing::debug_span!("synonym_check", a, b, tolerance);
        let _enter = span.enter();

        // NaN compares false against every score
        if !tolerance.is_finite() {
            log::warn!("synonym check of {a:?} and {b:?} given tolerance {tolerance}");
            return Err(ClassifyError::InvalidTolerance(tolerance));
        }

        let score = self.score(a, b)?;

        if debug {
            log::info!("cosine similarity between {a:?} and {b:?}: {score}");
        }

        Ok(score >= tolerance)
    }
}

impl SynonymClassifier<ConfiguredModel> {
    /// Build a classifier from configuration: check assets, load the
    /// vocabulary and the ONNX model, and apply the inference timeout.
    pub fn from_config(config: &Config) -> Result<Self, ClassifyError> {
        let paths = assets::check(config)?;

        let vocab = VocabularyIndex::load(&paths.vocab)?;
        if vocab.unk_id().is_none() {
            log::warn!(
                "vocabulary {} has no [UNK] token, unknown characters will fail",
                paths.vocab.display()
            );
        }

        let options = OnnxOptions {
            hidden_dim: config.hidden_dim,
            pooling: config.pooling,
            intra_threads: config.intra_threads,
        };
        let model = OnnxEmbeddingModel::load(&paths.model, options)?;
        let model = TimeoutModel::new(model, Duration::from_secs(config.inference_timeout_secs));

        Ok(Self::new(Arc::new(vocab), model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::stub::StubModel;

    fn classifier(model: StubModel) -> SynonymClassifier<StubModel> {
        let vocab = VocabularyIndex::from_tokens(["小", "溪", "流", "[UNK]"]);
        SynonymClassifier::new(Arc::new(vocab), model)
    }

    fn scenario_model() -> StubModel {
        StubModel::new()
            .with(&[0, 1], vec![1.0, 0.0])
            .with(&[1, 2], vec![0.9, 0.436])
    }

    #[test]
    fn test_scenario_synonyms() {
        let classifier = classifier(scenario_model());

        let score = classifier.score("小溪", "溪流").unwrap();
        assert!((score - 0.9).abs() < 1e-3, "score was {score}");
        assert!(classifier.check("小溪", "溪流", 0.7, true).unwrap());
        assert!(!classifier.check("小溪", "溪流", 0.95, false).unwrap());
    }

    #[test]
    fn test_threshold_boundary() {
        let classifier = classifier(scenario_model());
        let score = classifier.score("小溪", "溪流").unwrap();
        let just_above = f32::from_bits(score.to_bits() + 1);

        assert!(classifier.check("小溪", "溪流", score, false).unwrap());
        assert!(!classifier.check("小溪", "溪流", just_above, false).unwrap());
    }

    #[test]
    fn test_non_finite_tolerance_is_error() {
        let classifier = classifier(scenario_model());

        for tolerance in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let result = classifier.check("小溪", "溪流", tolerance, false);
            assert!(
                matches!(result, Err(ClassifyError::InvalidTolerance(_))),
                "tolerance {tolerance} gave {result:?}"
            );
        }
        assert_eq!(classifier.model().calls(), 0);
    }

    #[test]
    fn test_score_failure_is_error() {
        let classifier = classifier(StubModel::new().with(&[0, 1], vec![1.0, 0.0]));
        assert!(matches!(
            classifier.score("小溪", "溪流"),
            Err(ClassifyError::Embedding(_))
        ));
    }

    #[test]
    fn test_two_separate_model_calls() {
        let classifier = classifier(scenario_model());
        classifier.check("小溪", "溪流", 0.7, false).unwrap();
        assert_eq!(classifier.model().calls(), 2);
    }

    #[test]
    fn test_empty_input_rejected_without_inference() {
        let classifier = classifier(scenario_model());

        assert!(matches!(
            classifier.check("", "溪流", 0.7, false),
            Err(ClassifyError::EmptyInput)
        ));
        assert!(matches!(
            classifier.check("小溪", "", 0.7, false),
            Err(ClassifyError::EmptyInput)
        ));
        assert_eq!(classifier.model().calls(), 0);
    }

    #[test]
    fn test_tokenization_failure_is_error() {
        let vocab = VocabularyIndex::from_tokens(["小", "溪", "流"]);
        let classifier = SynonymClassifier::new(Arc::new(vocab), scenario_model());

        let result = classifier.check("小河", "溪流", 0.7, false);
        assert!(matches!(
            result,
            Err(ClassifyError::Tokenize { ref text, .. }) if text == "小河"
        ));
    }

    #[test]
    fn test_inference_failure_is_error() {
        let model = StubModel::new().with(&[0, 1], vec![1.0, 0.0]);
        let classifier = classifier(model);

        let result = classifier.check("小溪", "溪流", 0.7, false);
        assert!(matches!(result, Err(ClassifyError::Embedding(_))));
    }

    #[test]
    fn test_degenerate_embedding_is_error() {
        let model = StubModel::new()
            .with(&[0, 1], vec![1.0, 0.0])
            .with(&[1, 2], vec![0.0, 0.0]);
        let classifier = classifier(model);

        let result = classifier.check("小溪", "溪流", -1.0, false);
        assert!(matches!(
            result,
            Err(ClassifyError::Similarity(SimilarityError::DegenerateVector))
        ));
    }

    #[test]
    fn test_unk_characters_still_classify() {
        let model = StubModel::new()
            .with(&[0, 3], vec![1.0, 0.0])
            .with(&[3, 2], vec![1.0, 0.0]);
        let classifier = classifier(model);

        assert!(classifier.check("小河", "河流", 0.7, false).unwrap());
    }

    #[test]
    fn test_from_config_reports_missing_assets() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(dir.path()).unwrap();

        let result = SynonymClassifier::<ConfiguredModel>::from_config(&config);
        assert!(matches!(result, Err(ClassifyError::Assets(_))));
    }
}
