//! Embedding model abstraction and the ONNX Runtime backend.
//!
//! Provides:
//! - The [`EmbeddingModel`] capability consumed by the classifier
//! - [`OnnxEmbeddingModel`], running a BERT-style ONNX graph
//! - Pooling of per-token output rows into one vector
//! - [`TimeoutModel`], a deadline around any blocking `infer` call

use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use ndarray::{ArrayView2, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};

use crate::semantic::tokenizer::TokenSequence;

/// Name of the model's token id input.
pub const INPUT_NAME: &str = "input_ids";
/// Name of the model's hidden state output.
pub const OUTPUT_NAME: &str = "output";
/// Hidden dimension of bert-base models.
pub const DEFAULT_HIDDEN_DIM: usize = 768;

/// One embedding produced by the model.
pub type EmbeddingVector = Vec<f32>;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Failed to load model from {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Output shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Cannot embed an empty token sequence")]
    EmptySequence,

    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),
}

/// Capability to turn a token sequence into one embedding vector.
///
/// Implementations must be safe to share across threads. Whether concurrent
/// calls actually run in parallel is up to the implementation.
pub trait EmbeddingModel: Send + Sync {
    fn infer(&self, ids: &TokenSequence) -> Result<EmbeddingVector, EmbeddingError>;
}

impl<M: EmbeddingModel + ?Sized> EmbeddingModel for Arc<M> {
    fn infer(&self, ids: &TokenSequence) -> Result<EmbeddingVector, EmbeddingError> {
        (**self).infer(ids)
    }
}

impl<M: EmbeddingModel + ?Sized> EmbeddingModel for Box<M> {
    fn infer(&self, ids: &TokenSequence) -> Result<EmbeddingVector, EmbeddingError> {
        (**self).infer(ids)
    }
}

/// How per-token output rows are reduced to a single vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Mean over all token rows.
    #[default]
    Mean,
    /// The first token's row.
    First,
    /// All rows concatenated, row-major.
    Flatten,
}

impl Pooling {
    /// Reduce a row-major `[rows, dim]` buffer.
    pub fn apply(
        self,
        buffer: &[f32],
        rows: usize,
        dim: usize,
    ) -> Result<EmbeddingVector, EmbeddingError> {
        let view = ArrayView2::from_shape((rows, dim), buffer).map_err(|e| {
            EmbeddingError::ShapeMismatch(format!(
                "buffer of {} values is not [{rows}, {dim}]: {e}",
                buffer.len()
            ))
        })?;
        if rows == 0 {
            return Err(EmbeddingError::EmptySequence);
        }

        match self {
            Pooling::Mean => view
                .mean_axis(Axis(0))
                .map(|mean| mean.to_vec())
                .ok_or(EmbeddingError::EmptySequence),
            Pooling::First => Ok(view.row(0).to_vec()),
            Pooling::Flatten => Ok(view.iter().copied().collect()),
        }
    }
}

impl std::str::FromStr for Pooling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Pooling::Mean),
            "first" | "cls" => Ok(Pooling::First),
            "flatten" => Ok(Pooling::Flatten),
            _ => Err(format!("unknown pooling '{s}', expected mean, first or flatten")),
        }
    }
}

impl std::fmt::Display for Pooling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Pooling::Mean => "mean",
            Pooling::First => "first",
            Pooling::Flatten => "flatten",
        };
        f.write_str(name)
    }
}

/// Session settings for [`OnnxEmbeddingModel`].
#[derive(Debug, Clone)]
pub struct OnnxOptions {
    pub hidden_dim: usize,
    pub pooling: Pooling,
    pub intra_threads: usize,
}

impl Default for OnnxOptions {
    fn default() -> Self {
        Self {
            hidden_dim: DEFAULT_HIDDEN_DIM,
            pooling: Pooling::default(),
            intra_threads: 1,
        }
    }
}

/// Embedding model backed by an ONNX Runtime session.
/// Uses a Mutex because `Session::run` requires `&mut self`; concurrent
/// callers are serialized.
pub struct OnnxEmbeddingModel {
    session: Mutex<Session>,
    options: OnnxOptions,
}

impl OnnxEmbeddingModel {
    /// Load an ONNX model from disk.
    ///
    /// # Arguments
    /// * `model_path` - Path to the .onnx model file
    /// * `options` - Hidden dimension, pooling and thread settings
    pub fn load(
        model_path: impl AsRef<Path>,
        options: OnnxOptions,
    ) -> Result<Self, EmbeddingError> {
        let model_path = model_path.as_ref();
        let load_err = |e: &dyn std::fmt::Display| EmbeddingError::ModelLoad {
            path: model_path.to_path_buf(),
            message: e.to_string(),
        };

        tracing::info!(?model_path, ?options, "loading ONNX model");

        let session = Session::builder()
            .map_err(|e| load_err(&e))?
            .with_optimization_level(GraphOptimizationLevel::Level1)
            .map_err(|e| load_err(&e))?
            .with_intra_threads(options.intra_threads)
            .map_err(|e| load_err(&e))?
            .commit_from_file(model_path)
            .map_err(|e| load_err(&e))?;

        Ok(Self {
            session: Mutex::new(session),
            options,
        })
    }

    /// Number of output rows in a buffer of `len` values for `tokens` inputs.
    ///
    /// Accepts per-token hidden states (`tokens * dim`) and already pooled
    /// outputs (`dim`).
    fn output_rows(&self, len: usize, tokens: usize) -> Result<usize, EmbeddingError> {
        let dim = self.options.hidden_dim;
        if len == tokens * dim {
            Ok(tokens)
        } else if len == dim {
            Ok(1)
        } else {
            Err(EmbeddingError::ShapeMismatch(format!(
                "expected {tokens} x {dim} values, got {len}"
            )))
        }
    }
}

impl EmbeddingModel for OnnxEmbeddingModel {
    fn infer(&self, ids: &TokenSequence) -> Result<EmbeddingVector, EmbeddingError> {
        if ids.is_empty() {
            return Err(EmbeddingError::EmptySequence);
        }
        let tokens = ids.len();

        // [batch_size, sequence_length]
        let input_ids = ort::value::Tensor::from_array((
            vec![1, tokens],
            ids.as_slice().to_vec().into_boxed_slice(),
        ))
        .map_err(|e| {
            EmbeddingError::Inference(format!("failed to create {INPUT_NAME} tensor: {e}"))
        })?;

        let mut session = self.session.lock().map_err(|e| {
            EmbeddingError::Inference(format!("Failed to acquire session lock: {}", e))
        })?;

        let outputs = session
            .run(ort::inputs![INPUT_NAME => input_ids])
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let output = outputs.get(OUTPUT_NAME).ok_or_else(|| {
            EmbeddingError::Inference(format!("model output '{OUTPUT_NAME}' not found"))
        })?;

        let output_array = output.try_extract_array::<f32>().map_err(|e| {
            EmbeddingError::Inference(format!("failed to extract output tensor: {e}"))
        })?;

        log::debug!("model output shape {:?} for {tokens} tokens", output_array.shape());

        let buffer: Vec<f32> = output_array.iter().copied().collect();
        let rows = self.output_rows(buffer.len(), tokens)?;
        self.options.pooling.apply(&buffer, rows, self.options.hidden_dim)
    }
}

/// Runs the wrapped model's `infer` on a worker thread with a deadline.
///
/// A timed-out worker cannot be cancelled; it runs to completion in the
/// background and its result is dropped.
pub struct TimeoutModel<M> {
    inner: Arc<M>,
    timeout: Duration,
}

impl<M: EmbeddingModel + 'static> TimeoutModel<M> {
    pub fn new(inner: M, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }
}

impl<M: EmbeddingModel + 'static> EmbeddingModel for TimeoutModel<M> {
    fn infer(&self, ids: &TokenSequence) -> Result<EmbeddingVector, EmbeddingError> {
        let (tx, rx) = mpsc::channel();
        let model = self.inner.clone();
        let ids = ids.clone();

        std::thread::spawn(move || {
            // receiver is gone if we already timed out
            let _ = tx.send(model.infer(&ids));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!("inference exceeded {:?}, abandoning worker", self.timeout);
                Err(EmbeddingError::Timeout(self.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(EmbeddingError::Inference(
                "inference worker exited without a result".to_string(),
            )),
        }
    }
}
