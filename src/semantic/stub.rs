//! Deterministic embedding model for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::semantic::embeddings::{EmbeddingError, EmbeddingModel, EmbeddingVector};
use crate::semantic::tokenizer::TokenSequence;
use crate::semantic::vocab::TokenId;

/// Maps exact token sequences to fixed vectors. Unknown sequences fail.
#[derive(Default)]
pub struct StubModel {
    table: HashMap<Vec<TokenId>, EmbeddingVector>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ids: &[TokenId], embedding: Vec<f32>) -> Self {
        self.table.insert(ids.to_vec(), embedding);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingModel for StubModel {
    fn infer(&self, ids: &TokenSequence) -> Result<EmbeddingVector, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.table.get(ids.as_slice()).cloned().ok_or_else(|| {
            EmbeddingError::Inference(format!("no stub output for {:?}", ids.as_slice()))
        })
    }
}
