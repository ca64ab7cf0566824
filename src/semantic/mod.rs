//! Semantic similarity engine for synonym detection.
//!
//! # Architecture
//!
//! - `vocab`: Token table loaded from a one-token-per-line file
//! - `tokenizer`: Character-level tokenization with `[UNK]` fallback
//! - `embeddings`: Embedding model trait, ONNX backend, pooling, timeouts
//! - `similarity`: Zero-padded cosine similarity
//! - `classifier`: Orchestrates the pipeline into a synonym verdict

pub mod classifier;
pub mod embeddings;
pub mod similarity;
#[cfg(test)]
pub(crate) mod stub;
pub mod tokenizer;
pub mod vocab;

pub use classifier::{ConfiguredModel, SynonymClassifier};
pub use embeddings::{Pooling, DEFAULT_HIDDEN_DIM};
pub use tokenizer::tokenize;
pub use vocab::{VocabularyIndex, UNK_TOKEN};

/// Default similarity threshold for a synonym verdict
pub const DEFAULT_TOLERANCE: f32 = 0.7;
