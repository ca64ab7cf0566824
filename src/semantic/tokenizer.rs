//! Character-level tokenizer.
//!
//! Each Unicode scalar value of the input maps to one token. Characters
//! missing from the vocabulary fall back to `[UNK]`; without `[UNK]` the
//! whole input is unencodable.

use std::sync::Arc;

use serde::Serialize;

use crate::semantic::vocab::{TokenId, VocabularyIndex};

/// Ordered token identifiers for one input string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenSequence(Vec<TokenId>);

impl From<Vec<TokenId>> for TokenSequence {
    fn from(ids: Vec<TokenId>) -> Self {
        Self(ids)
    }
}

impl TokenSequence {
    pub fn as_slice(&self) -> &[TokenId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    #[error("character {ch:?} is not in the vocabulary and no [UNK] fallback exists")]
    Unencodable { ch: char },
}

/// Tokenize `text` against `vocab`.
///
/// Returns an empty sequence when any character can be encoded neither
/// directly nor as `[UNK]`. Callers must not confuse that with empty input;
/// use [`Tokenizer::encode`] to get the failure as an error instead.
pub fn tokenize(text: &str, vocab: &VocabularyIndex) -> TokenSequence {
    try_tokenize(text, vocab).unwrap_or_default()
}

fn try_tokenize(text: &str, vocab: &VocabularyIndex) -> Result<TokenSequence, TokenizeError> {
    let mut ids = Vec::with_capacity(text.chars().count());
    let mut buf = [0u8; 4];

    for ch in text.chars() {
        let token: &str = ch.encode_utf8(&mut buf);
        let id = vocab
            .lookup(token)
            .or_else(|| vocab.unk_id())
            .ok_or(TokenizeError::Unencodable { ch })?;
        ids.push(id);
    }

    Ok(TokenSequence(ids))
}

/// Tokenizer bound to a shared, read-only vocabulary.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    vocab: Arc<VocabularyIndex>,
}

impl Tokenizer {
    pub fn new(vocab: Arc<VocabularyIndex>) -> Self {
        Self { vocab }
    }

    /// Tokenize, reporting the first unencodable character as an error.
    pub fn encode(&self, text: &str) -> Result<TokenSequence, TokenizeError> {
        try_tokenize(text, &self.vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> VocabularyIndex {
        VocabularyIndex::from_tokens(["小", "溪", "流", "[UNK]"])
    }

    #[test]
    fn test_known_characters() {
        let vocab = vocab();
        assert_eq!(tokenize("小溪", &vocab).as_slice(), &[0, 1]);
        assert_eq!(tokenize("溪流", &vocab).as_slice(), &[1, 2]);
    }

    #[test]
    fn test_oov_maps_to_unk() {
        let vocab = vocab();
        let ids = tokenize("小河流", &vocab);

        assert_eq!(ids.as_slice(), &[0, 3, 2]);
        assert_eq!(ids.len(), "小河流".chars().count());
    }

    #[test]
    fn test_without_unk_whole_input_fails() {
        let vocab = VocabularyIndex::from_tokens(["小", "溪", "流"]);

        assert!(tokenize("小溪河", &vocab).is_empty());
        assert!(tokenize("河小溪", &vocab).is_empty());
        assert_eq!(tokenize("小溪", &vocab).as_slice(), &[0, 1]);
    }

    #[test]
    fn test_encode_reports_offending_character() {
        let tokenizer = Tokenizer::new(Arc::new(VocabularyIndex::from_tokens(["小"])));

        let err = tokenizer.encode("小河").unwrap_err();
        assert!(matches!(err, TokenizeError::Unencodable { ch: '河' }));
    }

    #[test]
    fn test_empty_text_is_empty_sequence() {
        let tokenizer = Tokenizer::new(Arc::new(vocab()));
        assert!(tokenizer.encode("").unwrap().is_empty());
    }

    #[test]
    fn test_multibyte_characters_are_single_tokens() {
        // 4-byte UTF-8 scalar outside the BMP
        let vocab = VocabularyIndex::from_tokens(["𠀀", "a", "[UNK]"]);
        assert_eq!(tokenize("a𠀀a", &vocab).as_slice(), &[1, 0, 1]);
    }

    #[test]
    fn test_deterministic() {
        let vocab = vocab();
        let first = tokenize("小溪流水", &vocab);
        for _ in 0..10 {
            assert_eq!(tokenize("小溪流水", &vocab), first);
        }
    }
}
