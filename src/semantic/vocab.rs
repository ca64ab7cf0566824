//! Vocabulary index for character-level tokenization.
//!
//! The vocabulary source is plain text with one token per line. A token's
//! identifier is the 0-based line number it appears on.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Reserved token used for characters missing from the vocabulary.
pub const UNK_TOKEN: &str = "[UNK]";

/// Identifier of a token, as fed to the embedding model.
pub type TokenId = i64;

/// Errors that can occur while building a vocabulary.
#[derive(Debug, thiserror::Error)]
pub enum VocabError {
    #[error("Vocabulary source unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read vocabulary line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Immutable token -> identifier lookup table.
#[derive(Debug, Clone, Default)]
pub struct VocabularyIndex {
    tokens: HashMap<String, TokenId>,
    lines: usize,
}

impl VocabularyIndex {
    /// Load a vocabulary from a file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VocabError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| VocabError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;

        let vocab = Self::from_reader(BufReader::new(file))?;
        log::debug!(
            "loaded vocabulary from {} ({} lines, {} tokens)",
            path.display(),
            vocab.lines,
            vocab.len()
        );
        Ok(vocab)
    }

    /// Build a vocabulary from any line-oriented reader.
    ///
    /// Lines are split on `\n`; a trailing `\r` is dropped so CRLF sources
    /// yield the same tokens. Invalid UTF-8 is replaced rather than rejected.
    /// A repeated token keeps the identifier of its last occurrence.
    pub fn from_reader(mut reader: impl BufRead) -> Result<Self, VocabError> {
        let mut tokens = HashMap::new();
        let mut buf = Vec::new();
        let mut line = 0usize;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| VocabError::Read { line, source })?;
            if read == 0 {
                break;
            }

            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }

            let token = String::from_utf8_lossy(&buf).into_owned();
            tokens.insert(token, line as TokenId);
            line += 1;
        }

        Ok(Self { tokens, lines: line })
    }

    /// Build a vocabulary from tokens in identifier order.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        let mut lines = 0usize;
        for (idx, token) in tokens.into_iter().enumerate() {
            map.insert(token.into(), idx as TokenId);
            lines = idx + 1;
        }
        Self { tokens: map, lines }
    }

    /// Exact-match lookup. No case or accent normalization is applied.
    pub fn lookup(&self, token: &str) -> Option<TokenId> {
        self.tokens.get(token).copied()
    }

    /// Identifier of the reserved `[UNK]` token, if present.
    pub fn unk_id(&self) -> Option<TokenId> {
        self.lookup(UNK_TOKEN)
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of lines read from the source, duplicates included.
    pub fn source_lines(&self) -> usize {
        self.lines
    }
}
