//! Presence check for the model and vocabulary files.

use std::path::PathBuf;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("missing asset files: {}", display_paths(.0))]
    Missing(Vec<PathBuf>),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolved locations of the files the classifier needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub model: PathBuf,
    pub vocab: PathBuf,
}

/// Verify that the configured model and vocabulary files exist.
///
/// All missing files are reported together.
pub fn check(config: &Config) -> Result<AssetPaths, AssetError> {
    let paths = AssetPaths {
        model: config.model_file(),
        vocab: config.vocab_file(),
    };

    let missing: Vec<PathBuf> = [&paths.model, &paths.vocab]
        .into_iter()
        .filter(|path| !path.is_file())
        .cloned()
        .collect();

    if !missing.is_empty() {
        log::warn!("missing assets: {}", display_paths(&missing));
        return Err(AssetError::Missing(missing));
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_all_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(dir.path()).unwrap();

        let Err(AssetError::Missing(missing)) = check(&config) else {
            panic!("expected missing assets");
        };
        assert_eq!(missing, vec![config.model_file(), config.vocab_file()]);
    }

    #[test]
    fn test_only_model_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(dir.path()).unwrap();
        std::fs::write(config.vocab_file(), "[UNK]\n").unwrap();

        let Err(AssetError::Missing(missing)) = check(&config) else {
            panic!("expected missing model");
        };
        assert_eq!(missing, vec![config.model_file()]);
    }

    #[test]
    fn test_all_present() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_with(dir.path()).unwrap();
        std::fs::write(config.vocab_file(), "[UNK]\n").unwrap();
        std::fs::write(config.model_file(), b"onnx").unwrap();

        let paths = check(&config).unwrap();
        assert_eq!(paths.vocab, dir.path().join("vocab.txt"));
    }
}
