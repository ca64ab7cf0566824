use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::semantic::{Pooling, DEFAULT_HIDDEN_DIM, DEFAULT_TOLERANCE};

const CONFIG_FILE: &str = "config.yaml";

/// Default model file, relative to the base path
const DEFAULT_MODEL_PATH: &str = "bert-base-chinese.onnx";
/// Default vocabulary file, relative to the base path
const DEFAULT_VOCAB_PATH: &str = "vocab.txt";
/// Default deadline for a single inference call in seconds
const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INTRA_THREADS: usize = 1;

/// Keys accepted by [`Config::get`] and [`Config::set`].
pub const CONFIG_KEYS: &[&str] = &[
    "tolerance",
    "mode",
    "model_path",
    "vocab_path",
    "hidden_dim",
    "pooling",
    "inference_timeout_secs",
    "intra_threads",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("unknown config key '{0}'")]
    UnknownKey(String),
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Word list the front-end is working in. Has no effect on scoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Search,
    Ielts,
    Gre,
}

impl std::str::FromStr for Mode {
    type Err = String;

    /// Accepts names as well as the legacy numeric codes 0, 1 and 2.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "search" | "0" => Ok(Mode::Search),
            "ielts" | "1" => Ok(Mode::Ielts),
            "gre" | "2" => Ok(Mode::Gre),
            _ => Err(format!("unknown mode '{s}', expected search, ielts or gre")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::Search => "search",
            Mode::Ielts => "ielts",
            Mode::Gre => "gre",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Minimum similarity for two inputs to count as synonyms
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,

    #[serde(default)]
    pub mode: Mode,

    /// ONNX model, relative paths resolve against the base path
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// One token per line, relative paths resolve against the base path
    #[serde(default = "default_vocab_path")]
    pub vocab_path: PathBuf,

    #[serde(default = "default_hidden_dim")]
    pub hidden_dim: usize,

    #[serde(default)]
    pub pooling: Pooling,

    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            mode: Mode::default(),
            model_path: default_model_path(),
            vocab_path: default_vocab_path(),
            hidden_dim: DEFAULT_HIDDEN_DIM,
            pooling: Pooling::default(),
            inference_timeout_secs: DEFAULT_INFERENCE_TIMEOUT_SECS,
            intra_threads: DEFAULT_INTRA_THREADS,
            base_path: PathBuf::new(),
        }
    }
}

fn default_tolerance() -> f32 {
    DEFAULT_TOLERANCE
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

fn default_vocab_path() -> PathBuf {
    PathBuf::from(DEFAULT_VOCAB_PATH)
}

fn default_hidden_dim() -> usize {
    DEFAULT_HIDDEN_DIM
}

fn default_inference_timeout_secs() -> u64 {
    DEFAULT_INFERENCE_TIMEOUT_SECS
}

fn default_intra_threads() -> usize {
    DEFAULT_INTRA_THREADS
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::invalid(key, e.to_string()))
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(-1.0..=1.0).contains(&self.tolerance) {
            return Err(ConfigError::invalid(
                "tolerance",
                format!("must be between -1.0 and 1.0, got {}", self.tolerance),
            ));
        }

        if self.hidden_dim == 0 {
            return Err(ConfigError::invalid("hidden_dim", "must be greater than 0"));
        }

        if self.inference_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "inference_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.intra_threads == 0 {
            return Err(ConfigError::invalid("intra_threads", "must be greater than 0"));
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults if
    /// it does not exist.
    pub fn load_with(base_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base_path = base_path.as_ref();
        let file = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !file.exists() {
            log::info!("creating default config at {}", file.display());
            let config = Self {
                base_path: base_path.to_path_buf(),
                ..Self::default()
            };
            config.save()?;
            return Ok(config);
        }

        let config_str = std::fs::read_to_string(&file).map_err(|source| ConfigError::Io {
            path: file.clone(),
            source,
        })?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let file = self.base_path.join(CONFIG_FILE);
        let io_err = |source| ConfigError::Io {
            path: file.clone(),
            source,
        };

        if !self.base_path.as_os_str().is_empty() {
            std::fs::create_dir_all(&self.base_path).map_err(io_err)?;
        }

        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(&file, config_str).map_err(io_err)
    }

    /// Model path resolved against the base path.
    pub fn model_file(&self) -> PathBuf {
        self.resolve(&self.model_path)
    }

    /// Vocabulary path resolved against the base path.
    pub fn vocab_file(&self) -> PathBuf {
        self.resolve(&self.vocab_path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Read one setting as a string.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        let value = match key {
            "tolerance" => self.tolerance.to_string(),
            "mode" => self.mode.to_string(),
            "model_path" => self.model_path.display().to_string(),
            "vocab_path" => self.vocab_path.display().to_string(),
            "hidden_dim" => self.hidden_dim.to_string(),
            "pooling" => self.pooling.to_string(),
            "inference_timeout_secs" => self.inference_timeout_secs.to_string(),
            "intra_threads" => self.intra_threads.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Update one setting and persist the whole config.
    ///
    /// The in-memory config is left untouched if the new value is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut updated = self.clone();
        match key {
            "tolerance" => updated.tolerance = parse(key, value)?,
            "mode" => updated.mode = parse(key, value)?,
            "model_path" => updated.model_path = PathBuf::from(value),
            "vocab_path" => updated.vocab_path = PathBuf::from(value),
            "hidden_dim" => updated.hidden_dim = parse(key, value)?,
            "pooling" => updated.pooling = parse(key, value)?,
            "inference_timeout_secs" => updated.inference_timeout_secs = parse(key, value)?,
            "intra_threads" => updated.intra_threads = parse(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        updated.validate()?;
        updated.save()?;

        log::debug!("config {key} set to {value}");
        *self = updated;
        Ok(())
    }

    /// Restore every setting to its default and persist.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        let defaults = Self {
            base_path: self.base_path.clone(),
            ..Self::default()
        };
        defaults.save()?;
        *self = defaults;
        Ok(())
    }
}
