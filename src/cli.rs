use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Decide whether two words or phrases are synonyms", long_about = None)]
pub struct Args {
    /// Directory holding config.yaml, the model and the vocabulary
    #[clap(long, env = "SYNO_BASE_PATH", global = true)]
    pub base_path: Option<PathBuf>,

    /// Log debug output
    #[clap(short, long, default_value = "false", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the whole config
    Show {},
    /// Print one setting
    Get {
        key: String,
    },
    /// Update one setting
    Set {
        key: String,
        value: String,
    },
    /// Restore all defaults
    Reset {},
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether two texts are synonyms
    Check {
        text1: String,
        text2: String,

        /// Similarity threshold. Config value by default.
        #[clap(short, long, allow_hyphen_values = true)]
        tolerance: Option<f32>,

        /// Log the computed similarity
        #[clap(short, long, default_value = "false")]
        debug: bool,
    },
    /// Print the similarity score of two texts
    Score {
        text1: String,
        text2: String,
    },
    /// Print the token ids of a text
    Tokenize {
        text: String,
    },
    /// Check that the model and vocabulary files are present
    Assets {},
    /// Manage persisted settings
    Config {
        #[clap(subcommand)]
        action: ConfigAction,
    },
    /// Run the built-in probe pair (小溪 / 溪流)
    SelfTest {},
}
