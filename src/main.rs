use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use homedir::my_home;
use tracing_subscriber::EnvFilter;

mod assets;
mod cli;
mod config;
mod semantic;

use cli::{Command, ConfigAction};
use config::{Config, CONFIG_KEYS};
use semantic::{tokenize, ConfiguredModel, SynonymClassifier, VocabularyIndex, UNK_TOKEN};

const SELF_TEST_PAIR: (&str, &str) = ("小溪", "溪流");

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn base_path(arg: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(path);
    }

    let home = my_home()
        .context("Could not determine home directory")?
        .context("Home directory path is empty")?;
    Ok(home.join(".local/share/syno"))
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    let base_path = base_path(args.base_path)?;
    let mut config = Config::load_with(&base_path)
        .with_context(|| format!("failed to load config from {}", base_path.display()))?;

    let output = run(args.command, &mut config)?;
    println!("{output}");
    Ok(())
}

/// Execute one subcommand and return what it prints.
fn run(command: Command, config: &mut Config) -> Result<String> {
    let output = match command {
        Command::Check {
            text1,
            text2,
            tolerance,
            debug,
        } => {
            let classifier = SynonymClassifier::<ConfiguredModel>::from_config(config)?;
            let tolerance = tolerance.unwrap_or(config.tolerance);
            let synonyms = classifier
                .check(&text1, &text2, tolerance, debug)
                .with_context(|| format!("could not classify {text1:?} and {text2:?}"))?;
            synonyms.to_string()
        }

        Command::Score { text1, text2 } => {
            let classifier = SynonymClassifier::<ConfiguredModel>::from_config(config)?;
            let score = classifier
                .score(&text1, &text2)
                .with_context(|| format!("could not score {text1:?} and {text2:?}"))?;
            score.to_string()
        }

        Command::Tokenize { text } => {
            let vocab_file = config.vocab_file();
            let vocab = VocabularyIndex::load(&vocab_file)?;
            let ids = tokenize(&text, &vocab);
            if ids.is_empty() && !text.is_empty() {
                bail!(
                    "could not tokenize {text:?}: unknown characters and no {UNK_TOKEN} in {}",
                    vocab_file.display()
                );
            }
            serde_json::to_string(&ids)?
        }

        Command::Assets {} => {
            let paths = assets::check(config)?;
            format!(
                "model: {}\nvocab: {}",
                paths.model.display(),
                paths.vocab.display()
            )
        }

        Command::Config { action } => match action {
            ConfigAction::Show {} => CONFIG_KEYS
                .iter()
                .map(|key| -> Result<String> { Ok(format!("{key}: {}", config.get(key)?)) })
                .collect::<Result<Vec<_>>>()?
                .join("\n"),
            ConfigAction::Get { key } => config.get(&key)?,
            ConfigAction::Set { key, value } => {
                config.set(&key, &value)?;
                format!("{key}: {}", config.get(&key)?)
            }
            ConfigAction::Reset {} => {
                config.reset()?;
                "config reset to defaults".to_string()
            }
        },

        Command::SelfTest {} => {
            let (text1, text2) = SELF_TEST_PAIR;
            let classifier = SynonymClassifier::<ConfiguredModel>::from_config(config)?;
            let synonyms = classifier.check(text1, text2, config.tolerance, true)?;
            format!("{text1} / {text2} synonyms: {synonyms}")
        }
    };

    Ok(output)
}
