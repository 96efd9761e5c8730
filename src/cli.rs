use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;

use crate::{islands::DEFAULT_WINDOW_SIZE, training::DEFAULT_CHUNK_SIZE};

/// Trains an eight-state hidden Markov model on a DNA sequence and reports the CpG islands
/// of a second sequence.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Raw DNA text to train the model on.
    pub training_file: PathBuf,

    /// Raw DNA text to search for CpG islands.
    pub test_file: PathBuf,

    /// Output file with one `start end length cg_content oe_ratio` line per island.
    pub island_output: PathBuf,

    /// Output file with the trained model parameters.
    pub model_report: PathBuf,

    /// Baum-Welch stops once the summed parameter change drops below this value.
    pub convergence_threshold: f64,

    /// Maximum number of Baum-Welch iterations.
    pub max_iterations: usize,

    /// Number of symbols per training chunk.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Number of symbols decoded at once.
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    /// Where to store the encoded training corpus.
    /// Defaults to the model report path with the extension `corpus.cbor`.
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// An island must have a higher fraction of C and G.
    #[arg(long, default_value_t = 0.5)]
    pub min_cg_content: f64,

    /// An island must have a higher observed over expected CG ratio.
    #[arg(long, default_value_t = 0.6)]
    pub min_oe_ratio: f64,

    /// An island must be at least this long. Zero disables the check.
    #[arg(long, default_value_t = 0)]
    pub min_island_length: u64,

    /// Start training from a random model instead of the CpG prior.
    #[arg(long)]
    pub random_initial_model: bool,

    /// Seed of the random initial model.
    #[arg(long, default_value_t = 0)]
    pub random_seed: u64,

    /// Keep the last estimate if training does not converge within the maximum number of iterations.
    #[arg(long)]
    pub allow_unconverged: bool,

    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    pub log_level: CliLogLevel,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliLogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LevelFilter {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Off => LevelFilter::Off,
            CliLogLevel::Error => LevelFilter::Error,
            CliLogLevel::Warn => LevelFilter::Warn,
            CliLogLevel::Info => LevelFilter::Info,
            CliLogLevel::Debug => LevelFilter::Debug,
            CliLogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl Cli {
    pub fn corpus_path(&self) -> PathBuf {
        self.corpus
            .clone()
            .unwrap_or_else(|| self.model_report.with_extension("corpus.cbor"))
    }
}
