use std::{
    fs::File,
    io::{BufReader, BufWriter},
};

use crate::error::Result;
use clap::Parser;
use cli::Cli;
use corpus::CorpusFile;
use hmm::{baum_welch::BaumWelchTrainer, bootstrap::ModelBootstrap, viterbi::ViterbiDecoder};
use islands::IslandFinder;
use log::info;
use segment::IslandThresholds;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

mod chunk;
mod cli;
mod corpus;
mod error;
mod hmm;
mod islands;
mod segment;
mod symbol;
mod training;

fn main() {
    let cli = Cli::parse();

    if let Err(error) = run(cli) {
        println!("Error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    TermLogger::init(
        cli.log_level.into(),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    // Encode the training sequence.
    let (corpus, mut corpus_writer) = CorpusFile::create(cli.corpus_path())?;
    let summary = training::build_corpus(
        BufReader::new(File::open(&cli.training_file)?),
        cli.chunk_size,
        &mut corpus_writer,
    )?;
    corpus_writer.finish()?;
    info!(
        "Wrote {} training chunks to {:?}",
        summary.chunks,
        corpus.path()
    );

    // Train.
    let bootstrap = if cli.random_initial_model {
        ModelBootstrap::Random {
            seed: cli.random_seed,
        }
    } else {
        ModelBootstrap::CpgPrior
    };
    let trainer = BaumWelchTrainer {
        allow_unconverged: cli.allow_unconverged,
    };
    let model = training::train_and_report(
        &trainer,
        &bootstrap.build()?,
        &corpus,
        cli.convergence_threshold,
        cli.max_iterations,
        &cli.model_report,
    )?;

    // Decode the test sequence.
    let thresholds = IslandThresholds {
        min_cg_content: cli.min_cg_content,
        min_oe_ratio: cli.min_oe_ratio,
        min_length: cli.min_island_length,
    };
    let finder = IslandFinder::new(&ViterbiDecoder, &model, cli.window_size, thresholds)?;
    finder.find_islands(
        BufReader::new(File::open(&cli.test_file)?),
        BufWriter::new(File::create(&cli.island_output)?),
    )?;

    Ok(())
}
