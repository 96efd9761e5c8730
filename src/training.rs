use std::{
    io::{Read, Write},
    path::Path,
};

use log::{debug, info, warn};

use crate::{
    chunk::{ChunkedVectorBuilder, ObservationChunks},
    corpus::{Corpus, CorpusWriter},
    error::{Error, Result},
    hmm::{HiddenState, HmmModel, TrainModel},
    symbol::SymbolReader,
};

/// Default number of symbols per training chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 0x10000;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct CorpusSummary {
    pub symbols: u64,
    pub chunks: u64,
    /// Symbols of the trailing partial chunk, which is never written.
    pub discarded: usize,
    /// Characters outside of the nucleotide alphabet.
    pub skipped: u64,
}

/// Encodes a raw sequence into full chunks and appends them to `output`.
pub fn build_corpus<Writer: Write>(
    input: impl Read,
    chunk_size: usize,
    output: &mut CorpusWriter<Writer>,
) -> Result<CorpusSummary> {
    let builder = ChunkedVectorBuilder::new(chunk_size, "chunk")?;
    let mut symbols = SymbolReader::new(input);
    let mut chunks = ObservationChunks::new(symbols.by_ref(), builder);

    for chunk in chunks.by_ref() {
        let index = output.append(&chunk?)?;
        debug!("Wrote training chunk {index}");
    }

    let sealed = chunks.builder().sealed();
    let pending = chunks.builder().pending();
    let summary = CorpusSummary {
        symbols: sealed * chunk_size as u64 + pending as u64,
        chunks: sealed,
        discarded: pending,
        skipped: symbols.skipped(),
    };

    info!("Size of input file: {} symbols", summary.symbols);
    if summary.discarded > 0 {
        warn!(
            "Discarding {} trailing symbols that do not fill a chunk of {chunk_size}",
            summary.discarded
        );
    }

    Ok(summary)
}

/// Runs the trainer, reporting any of its errors as a training failure.
pub fn train_model(
    trainer: &dyn TrainModel,
    initial_model: &HmmModel,
    corpus: &dyn Corpus,
    convergence_threshold: f64,
    max_iterations: usize,
) -> Result<HmmModel> {
    if !convergence_threshold.is_finite() || convergence_threshold <= 0.0 {
        return Err(Error::InvalidConvergenceThreshold(convergence_threshold));
    }

    info!("Training for at most {max_iterations} iterations, convergence threshold {convergence_threshold}");
    let model = trainer
        .train(initial_model, corpus, convergence_threshold, max_iterations)
        .and_then(|model| {
            model.validate()?;
            Ok(model)
        })
        .map_err(Error::training_failure)?;

    for (index, probability) in model.initial().iter().enumerate() {
        if let Some(state) = HiddenState::from_index(index) {
            debug!("Trained initial probability of {state}: {probability}");
        }
    }

    Ok(model)
}

/// Writes one stanza per hidden state: initial probability, transition row, emission row.
pub fn write_model_report(model: &HmmModel, mut output: impl Write) -> Result<()> {
    for state in 0..model.hidden_state_count() {
        writeln!(output, "{:?}", model.initial()[state])?;
        writeln!(output, "{}", join_row(&model.transition()[state]))?;
        writeln!(output, "{}", join_row(&model.emission()[state]))?;
    }

    output.flush()?;
    Ok(())
}

fn join_row(row: &[f64]) -> String {
    row.iter()
        .map(|value| format!("{value:?}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trains on `corpus` and writes the report.
/// The report is rendered in memory first, so the file is only touched once it is complete.
pub fn train_and_report(
    trainer: &dyn TrainModel,
    initial_model: &HmmModel,
    corpus: &dyn Corpus,
    convergence_threshold: f64,
    max_iterations: usize,
    report: &Path,
) -> Result<HmmModel> {
    let model = train_model(
        trainer,
        initial_model,
        corpus,
        convergence_threshold,
        max_iterations,
    )?;

    let mut rendered = Vec::new();
    write_model_report(&model, &mut rendered)?;
    std::fs::write(report, rendered)?;
    info!("Wrote model report {report:?}");
    Ok(model)
}
