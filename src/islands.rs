use std::io::{Read, Write};

use log::{debug, info, warn};

use crate::{
    chunk::{ChunkedVectorBuilder, ObservationChunks},
    error::{Error, Result},
    hmm::{Decode, HmmModel},
    segment::{scan_window, IslandThresholds, SegmentationState},
    symbol::SymbolReader,
};

/// Default number of symbols decoded at once.
pub const DEFAULT_WINDOW_SIZE: usize = 0x100000;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct IslandSummary {
    pub windows: usize,
    pub islands: u64,
    pub rejected: u64,
    /// Symbols of the trailing partial window, which is never decoded.
    pub discarded: usize,
    /// Whether a run of island states was still open at the end of the input.
    pub open_candidate_discarded: bool,
}

/// Decodes a test sequence window by window and writes the islands it contains.
pub struct IslandFinder<'a> {
    decoder: &'a dyn Decode,
    model: &'a HmmModel,
    window_size: usize,
    thresholds: IslandThresholds,
}

impl<'a> IslandFinder<'a> {
    pub fn new(
        decoder: &'a dyn Decode,
        model: &'a HmmModel,
        window_size: usize,
        thresholds: IslandThresholds,
    ) -> Result<Self> {
        model.require_cpg_layout()?;
        if window_size == 0 {
            return Err(Error::ZeroCapacity("window"));
        }

        Ok(Self {
            decoder,
            model,
            window_size,
            thresholds,
        })
    }

    /// Records of a window are written and flushed before the next window is decoded,
    /// so a failing window leaves the records of all earlier windows in `output`.
    pub fn find_islands(&self, input: impl Read, mut output: impl Write) -> Result<IslandSummary> {
        let builder = ChunkedVectorBuilder::new(self.window_size, "window")?;
        let mut windows = ObservationChunks::new(SymbolReader::new(input), builder);
        let mut state = SegmentationState::default();
        let mut summary = IslandSummary::default();

        for (window_index, window) in windows.by_ref().enumerate() {
            let window = window?;
            let path = self
                .decoder
                .decode(self.model, &window)
                .and_then(|path| {
                    if path.len() == window.len() {
                        Ok(path)
                    } else {
                        Err(Error::DecodedPathLength {
                            actual: path.len(),
                            expected: window.len(),
                        })
                    }
                })
                .map_err(|error| error.decode_failure(window_index))?;

            let window_offset = (window_index * self.window_size) as u64;
            let (next_state, scan) = scan_window(state, window_offset, &path, &self.thresholds)
                .map_err(|error| error.decode_failure(window_index))?;
            state = next_state;

            for record in &scan.records {
                writeln!(output, "{record}")?;
            }
            output.flush()?;

            debug!(
                "Window {window_index}: {} islands, {} rejected candidates",
                scan.records.len(),
                scan.rejected
            );
            summary.windows += 1;
            summary.islands += scan.records.len() as u64;
            summary.rejected += scan.rejected;
        }

        summary.discarded = windows.builder().pending();
        if summary.discarded > 0 {
            warn!(
                "Discarding {} trailing symbols that do not fill a window of {}",
                summary.discarded, self.window_size
            );
        }
        if let Some(candidate) = state.candidate() {
            warn!(
                "Discarding the island candidate starting at {} that is still open at the end of the input",
                candidate.start + 1
            );
            summary.open_candidate_discarded = true;
        }

        info!(
            "Decoded {} windows: {} islands, {} rejected candidates",
            summary.windows, summary.islands, summary.rejected
        );
        Ok(summary)
    }
}
