use std::fmt::{self, Display, Formatter};

use crate::{
    error::{Error, Result},
    hmm::{HiddenState, HIDDEN_STATE_COUNT},
    symbol::{C, G},
};

/// Scores a candidate run must exceed to become an island.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IslandThresholds {
    pub min_cg_content: f64,
    pub min_oe_ratio: f64,
    /// Zero disables the length requirement.
    pub min_length: u64,
}

impl Default for IslandThresholds {
    fn default() -> Self {
        Self {
            min_cg_content: 0.5,
            min_oe_ratio: 0.6,
            min_length: 0,
        }
    }
}

/// A CpG island in 1-based inclusive coordinates of the test sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IslandRecord {
    pub start: u64,
    pub end: u64,
    pub length: u64,
    pub cg_content: f64,
    pub oe_ratio: f64,
}

impl Display for IslandRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {:.6} {:.6}",
            self.start, self.end, self.length, self.cg_content, self.oe_ratio
        )
    }
}

/// A run of island states that has not been closed yet.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Candidate {
    /// 0-based offset of the first state of the run.
    pub start: u64,
    pub length: u64,
    pub c_count: u64,
    pub g_count: u64,
    /// Occurrences of C immediately followed by G inside the run.
    pub cg_count: u64,
}

impl Candidate {
    fn open(start: u64, symbol: u8) -> Self {
        Self {
            start,
            length: 1,
            c_count: (symbol == C) as u64,
            g_count: (symbol == G) as u64,
            cg_count: 0,
        }
    }

    pub fn cg_content(&self) -> f64 {
        (self.c_count + self.g_count) as f64 / self.length as f64
    }

    /// Observed over expected CG dinucleotides, or zero if C or G never occurs.
    pub fn oe_ratio(&self) -> f64 {
        if self.c_count == 0 || self.g_count == 0 {
            0.0
        } else {
            (self.cg_count as f64 * self.length as f64)
                / (self.c_count as f64 * self.g_count as f64)
        }
    }

    pub fn score(&self, thresholds: &IslandThresholds) -> Option<IslandRecord> {
        let cg_content = self.cg_content();
        let oe_ratio = self.oe_ratio();

        if cg_content > thresholds.min_cg_content
            && oe_ratio > thresholds.min_oe_ratio
            && self.length >= thresholds.min_length
        {
            Some(IslandRecord {
                start: self.start + 1,
                end: self.start + self.length,
                length: self.length,
                cg_content,
                oe_ratio,
            })
        } else {
            None
        }
    }
}

/// Scanner state carried from one decoded window to the next.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct SegmentationState {
    candidate: Option<Candidate>,
    previous_was_c: bool,
}

impl SegmentationState {
    pub fn candidate(&self) -> Option<&Candidate> {
        self.candidate.as_ref()
    }

    /// Consumes the state at global 0-based `offset` and returns the run it closes, if any.
    pub fn step(&mut self, offset: u64, state: HiddenState) -> Option<Candidate> {
        let symbol = match state {
            HiddenState::Background(_) => {
                let closed = self.candidate.take();
                if let Some(candidate) = &closed {
                    debug_assert_eq!(candidate.start + candidate.length, offset);
                }
                return closed;
            }
            HiddenState::Island(symbol) => symbol,
        };

        match &mut self.candidate {
            None => self.candidate = Some(Candidate::open(offset, symbol)),
            Some(candidate) => {
                candidate.length += 1;
                if symbol == G {
                    candidate.g_count += 1;
                    if self.previous_was_c {
                        candidate.cg_count += 1;
                    }
                }
                if symbol == C {
                    candidate.c_count += 1;
                }
            }
        }
        self.previous_was_c = symbol == C;
        None
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WindowScan {
    pub records: Vec<IslandRecord>,
    pub rejected: u64,
}

/// Scans one decoded window whose first state sits at global offset `window_offset`.
/// The whole path is validated before any state is consumed.
pub fn scan_window(
    mut state: SegmentationState,
    window_offset: u64,
    path: &[usize],
    thresholds: &IslandThresholds,
) -> Result<(SegmentationState, WindowScan)> {
    let hidden_states = path
        .iter()
        .enumerate()
        .map(|(position, index)| {
            HiddenState::from_index(*index).ok_or(Error::HiddenStateOutOfRange {
                state: *index,
                position,
                state_count: HIDDEN_STATE_COUNT,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut scan = WindowScan::default();
    for (position, hidden_state) in hidden_states.into_iter().enumerate() {
        if let Some(candidate) = state.step(window_offset + position as u64, hidden_state) {
            match candidate.score(thresholds) {
                Some(record) => scan.records.push(record),
                None => scan.rejected += 1,
            }
        }
    }

    Ok((state, scan))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(windows: &[&[usize]]) -> (SegmentationState, Vec<IslandRecord>) {
        let mut state = SegmentationState::default();
        let mut records = Vec::new();
        let mut offset = 0;
        for window in windows {
            let (next, scan) =
                scan_window(state, offset, window, &IslandThresholds::default()).unwrap();
            state = next;
            records.extend(scan.records);
            offset += window.len() as u64;
        }
        (state, records)
    }

    #[test]
    fn test_single_island() {
        let (state, records) = scan_all(&[&[1, 2, 1, 2, 4, 4]]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to_string(), "1 4 4 1.000000 2.000000");
        assert_eq!(state, SegmentationState::default());
    }

    #[test]
    fn test_background_only() {
        let (state, records) = scan_all(&[&[4, 5, 6, 7]]);
        assert!(records.is_empty());
        assert_eq!(state.candidate(), None);
    }

    #[test]
    fn test_without_c_the_ratio_is_zero() {
        let candidate = Candidate {
            start: 0,
            length: 4,
            c_count: 0,
            g_count: 4,
            cg_count: 0,
        };
        assert_eq!(candidate.cg_content(), 1.0);
        assert_eq!(candidate.oe_ratio(), 0.0);
        assert_eq!(candidate.score(&IslandThresholds::default()), None);

        let (_, records) = scan_all(&[&[2, 2, 2, 2, 6]]);
        assert!(records.is_empty());
    }

    #[test]
    fn test_dinucleotide_across_windows() {
        let (_, split) = scan_all(&[&[4, 1], &[2, 1, 2, 4]]);
        let (_, joined) = scan_all(&[&[4, 1, 2, 1, 2, 4]]);

        assert_eq!(split, joined);
        assert_eq!(split.len(), 1);
        assert_eq!(split[0].start, 2);
        assert_eq!(split[0].end, 5);
        assert_eq!(split[0].length, 4);
        assert_eq!(split[0].oe_ratio, 2.0);
    }

    #[test]
    fn test_island_closing_at_window_start() {
        let (_, records) = scan_all(&[&[4, 1, 2, 1, 2], &[7, 7]]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to_string(), "2 5 4 1.000000 2.000000");
    }

    #[test]
    fn test_open_island_is_not_emitted() {
        let (state, records) = scan_all(&[&[4, 1, 2], &[1, 2]]);

        assert!(records.is_empty());
        assert_eq!(
            state.candidate(),
            Some(&Candidate {
                start: 1,
                length: 4,
                c_count: 2,
                g_count: 2,
                cg_count: 2,
            })
        );
    }

    #[test]
    fn test_background_c_does_not_pair_with_island_g() {
        let (_, records) = scan_all(&[&[5, 2, 1, 2, 3, 4]]);

        // G C G T: two Gs, one C, one CG.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].length, 4);
        assert!((records[0].oe_ratio - 2.0).abs() < 1e-12);
        assert!((records[0].cg_content - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_records_are_consistent() {
        let path = [
            0, 1, 2, 1, 2, 3, 4, 5, 1, 1, 2, 2, 2, 4, 1, 2, 0, 1, 2, 1, 2, 6, 3, 1, 2, 7,
        ];
        let (_, records) = scan_all(&[&path]);

        assert!(!records.is_empty());
        for record in &records {
            let run = &path[record.start as usize - 1..record.end as usize];
            assert_eq!(run.len() as u64, record.length);
            assert!(run.iter().all(|state| *state < 4));

            let c_and_g = run.iter().filter(|state| **state == 1 || **state == 2).count();
            assert!((record.cg_content - c_and_g as f64 / run.len() as f64).abs() < 1e-12);
            assert!(record.oe_ratio.is_finite() && record.oe_ratio >= 0.0);
        }
    }

    #[test]
    fn test_scan_is_repeatable() {
        let windows: [&[usize]; 3] = [&[0, 1, 2, 1], &[2, 4, 1, 2, 1], &[2, 2, 5]];
        assert_eq!(scan_all(&windows), scan_all(&windows));
    }

    #[test]
    fn test_minimum_length() {
        let thresholds = IslandThresholds {
            min_length: 5,
            ..Default::default()
        };
        let (_, scan) =
            scan_window(SegmentationState::default(), 0, &[1, 2, 1, 2, 4], &thresholds).unwrap();

        assert!(scan.records.is_empty());
        assert_eq!(scan.rejected, 1);
    }

    #[test]
    fn test_out_of_range_state() {
        let result = scan_window(
            SegmentationState::default(),
            0,
            &[1, 2, 4, 8],
            &IslandThresholds::default(),
        );
        assert!(matches!(
            result,
            Err(Error::HiddenStateOutOfRange {
                state: 8,
                position: 3,
                ..
            })
        ));
    }
}
