use crate::{
    error::{Error, Result},
    symbol::Symbol,
};

use super::{Decode, HmmModel};

/// Log-space Viterbi decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct ViterbiDecoder;

impl Decode for ViterbiDecoder {
    fn decode(&self, model: &HmmModel, observations: &[Symbol]) -> Result<Vec<usize>> {
        model.validate()?;
        let states = model.hidden_state_count();
        if states > u16::MAX as usize + 1 {
            return Err(Error::InvalidModel(format!(
                "{states} hidden states are too many to decode"
            )));
        }

        let symbols = model.emission_symbol_count();
        if let Some((position, observation)) = observations
            .iter()
            .enumerate()
            .find(|(_, observation)| **observation as usize >= symbols)
        {
            return Err(Error::ObservationOutOfRange {
                observation: *observation as usize,
                position,
                alphabet_size: symbols,
            });
        }

        let Some((first, rest)) = observations.split_first() else {
            return Ok(Vec::new());
        };

        let log_transition: Vec<Vec<f64>> = model
            .transition()
            .iter()
            .map(|row| row.iter().map(|p| p.ln()).collect())
            .collect();
        let log_emission: Vec<Vec<f64>> = model
            .emission()
            .iter()
            .map(|row| row.iter().map(|p| p.ln()).collect())
            .collect();

        let mut score: Vec<f64> = (0..states)
            .map(|state| model.initial()[state].ln() + log_emission[state][*first as usize])
            .collect();
        let mut next_score = vec![f64::NEG_INFINITY; states];
        // Best predecessor of every state, one row per observation after the first.
        let mut backtrack = vec![0u16; rest.len() * states];

        for (time, observation) in rest.iter().enumerate() {
            let predecessors = &mut backtrack[time * states..(time + 1) * states];
            for state in 0..states {
                let mut best_score = f64::NEG_INFINITY;
                let mut best_predecessor = 0;
                for (predecessor, predecessor_score) in score.iter().enumerate() {
                    let candidate = predecessor_score + log_transition[predecessor][state];
                    if candidate > best_score {
                        best_score = candidate;
                        best_predecessor = predecessor;
                    }
                }
                next_score[state] = best_score + log_emission[state][*observation as usize];
                predecessors[state] = best_predecessor as u16;
            }
            std::mem::swap(&mut score, &mut next_score);
        }

        let (mut state, best_score) = score.iter().enumerate().fold(
            (0, f64::NEG_INFINITY),
            |best, (state, score)| {
                if *score > best.1 {
                    (state, *score)
                } else {
                    best
                }
            },
        );
        if !best_score.is_finite() {
            return Err(Error::ZeroProbabilityObservations {
                length: observations.len(),
            });
        }

        let mut path = vec![0; observations.len()];
        path[rest.len()] = state;
        for time in (0..rest.len()).rev() {
            state = backtrack[time * states + state] as usize;
            path[time] = state;
        }

        Ok(path)
    }
}
