use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{
    corpus::Corpus,
    error::{Error, Result},
    symbol::{self, Symbol, ALPHABET_SIZE},
};

pub mod baum_welch;
pub mod bootstrap;
pub mod viterbi;

/// Island states `A+ C+ G+ T+` followed by background states `A- C- G- T-`.
pub const HIDDEN_STATE_COUNT: usize = 2 * ALPHABET_SIZE;

const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Refines a model on a training corpus.
pub trait TrainModel {
    fn train(
        &self,
        initial_model: &HmmModel,
        corpus: &dyn Corpus,
        convergence_threshold: f64,
        max_iterations: usize,
    ) -> Result<HmmModel>;
}

/// Computes the most likely hidden state path of an observation window.
pub trait Decode {
    fn decode(&self, model: &HmmModel, observations: &[Symbol]) -> Result<Vec<usize>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HmmModel {
    initial: Vec<f64>,
    transition: Vec<Vec<f64>>,
    emission: Vec<Vec<f64>>,
}

impl HmmModel {
    pub fn new(
        initial: Vec<f64>,
        transition: Vec<Vec<f64>>,
        emission: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let model = Self {
            initial,
            transition,
            emission,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn hidden_state_count(&self) -> usize {
        self.initial.len()
    }

    pub fn emission_symbol_count(&self) -> usize {
        self.emission.first().map(Vec::len).unwrap_or(0)
    }

    pub fn initial(&self) -> &[f64] {
        &self.initial
    }

    pub fn transition(&self) -> &[Vec<f64>] {
        &self.transition
    }

    pub fn emission(&self) -> &[Vec<f64>] {
        &self.emission
    }

    pub fn validate(&self) -> Result<()> {
        let states = self.hidden_state_count();
        if states == 0 {
            return Err(Error::InvalidModel("the model has no hidden states".into()));
        }
        if self.transition.len() != states || self.emission.len() != states {
            return Err(Error::InvalidModel(format!(
                "{states} initial probabilities, but {} transition rows and {} emission rows",
                self.transition.len(),
                self.emission.len()
            )));
        }

        let symbols = self.emission_symbol_count();
        check_distribution("initial distribution", &self.initial, states)?;
        for (state, row) in self.transition.iter().enumerate() {
            check_distribution(&format!("transition row {state}"), row, states)?;
        }
        for (state, row) in self.emission.iter().enumerate() {
            check_distribution(&format!("emission row {state}"), row, symbols)?;
        }

        Ok(())
    }

    /// Checks that the states pair up as island and background copies of the nucleotides.
    pub fn require_cpg_layout(&self) -> Result<()> {
        if self.hidden_state_count() != HIDDEN_STATE_COUNT
            || self.emission_symbol_count() != ALPHABET_SIZE
        {
            return Err(Error::InvalidModel(format!(
                "expected {HIDDEN_STATE_COUNT} hidden states and {ALPHABET_SIZE} emission symbols, but got {} and {}",
                self.hidden_state_count(),
                self.emission_symbol_count()
            )));
        }

        Ok(())
    }
}

fn check_distribution(name: &str, values: &[f64], expected_len: usize) -> Result<()> {
    if values.len() != expected_len {
        return Err(Error::InvalidModel(format!(
            "{name} has {} entries instead of {expected_len}",
            values.len()
        )));
    }
    if let Some(value) = values
        .iter()
        .find(|value| !value.is_finite() || **value < 0.0)
    {
        return Err(Error::InvalidModel(format!(
            "{name} contains the invalid probability {value}"
        )));
    }

    let sum: f64 = values.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(Error::InvalidModel(format!("{name} sums to {sum}")));
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HiddenState {
    Island(Symbol),
    Background(Symbol),
}

impl HiddenState {
    pub fn from_index(index: usize) -> Option<Self> {
        if index < ALPHABET_SIZE {
            Some(Self::Island(index as Symbol))
        } else if index < HIDDEN_STATE_COUNT {
            Some(Self::Background((index - ALPHABET_SIZE) as Symbol))
        } else {
            None
        }
    }

    pub fn symbol(&self) -> Symbol {
        match *self {
            Self::Island(symbol) | Self::Background(symbol) => symbol,
        }
    }

    pub fn is_island(&self) -> bool {
        matches!(self, Self::Island(_))
    }
}

impl Display for HiddenState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let character = symbol::decode(self.symbol()).unwrap_or('?');
        let strand = if self.is_island() { '+' } else { '-' };
        write!(f, "{character}{strand}")
    }
}
