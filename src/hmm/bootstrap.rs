use rand::{prelude::Distribution, Rng, SeedableRng};
use rand_distr::Dirichlet;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::{
    error::{Error, Result},
    symbol::ALPHABET_SIZE,
};

use super::{HmmModel, HIDDEN_STATE_COUNT};

const CPG_INITIAL: [f64; HIDDEN_STATE_COUNT] = [0.05, 0.05, 0.05, 0.05, 0.2, 0.2, 0.2, 0.2];

const CPG_TRANSITION: [[f64; HIDDEN_STATE_COUNT]; HIDDEN_STATE_COUNT] = [
    [0.170, 0.274, 0.426, 0.120, 0.0025, 0.0025, 0.0025, 0.0025],
    [0.170, 0.358, 0.274, 0.188, 0.0025, 0.0025, 0.0025, 0.0025],
    [0.161, 0.329, 0.375, 0.125, 0.0025, 0.0025, 0.0025, 0.0025],
    [0.079, 0.345, 0.384, 0.182, 0.0025, 0.0025, 0.0025, 0.0025],
    [0.0025, 0.0025, 0.0025, 0.0025, 0.300, 0.205, 0.275, 0.210],
    [0.0025, 0.0025, 0.0025, 0.0025, 0.393, 0.137, 0.088, 0.372],
    [0.0025, 0.0025, 0.0025, 0.0025, 0.248, 0.246, 0.288, 0.208],
    [0.0025, 0.0025, 0.0025, 0.0025, 0.177, 0.239, 0.282, 0.292],
];

/// Where the starting point of training comes from.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ModelBootstrap {
    /// Hand-tuned island and background transition frequencies.
    CpgPrior,
    /// Transition rows drawn from a flat Dirichlet distribution.
    Random { seed: u64 },
}

impl ModelBootstrap {
    pub fn build(&self) -> Result<HmmModel> {
        match *self {
            Self::CpgPrior => cpg_prior(),
            Self::Random { seed } => {
                random_model(&mut Xoshiro256PlusPlus::seed_from_u64(seed))
            }
        }
    }
}

pub fn cpg_prior() -> Result<HmmModel> {
    HmmModel::new(
        CPG_INITIAL.to_vec(),
        CPG_TRANSITION.iter().map(|row| row.to_vec()).collect(),
        paired_emission(),
    )
}

/// Draws the initial distribution and the transition rows at random.
/// The emissions stay paired so that every state keeps its nucleotide.
pub fn random_model(rng: &mut impl Rng) -> Result<HmmModel> {
    let dirichlet = Dirichlet::new_with_size(1.0, HIDDEN_STATE_COUNT)
        .map_err(|error| Error::InvalidRandomModel(format!("{error:?}")))?;

    let initial = normalise(dirichlet.sample(rng));
    let transition = (0..HIDDEN_STATE_COUNT)
        .map(|_| normalise(dirichlet.sample(rng)))
        .collect();

    HmmModel::new(initial, transition, paired_emission())
}

/// States `i` and `i + 4` both emit nucleotide `i` with certainty.
fn paired_emission() -> Vec<Vec<f64>> {
    (0..HIDDEN_STATE_COUNT)
        .map(|state| {
            let mut row = vec![0.0; ALPHABET_SIZE];
            row[state % ALPHABET_SIZE] = 1.0;
            row
        })
        .collect()
}

/// Removes the rounding drift of sampled rows.
fn normalise(mut row: Vec<f64>) -> Vec<f64> {
    let sum: f64 = row.iter().sum();
    row.iter_mut().for_each(|value| *value /= sum);
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpg_prior_literals() {
        let model = ModelBootstrap::CpgPrior.build().unwrap();

        assert_eq!(
            model.initial(),
            &[0.05, 0.05, 0.05, 0.05, 0.2, 0.2, 0.2, 0.2]
        );
        assert_eq!(
            model.transition()[0],
            vec![0.170, 0.274, 0.426, 0.120, 0.0025, 0.0025, 0.0025, 0.0025]
        );
        assert_eq!(
            model.transition()[5],
            vec![0.0025, 0.0025, 0.0025, 0.0025, 0.393, 0.137, 0.088, 0.372]
        );
        for (state, row) in model.emission().iter().enumerate() {
            for (symbol, probability) in row.iter().enumerate() {
                let expected = if symbol == state % ALPHABET_SIZE {
                    1.0
                } else {
                    0.0
                };
                assert_eq!(*probability, expected);
            }
        }
        model.require_cpg_layout().unwrap();
    }

    #[test]
    fn test_random_model_is_reproducible() {
        let first = ModelBootstrap::Random { seed: 42 }.build().unwrap();
        let second = ModelBootstrap::Random { seed: 42 }.build().unwrap();
        let other = ModelBootstrap::Random { seed: 43 }.build().unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        first.require_cpg_layout().unwrap();
        assert_eq!(first.emission(), cpg_prior().unwrap().emission());
    }
}
