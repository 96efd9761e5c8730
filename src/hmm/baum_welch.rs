use log::{debug, info, warn};

use crate::{
    corpus::Corpus,
    error::{Error, Result},
    symbol::Symbol,
};

use super::{HmmModel, TrainModel};

/// Weight of the previous estimate in every re-estimated row, in expected observations.
/// Keeps probabilities that the corpus happens not to exercise above zero.
const PSEUDO_COUNT: f64 = 1.0;

/// Single-machine Baum-Welch with rescaled forward and backward variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaumWelchTrainer {
    /// Return the last estimate instead of failing when the iterations run out.
    pub allow_unconverged: bool,
}

impl TrainModel for BaumWelchTrainer {
    fn train(
        &self,
        initial_model: &HmmModel,
        corpus: &dyn Corpus,
        convergence_threshold: f64,
        max_iterations: usize,
    ) -> Result<HmmModel> {
        initial_model.validate()?;
        let mut model = initial_model.clone();

        for iteration in 1..=max_iterations {
            let mut counts = ExpectedCounts::new(&model);
            corpus.for_each_chunk(&mut |index, chunk| counts.add_chunk(&model, index, chunk))?;
            if counts.chunks == 0 {
                return Err(Error::EmptyTrainingCorpus);
            }

            let refined = counts.reestimate(&model)?;
            let change = parameter_change(&model, &refined);
            debug!(
                "Iteration {iteration}: log likelihood {:.6}, parameter change {change:.6}",
                counts.log_likelihood
            );
            model = refined;

            if change < convergence_threshold {
                info!("Baum-Welch converged after {iteration} iterations");
                return Ok(model);
            }
        }

        if self.allow_unconverged {
            warn!("Baum-Welch did not converge within {max_iterations} iterations");
            Ok(model)
        } else {
            Err(Error::TrainingNotConverged {
                threshold: convergence_threshold,
                iterations: max_iterations,
            })
        }
    }
}

struct ExpectedCounts {
    states: usize,
    initial: Vec<f64>,
    transition: Vec<Vec<f64>>,
    emission: Vec<Vec<f64>>,
    chunks: u64,
    log_likelihood: f64,
}

impl ExpectedCounts {
    fn new(model: &HmmModel) -> Self {
        let states = model.hidden_state_count();
        Self {
            states,
            initial: vec![0.0; states],
            transition: vec![vec![0.0; states]; states],
            emission: vec![vec![0.0; model.emission_symbol_count()]; states],
            chunks: 0,
            log_likelihood: 0.0,
        }
    }

    fn add_chunk(&mut self, model: &HmmModel, index: u64, chunk: &[Symbol]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let symbols = model.emission_symbol_count();
        if let Some(position) = chunk.iter().position(|symbol| *symbol as usize >= symbols) {
            return Err(Error::ObservationOutOfRange {
                observation: chunk[position] as usize,
                position,
                alphabet_size: symbols,
            });
        }

        let states = self.states;
        let emission = |state: usize, time: usize| model.emission()[state][chunk[time] as usize];

        // Forward pass, every row normalised to sum 1.
        let mut alpha = vec![0.0; chunk.len() * states];
        let mut scale = vec![0.0; chunk.len()];
        for time in 0..chunk.len() {
            for state in 0..states {
                let reach = if time == 0 {
                    model.initial()[state]
                } else {
                    let previous = &alpha[(time - 1) * states..time * states];
                    previous
                        .iter()
                        .zip(model.transition())
                        .map(|(alpha, row)| alpha * row[state])
                        .sum::<f64>()
                };
                alpha[time * states + state] = reach * emission(state, time);
            }

            let row = &mut alpha[time * states..(time + 1) * states];
            let sum: f64 = row.iter().sum();
            if sum <= 0.0 || !sum.is_finite() {
                return Err(Error::TrainingUnderflow {
                    chunk: index,
                    factor: sum,
                });
            }
            row.iter_mut().for_each(|value| *value /= sum);
            scale[time] = sum;
        }

        // Backward pass, accumulating the expectations on the way.
        let mut beta = vec![1.0; states];
        let mut previous_beta = vec![0.0; states];
        for time in (0..chunk.len()).rev() {
            let alpha_row = &alpha[time * states..(time + 1) * states];
            for state in 0..states {
                let gamma = alpha_row[state] * beta[state];
                self.emission[state][chunk[time] as usize] += gamma;
                if time == 0 {
                    self.initial[state] += gamma;
                }
            }

            if time == 0 {
                break;
            }
            let previous_alpha = &alpha[(time - 1) * states..time * states];
            for from in 0..states {
                let mut sum = 0.0;
                for to in 0..states {
                    let weight =
                        model.transition()[from][to] * emission(to, time) * beta[to] / scale[time];
                    self.transition[from][to] += previous_alpha[from] * weight;
                    sum += weight;
                }
                previous_beta[from] = sum;
            }
            std::mem::swap(&mut beta, &mut previous_beta);
        }

        self.chunks += 1;
        self.log_likelihood += scale.iter().map(|factor| factor.ln()).sum::<f64>();
        Ok(())
    }

    fn reestimate(&self, model: &HmmModel) -> Result<HmmModel> {
        let initial = smoothed(&self.initial, model.initial());
        let transition = self
            .transition
            .iter()
            .zip(model.transition())
            .map(|(counts, previous)| smoothed(counts, previous))
            .collect();
        let emission = self
            .emission
            .iter()
            .zip(model.emission())
            .map(|(counts, previous)| smoothed(counts, previous))
            .collect();

        HmmModel::new(initial, transition, emission)
    }
}

/// Mixes the expected counts with `PSEUDO_COUNT` observations drawn from the previous row.
/// The result lies between the previous row and the maximum likelihood estimate,
/// so the likelihood still does not decrease.
fn smoothed(counts: &[f64], previous: &[f64]) -> Vec<f64> {
    let sum: f64 = counts.iter().sum();
    if !sum.is_finite() {
        return previous.to_vec();
    }

    counts
        .iter()
        .zip(previous)
        .map(|(count, previous)| (count + PSEUDO_COUNT * previous) / (sum + PSEUDO_COUNT))
        .collect()
}

fn parameter_change(old: &HmmModel, new: &HmmModel) -> f64 {
    let distance = |a: &[f64], b: &[f64]| -> f64 {
        a.iter().zip(b).map(|(a, b)| (a - b).abs()).sum()
    };

    distance(old.initial(), new.initial())
        + old
            .transition()
            .iter()
            .zip(new.transition())
            .map(|(a, b)| distance(a, b))
            .sum::<f64>()
        + old
            .emission()
            .iter()
            .zip(new.emission())
            .map(|(a, b)| distance(a, b))
            .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chunk::ObservationVector,
        hmm::{bootstrap::cpg_prior, viterbi::ViterbiDecoder, Decode},
    };

    const LENIENT: BaumWelchTrainer = BaumWelchTrainer {
        allow_unconverged: true,
    };

    fn assert_stochastic(values: &[f64]) {
        let sum: f64 = values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "{values:?}");
    }

    fn two_state_model() -> HmmModel {
        HmmModel::new(
            vec![0.5, 0.5],
            vec![vec![0.8, 0.2], vec![0.3, 0.7]],
            vec![vec![0.6, 0.4], vec![0.3, 0.7]],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_corpus() {
        let corpus: Vec<ObservationVector> = Vec::new();
        let result = BaumWelchTrainer::default().train(&cpg_prior().unwrap(), &corpus, 0.005, 3);
        assert!(matches!(result, Err(Error::EmptyTrainingCorpus)));
    }

    #[test]
    fn test_zero_iterations_keep_the_model() {
        let corpus: Vec<ObservationVector> = vec![vec![0, 1, 2, 3]];
        let model = cpg_prior().unwrap();
        let trained = LENIENT.train(&model, &corpus, 0.005, 0).unwrap();
        assert_eq!(trained, model);

        assert!(matches!(
            BaumWelchTrainer::default().train(&model, &corpus, 0.005, 0),
            Err(Error::TrainingNotConverged { iterations: 0, .. })
        ));
    }

    #[test]
    fn test_iteration_limit_fails_by_default() {
        let corpus: Vec<ObservationVector> = vec![vec![0, 1, 2, 3, 1, 2, 2, 1]];
        let result =
            BaumWelchTrainer::default().train(&cpg_prior().unwrap(), &corpus, f64::MIN_POSITIVE, 1);

        assert!(matches!(
            result,
            Err(Error::TrainingNotConverged { iterations: 1, .. })
        ));
    }

    #[test]
    fn test_single_observation_chunk() {
        // Only the initial distribution and the emissions receive counts.
        let corpus: Vec<ObservationVector> = vec![vec![0]];
        let model = two_state_model();
        let trained = LENIENT.train(&model, &corpus, 1e-12, 1).unwrap();

        // Posterior of state 0 after observing symbol 0 is 2/3, mixed with the previous 1/2.
        assert!((trained.initial()[0] - 7.0 / 12.0).abs() < 1e-12);
        assert!((trained.initial()[1] - 5.0 / 12.0).abs() < 1e-12);
        assert_eq!(trained.transition(), model.transition());
        // Counts (2/3, 0) and (1/3, 0) plus one observation of the previous rows.
        assert!((trained.emission()[0][0] - 0.76).abs() < 1e-12);
        assert!((trained.emission()[0][1] - 0.24).abs() < 1e-12);
        assert!((trained.emission()[1][0] - 0.475).abs() < 1e-12);
        assert!((trained.emission()[1][1] - 0.525).abs() < 1e-12);
    }

    #[test]
    fn test_training_keeps_rows_stochastic() {
        let corpus: Vec<ObservationVector> = vec![
            vec![1, 2, 1, 2, 1, 2, 0, 3, 0, 3, 3, 0, 1, 2, 2, 1],
            vec![0, 0, 3, 3, 0, 3, 1, 2, 1, 2, 2, 1, 0, 3, 3, 0],
        ];
        let trained = LENIENT
            .train(&cpg_prior().unwrap(), &corpus, 1e-9, 5)
            .unwrap();

        trained.require_cpg_layout().unwrap();
        assert_eq!(trained.emission(), cpg_prior().unwrap().emission());
        assert_stochastic(trained.initial());
        trained.transition().iter().for_each(|row| assert_stochastic(row));
        trained.emission().iter().for_each(|row| assert_stochastic(row));
    }

    #[test]
    fn test_likelihood_does_not_decrease() {
        let corpus: Vec<ObservationVector> =
            vec![vec![0, 1, 1, 1, 0, 0, 1, 0, 1, 1, 1, 1, 0, 0, 0, 1]];
        let mut model = two_state_model();
        let mut previous = f64::NEG_INFINITY;

        for _ in 0..5 {
            let mut counts = ExpectedCounts::new(&model);
            corpus
                .for_each_chunk(&mut |index, chunk| counts.add_chunk(&model, index, chunk))
                .unwrap();
            assert!(counts.log_likelihood >= previous - 1e-9);
            previous = counts.log_likelihood;
            model = counts.reestimate(&model).unwrap();
        }
    }

    #[test]
    fn test_single_chunk_keeps_every_start_state() {
        let chunk: ObservationVector = "ATATCGCGCGATTACGCGAT"
            .bytes()
            .map(|byte| crate::symbol::encode(byte).unwrap())
            .collect();
        let prior = cpg_prior().unwrap();
        let trained = LENIENT.train(&prior, &vec![chunk], 0.005, 3).unwrap();

        assert!(trained.initial().iter().all(|probability| *probability > 0.0));
        assert!(trained
            .transition()
            .iter()
            .flatten()
            .all(|probability| *probability > 0.0));

        // Starts with C although the training chunk starts with A.
        let window: Vec<Symbol> = "CATATATCGCGGCGCCGCGTATA"
            .bytes()
            .map(|byte| crate::symbol::encode(byte).unwrap())
            .collect();
        let path = ViterbiDecoder.decode(&trained, &window).unwrap();
        for (state, symbol) in path.iter().zip(&window) {
            assert_eq!(state % 4, *symbol as usize);
        }
    }

    #[test]
    fn test_underflow() {
        // Symbol 1 cannot be emitted by any state.
        let model = HmmModel::new(
            vec![1.0],
            vec![vec![1.0]],
            vec![vec![1.0, 0.0]],
        )
        .unwrap();
        let corpus: Vec<ObservationVector> = vec![vec![0, 1]];

        let result = BaumWelchTrainer::default().train(&model, &corpus, 0.005, 2);
        assert!(matches!(
            result,
            Err(Error::TrainingUnderflow { chunk: 1, .. })
        ));
    }
}
