use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("logger error: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error("corpus serialisation error: {0}")]
    CorpusSerialisation(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("corpus deserialisation error: {0}")]
    CorpusDeserialisation(#[from] ciborium::de::Error<std::io::Error>),

    #[error("training failed: {0}")]
    TrainingFailure(#[source] Box<Error>),

    #[error("decoding window {window} failed: {source}")]
    DecodeFailure {
        window: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("the training corpus contains no complete chunk")]
    EmptyTrainingCorpus,

    #[error("training did not converge below {threshold} within {iterations} iterations")]
    TrainingNotConverged { threshold: f64, iterations: usize },

    #[error("the scaling factor of chunk {chunk} became {factor} during training")]
    TrainingUnderflow { chunk: u64, factor: f64 },

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("observation {observation} at position {position} is outside of the {alphabet_size} emission symbols")]
    ObservationOutOfRange {
        observation: usize,
        position: usize,
        alphabet_size: usize,
    },

    #[error("the {length} observations have zero probability under the model")]
    ZeroProbabilityObservations { length: usize },

    #[error("hidden state {state} at position {position} is outside of the {state_count} hidden states")]
    HiddenStateOutOfRange {
        state: usize,
        position: usize,
        state_count: usize,
    },

    #[error("the decoded path has length {actual}, but the window has length {expected}")]
    DecodedPathLength { actual: usize, expected: usize },

    #[error("the {0} capacity must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("the convergence threshold {0} is not a positive number")]
    InvalidConvergenceThreshold(f64),

    #[error("cannot draw a random model: {0}")]
    InvalidRandomModel(String),
}

impl Error {
    pub fn training_failure(self) -> Self {
        match self {
            error @ Error::TrainingFailure(_) => error,
            error => Error::TrainingFailure(Box::new(error)),
        }
    }

    pub fn decode_failure(self, window: usize) -> Self {
        match self {
            error @ Error::DecodeFailure { .. } => error,
            error => Error::DecodeFailure {
                window,
                source: Box::new(error),
            },
        }
    }
}
