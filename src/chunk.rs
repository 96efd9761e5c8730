use crate::{
    error::{Error, Result},
    symbol::Symbol,
};

/// A sealed, fixed-length run of symbols.
pub type ObservationVector = Vec<Symbol>;

/// Accumulates symbols until `capacity` is reached and hands out the sealed vector.
/// Storage grows with the pushed symbols, not with `capacity`.
#[derive(Debug)]
pub struct ChunkedVectorBuilder {
    capacity: usize,
    current: ObservationVector,
    sealed: u64,
}

impl ChunkedVectorBuilder {
    pub fn new(capacity: usize, purpose: &'static str) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity(purpose));
        }

        Ok(Self {
            capacity,
            current: Vec::new(),
            sealed: 0,
        })
    }

    /// Number of vectors sealed so far.
    pub fn sealed(&self) -> u64 {
        self.sealed
    }

    /// Symbols pushed since the last sealed vector.
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    pub fn push(&mut self, symbol: Symbol) -> Option<ObservationVector> {
        self.current.push(symbol);

        if self.current.len() == self.capacity {
            self.sealed += 1;
            Some(std::mem::take(&mut self.current))
        } else {
            None
        }
    }
}

/// Groups a symbol stream into full vectors. A trailing partial vector is dropped.
pub struct ObservationChunks<Symbols> {
    symbols: Symbols,
    builder: ChunkedVectorBuilder,
}

impl<Symbols: Iterator<Item = Result<Symbol>>> ObservationChunks<Symbols> {
    pub fn new(symbols: Symbols, builder: ChunkedVectorBuilder) -> Self {
        Self { symbols, builder }
    }

    pub fn builder(&self) -> &ChunkedVectorBuilder {
        &self.builder
    }
}

impl<Symbols: Iterator<Item = Result<Symbol>>> Iterator for ObservationChunks<Symbols> {
    type Item = Result<ObservationVector>;

    fn next(&mut self) -> Option<Self::Item> {
        for symbol in self.symbols.by_ref() {
            match symbol {
                Ok(symbol) => {
                    if let Some(vector) = self.builder.push(symbol) {
                        return Some(Ok(vector));
                    }
                }
                Err(error) => return Some(Err(error)),
            }
        }

        None
    }
}
