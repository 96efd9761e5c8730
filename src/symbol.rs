use std::io::{Bytes, Read};

use compact_genome::{
    implementation::alphabets::dna_alphabet::DnaAlphabet,
    interface::alphabet::{Alphabet, AlphabetCharacter},
};

use crate::error::Result;

/// Index of a nucleotide in the emission alphabet: A = 0, C = 1, G = 2, T = 3.
pub type Symbol = u8;

pub const ALPHABET_SIZE: usize = DnaAlphabet::SIZE;
pub const C: Symbol = 1;
pub const G: Symbol = 2;

/// Maps an ASCII nucleotide to its symbol, ignoring case.
/// Anything outside of `ACGTacgt` is not a symbol and yields `None`.
pub fn encode(byte: u8) -> Option<Symbol> {
    DnaAlphabet::ascii_to_character(byte.to_ascii_uppercase())
        .ok()
        .map(|character| character.index() as Symbol)
}

pub fn decode(symbol: Symbol) -> Option<char> {
    let character =
        <DnaAlphabet as Alphabet>::CharacterType::from_index(symbol as usize).ok()?;
    let ascii: u8 = character.into();
    Some(char::from(ascii))
}

/// Streams the symbols of a raw character source, skipping unrecognised characters.
pub struct SymbolReader<Reader: Read> {
    bytes: Bytes<Reader>,
    skipped: u64,
}

impl<Reader: Read> SymbolReader<Reader> {
    pub fn new(reader: Reader) -> Self {
        Self {
            bytes: reader.bytes(),
            skipped: 0,
        }
    }

    /// Number of characters dropped so far because they are not nucleotides.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<Reader: Read> Iterator for SymbolReader<Reader> {
    type Item = Result<Symbol>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.bytes.next()? {
                Ok(byte) => {
                    if let Some(symbol) = encode(byte) {
                        return Some(Ok(symbol));
                    }
                    self.skipped += 1;
                }
                Err(error) => return Some(Err(error.into())),
            }
        }
    }
}
