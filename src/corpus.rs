use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::debug;

use crate::{chunk::ObservationVector, error::Result, symbol::Symbol};

/// An ordered collection of training chunks, numbered from 1.
pub trait Corpus {
    fn for_each_chunk(&self, visit: &mut dyn FnMut(u64, &[Symbol]) -> Result<()>) -> Result<()>;
}

impl Corpus for Vec<ObservationVector> {
    fn for_each_chunk(&self, visit: &mut dyn FnMut(u64, &[Symbol]) -> Result<()>) -> Result<()> {
        for (index, chunk) in self.iter().enumerate() {
            visit(index as u64 + 1, chunk)?;
        }

        Ok(())
    }
}

/// Appends numbered chunks to a CBOR stream.
pub struct CorpusWriter<Writer: Write> {
    output: Writer,
    next_chunk: u64,
}

impl<Writer: Write> CorpusWriter<Writer> {
    pub fn new(output: Writer) -> Self {
        Self {
            output,
            next_chunk: 1,
        }
    }

    pub fn append(&mut self, chunk: &[Symbol]) -> Result<u64> {
        let index = self.next_chunk;
        ciborium::into_writer(&(index, chunk), &mut self.output)?;
        self.next_chunk += 1;
        Ok(index)
    }

    pub fn finish(mut self) -> Result<Writer> {
        self.output.flush()?;
        Ok(self.output)
    }
}

/// Decodes a CBOR chunk stream until the reader is exhausted.
pub fn read_chunks(
    mut input: impl BufRead,
    visit: &mut dyn FnMut(u64, &[Symbol]) -> Result<()>,
) -> Result<()> {
    while !input.fill_buf()?.is_empty() {
        let (index, chunk): (u64, ObservationVector) = ciborium::from_reader(&mut input)?;
        visit(index, &chunk)?;
    }

    Ok(())
}

/// A corpus persisted on disk, re-read on every pass.
#[derive(Debug, Clone)]
pub struct CorpusFile {
    path: PathBuf,
}

impl CorpusFile {
    pub fn create(path: impl Into<PathBuf>) -> Result<(Self, CorpusWriter<BufWriter<File>>)> {
        let path = path.into();
        let writer = CorpusWriter::new(BufWriter::new(File::create(&path)?));
        Ok((Self { path }, writer))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Corpus for CorpusFile {
    fn for_each_chunk(&self, visit: &mut dyn FnMut(u64, &[Symbol]) -> Result<()>) -> Result<()> {
        debug!("Reading corpus {:?}", self.path);
        read_chunks(BufReader::new(File::open(&self.path)?), visit)
    }
}
