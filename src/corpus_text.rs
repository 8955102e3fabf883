//! Plain-text corpus form: one `product_name amount price` line per observation, no header.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;
use thiserror::Error;

use crate::corpus::ProductCorpus;
use crate::observation::Observation;

#[derive(Error, Debug)]
pub enum CorpusTextError {
    #[error("line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
    #[error("product name {0:?} cannot be written as a single field")]
    UnrepresentableName(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn format_observation(observation: &Observation) -> Result<String, CorpusTextError> {
    let name = &observation.product_name;
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(CorpusTextError::UnrepresentableName(name.clone()));
    }
    Ok(format!("{} {} {}", name, observation.amount, observation.price))
}

pub fn parse_observation(line: &str, line_number: usize) -> Result<Observation, CorpusTextError> {
    let malformed = |reason: String| CorpusTextError::MalformedLine { line: line_number, reason };
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [name, amount, price] = fields[..] else {
        return Err(malformed(format!("expected 3 fields, found {}", fields.len())));
    };
    let amount = amount
        .parse::<i64>()
        .map_err(|e| malformed(format!("bad amount {amount:?}: {e}")))?;
    let price = price
        .parse::<f64>()
        .map_err(|e| malformed(format!("bad price {price:?}: {e}")))?;
    if !price.is_finite() {
        return Err(malformed(format!("price {price} is not a finite number")));
    }
    Ok(Observation::new(name.to_owned(), price, amount))
}

pub fn write_corpus<W: Write>(
    corpus: &ProductCorpus,
    mut writer: W,
) -> Result<(), CorpusTextError> {
    for observation in corpus.observations() {
        writeln!(writer, "{}", format_observation(observation)?)?;
    }
    writer.flush()?;
    Ok(())
}

/// Parses every non-blank line; the first malformed line aborts the read.
pub fn read_observations<R: Read>(reader: R) -> Result<Vec<Observation>, CorpusTextError> {
    let mut observations = Vec::new();
    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        observations.push(parse_observation(&line, index + 1)?);
    }
    Ok(observations)
}

pub fn to_text(corpus: &ProductCorpus) -> Result<String, CorpusTextError> {
    let mut buffer = Vec::new();
    write_corpus(corpus, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| CorpusTextError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

pub fn from_text(text: &str) -> Result<ProductCorpus, CorpusTextError> {
    Ok(ProductCorpus::from_observations(read_observations(text.as_bytes())?))
}

pub fn save_to_file(corpus: &ProductCorpus, path: impl AsRef<Path>) -> Result<(), CorpusTextError> {
    let path = path.as_ref();
    info!("Saving {} observations to {}", corpus.len(), path.display());
    write_corpus(corpus, BufWriter::new(File::create(path)?))
}

pub fn load_from_file(path: impl AsRef<Path>) -> Result<ProductCorpus, CorpusTextError> {
    let observations = read_observations(File::open(path)?)?;
    Ok(ProductCorpus::from_observations(observations))
}
