use std::fmt;
use std::sync::Arc;

use log::*;

use crate::config::Config;
use crate::normalize::Normalizer;
use crate::senti::{Prediction, Senti};
use crate::vocab::{self, Vocabulary};
use crate::Error;

/// How far a request got. Requests only move forward and stop at the first
/// failure or at `Returned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Normalized,
    Encoded,
    Scored,
    Returned,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Normalized => "normalized",
            Stage::Encoded => "encoded",
            Stage::Scored => "scored",
            Stage::Returned => "returned",
        };
        f.write_str(name)
    }
}

pub struct Analyzer {
    normalizer: Normalizer,
    vocab: Arc<Vocabulary>,
    senti: Senti,
    max_input_chars: usize,
}

impl Analyzer {
    pub fn new(normalizer: Normalizer, vocab: Arc<Vocabulary>, senti: Senti) -> Result<Self, Error> {
        if vocab.is_empty() {
            return Err(Error::Configuration("vocabulary is empty".to_string()));
        }
        if vocab.id_bound() > senti.vocab_size() {
            return Err(Error::ModelLoad(format!(
                "model scores {} ids but the vocabulary uses up to {}",
                senti.vocab_size(),
                vocab.id_bound() - 1
            )));
        }
        Ok(Self {
            normalizer,
            vocab,
            senti,
            max_input_chars: usize::MAX,
        })
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Loads everything a request needs. Any failure here is fatal.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let normalizer = Normalizer::new()?;
        let vocab = Vocabulary::load(&config.vocab_path, config.max_words, config.oov)?;
        info!("Loaded vocabulary of {} words", vocab.len());
        let senti = Senti::load(config)?;
        Ok(Self::new(normalizer, Arc::new(vocab), senti)?.with_max_input_chars(config.max_input_chars))
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn analyze(&self, raw: &str) -> Result<Prediction, Error> {
        let mut stage = Stage::Received;
        self.run(raw, &mut stage).map_err(|source| {
            debug!("Request failed after {}: {}", stage, source);
            Error::Request {
                stage,
                source: Box::new(source),
            }
        })
    }

    fn run(&self, raw: &str, stage: &mut Stage) -> Result<Prediction, Error> {
        let chars = raw.chars().count();
        if chars > self.max_input_chars {
            return Err(Error::InvalidInput(format!(
                "{} characters, at most {} allowed",
                chars, self.max_input_chars
            )));
        }

        let tokens = self.normalizer.normalize(raw);
        *stage = Stage::Normalized;

        let encoded = vocab::encode(&tokens, &self.vocab, self.senti.max_len())?;
        *stage = Stage::Encoded;

        let prediction = self.senti.classify(&encoded)?;
        *stage = Stage::Scored;

        debug!("{} tokens scored {}", tokens.len(), prediction);
        *stage = Stage::Returned;
        Ok(prediction)
    }
}
