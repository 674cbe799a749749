use err_derive::Error;

use std::time::Duration;

pub mod analyzer;
pub mod config;
pub mod model;
pub mod normalize;
pub mod senti;
pub mod service;
pub mod status;
pub mod stemmer;
pub mod stopwords;
pub mod vocab;

pub use self::analyzer::{Analyzer, Stage};
pub use self::config::Config;
pub use self::senti::{Prediction, Senti, Sentiment};

pub const MAX_WORDS: usize = 41157;
pub const MAX_LEN: usize = 217;
pub const RX_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum Error {
    #[error(display = "Configuration error: {}", _0)]
    Configuration(String),
    #[error(display = "Model failed to load: {}", _0)]
    ModelLoad(String),
    #[error(display = "Inference failed: {}", _0)]
    Inference(String),
    #[error(display = "Input rejected: {}", _0)]
    InvalidInput(String),
    #[error(display = "Request failed after {}: {}", stage, source)]
    Request {
        stage: Stage,
        #[error(source)]
        source: Box<Error>,
    },
    #[error(display = "A worker thread panicked")]
    WorkerPanicked,
    #[error(display = "Config file invalid")]
    ValidationError(#[error(source)] validator::ValidationErrors),
    #[error(display = "Config syntax invalid")]
    ConfigError(#[error(source)] toml::de::Error),
    #[error(display = "Cannot read or write file")]
    IoError(#[error(source)] std::io::Error),
    #[error(display = "Pattern invalid")]
    PatternError(#[error(source)] regex::Error),
    #[error(display = "Json invalid")]
    JsonError(#[error(source)] serde_json::Error),
    #[error(display = "Cannot set signal handler")]
    SignalError(#[error(source)] ctrlc::Error),
}

impl Error {
    /// Per request failures leave the process able to serve the next request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Inference(_) | Error::InvalidInput(_) | Error::Request { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn request_errors_chain_to_their_cause() {
        let err = Error::Request {
            stage: Stage::Encoded,
            source: Box::new(Error::Inference("no scores".to_string())),
        };
        let inner = err.source().map(|e| e.to_string());
        assert_eq!(inner.as_deref(), Some("Inference failed: no scores"));
    }
}
