use serde::Deserialize;
use validator::{Validate, ValidationError};
use validator_derive::Validate;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::vocab::OovPolicy;
use crate::{Error, MAX_LEN, MAX_WORDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    EmbeddingBag,
    Torchscript,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::EmbeddingBag
    }
}

#[derive(Debug, Deserialize, Validate, Clone)]
pub struct Config {
    #[validate(custom = "ensure_vocab_file")]
    pub vocab_path: String,

    #[validate(custom = "ensure_model_file")]
    pub model_path: String,

    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_max_len")]
    #[validate(range(min = 1))]
    pub max_len: usize,

    #[serde(default = "default_max_words")]
    #[validate(range(min = 3))]
    pub max_words: usize,

    #[serde(default)]
    pub oov: OovPolicy,

    #[serde(default = "default_max_input_chars")]
    #[validate(range(min = 1))]
    pub max_input_chars: usize,

    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 64))]
    pub workers: usize,

    #[serde(default = "default_request_timeout_ms")]
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,

    #[serde(default = "default_debug")]
    pub debug: bool,
}

fn default_max_len() -> usize {
    MAX_LEN
}

fn default_max_words() -> usize {
    MAX_WORDS
}

fn default_max_input_chars() -> usize {
    5000
}

fn default_workers() -> usize {
    2
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_debug() -> bool {
    false
}

fn ensure_vocab_file(vocab_path: &str) -> Result<(), ValidationError> {
    if PathBuf::from(vocab_path).is_file() {
        Ok(())
    } else {
        Err(ValidationError::new("Vocabulary file missing"))
    }
}

fn ensure_model_file(model_path: &str) -> Result<(), ValidationError> {
    if PathBuf::from(model_path).exists() {
        Ok(())
    } else {
        Err(ValidationError::new("Model file missing"))
    }
}

impl Config {
    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifacts() -> (tempfile::TempDir, String, String) {
        let dir = tempfile::tempdir().unwrap();
        let vocab = dir.path().join("vocab.json");
        let model = dir.path().join("model.json");
        std::fs::write(&vocab, "{}").unwrap();
        std::fs::write(&model, "{}").unwrap();
        let vocab = vocab.to_string_lossy().into_owned();
        let model = model.to_string_lossy().into_owned();
        (dir, vocab, model)
    }

    #[test]
    fn defaults_follow_the_reference_model() {
        let (_dir, vocab, model) = artifacts();
        let raw = format!("vocab_path = {:?}\nmodel_path = {:?}\n", vocab, model);
        let config = Config::from_toml(&raw).unwrap();
        assert_eq!(config.max_len, 217);
        assert_eq!(config.max_words, 41157);
        assert_eq!(config.oov, OovPolicy::Padding);
        assert_eq!(config.backend, Backend::EmbeddingBag);
        assert_eq!(config.workers, 2);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(!config.debug);
    }

    #[test]
    fn reads_every_field() {
        let (_dir, vocab, model) = artifacts();
        let raw = format!(
            "vocab_path = {:?}\nmodel_path = {:?}\nbackend = \"torchscript\"\nmax_len = 32\n\
             max_words = 100\noov = \"reserved\"\nmax_input_chars = 80\nworkers = 4\n\
             request_timeout_ms = 250\ndebug = true\n",
            vocab, model
        );
        let config = Config::from_toml(&raw).unwrap();
        assert_eq!(config.backend, Backend::Torchscript);
        assert_eq!(config.max_len, 32);
        assert_eq!(config.oov, OovPolicy::Reserved);
        assert_eq!(config.workers, 4);
        assert!(config.debug);
    }

    #[test]
    fn missing_artifacts_fail_validation() {
        let raw = "vocab_path = \"/nonexistent/vocab.json\"\nmodel_path = \"/nonexistent/model.json\"\n";
        assert!(matches!(Config::from_toml(raw), Err(Error::ValidationError(_))));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let (_dir, vocab, model) = artifacts();
        let raw = format!("vocab_path = {:?}\nmodel_path = {:?}\nworkers = 0\n", vocab, model);
        assert!(matches!(Config::from_toml(&raw), Err(Error::ValidationError(_))));
    }

    #[test]
    fn bad_syntax_is_a_config_error() {
        assert!(matches!(Config::from_toml("vocab_path = "), Err(Error::ConfigError(_))));
    }
}
