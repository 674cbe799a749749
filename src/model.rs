use serde::{Deserialize, Serialize};

use std::path::Path;

use log::*;

use crate::vocab::{EncodedSequence, PAD_ID};
use crate::Error;

/// Anything that turns an encoded sequence into one probability per label.
pub trait SequenceClassifier: Send + Sync {
    /// Ids at or above this bound cannot be scored.
    fn vocab_size(&self) -> usize;

    fn num_labels(&self) -> usize;

    fn probabilities(&self, input: &EncodedSequence) -> Result<Vec<f32>, Error>;
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|logit| (logit - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingBagArtifact {
    vocab_size: usize,
    embedding_dim: usize,
    embeddings: Vec<Vec<f32>>,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

/// Mean of the embeddings of every non padding id, then one dense layer.
/// An all padding input scores as a zero vector, so the bias decides.
#[derive(Debug, Clone)]
pub struct EmbeddingBagModel {
    embedding_dim: usize,
    embeddings: Vec<Vec<f32>>,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl EmbeddingBagModel {
    pub fn new(
        embeddings: Vec<Vec<f32>>,
        weights: Vec<Vec<f32>>,
        bias: Vec<f32>,
    ) -> Result<Self, Error> {
        let embedding_dim = embeddings.first().map(Vec::len).unwrap_or(0);
        if embedding_dim == 0 {
            return Err(Error::ModelLoad("embedding table is empty".to_string()));
        }
        if let Some(row) = embeddings.iter().position(|row| row.len() != embedding_dim) {
            return Err(Error::ModelLoad(format!(
                "embedding row {} does not have {} columns",
                row, embedding_dim
            )));
        }
        if weights.is_empty() || weights.len() != bias.len() {
            return Err(Error::ModelLoad(format!(
                "{} weight rows for {} biases",
                weights.len(),
                bias.len()
            )));
        }
        if let Some(row) = weights.iter().position(|row| row.len() != embedding_dim) {
            return Err(Error::ModelLoad(format!(
                "weight row {} does not have {} columns",
                row, embedding_dim
            )));
        }
        let finite = embeddings
            .iter()
            .chain(weights.iter())
            .flatten()
            .chain(bias.iter())
            .all(|value| value.is_finite());
        if !finite {
            return Err(Error::ModelLoad("parameters contain non finite values".to_string()));
        }

        Ok(Self {
            embedding_dim,
            embeddings,
            weights,
            bias,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::ModelLoad(format!("cannot read model {}: {}", path.display(), e))
        })?;
        let artifact: EmbeddingBagArtifact = serde_json::from_str(&raw).map_err(|e| {
            Error::ModelLoad(format!("model {} malformed: {}", path.display(), e))
        })?;
        if artifact.vocab_size != artifact.embeddings.len() {
            return Err(Error::ModelLoad(format!(
                "model declares {} ids but has {} embedding rows",
                artifact.vocab_size,
                artifact.embeddings.len()
            )));
        }
        let model = Self::new(artifact.embeddings, artifact.weights, artifact.bias)?;
        if model.embedding_dim != artifact.embedding_dim {
            return Err(Error::ModelLoad(format!(
                "model declares {} dimensions but has {}",
                artifact.embedding_dim, model.embedding_dim
            )));
        }
        info!(
            "Loaded embedding bag model: {} ids, {} dimensions, {} labels",
            model.vocab_size(),
            model.embedding_dim,
            model.num_labels()
        );
        Ok(model)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let artifact = EmbeddingBagArtifact {
            vocab_size: self.embeddings.len(),
            embedding_dim: self.embedding_dim,
            embeddings: self.embeddings.clone(),
            weights: self.weights.clone(),
            bias: self.bias.clone(),
        };
        std::fs::write(path, serde_json::to_string(&artifact)?)?;
        Ok(())
    }

    fn pooled(&self, input: &EncodedSequence) -> Result<Vec<f32>, Error> {
        let mut pooled = vec![0.0f32; self.embedding_dim];
        let mut count = 0usize;
        for &id in input.ids().iter().filter(|&&id| id != PAD_ID) {
            let row = self.embeddings.get(id as usize).ok_or_else(|| {
                Error::Inference(format!(
                    "id {} outside an embedding table of {}",
                    id,
                    self.embeddings.len()
                ))
            })?;
            for (acc, value) in pooled.iter_mut().zip(row) {
                *acc += value;
            }
            count += 1;
        }
        if count > 0 {
            for value in pooled.iter_mut() {
                *value /= count as f32;
            }
        }
        Ok(pooled)
    }
}

impl SequenceClassifier for EmbeddingBagModel {
    fn vocab_size(&self) -> usize {
        self.embeddings.len()
    }

    fn num_labels(&self) -> usize {
        self.bias.len()
    }

    fn probabilities(&self, input: &EncodedSequence) -> Result<Vec<f32>, Error> {
        let pooled = self.pooled(input)?;
        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| row.iter().zip(&pooled).map(|(w, x)| w * x).sum::<f32>() + bias)
            .collect();
        Ok(softmax(&logits))
    }
}

#[cfg(feature = "torch")]
pub use self::torch::TorchModel;

#[cfg(feature = "torch")]
mod torch {
    use std::convert::TryFrom;
    use std::path::Path;
    use std::sync::Mutex;

    use log::*;
    use tch::{CModule, Device, Kind, Tensor};

    use super::SequenceClassifier;
    use crate::vocab::EncodedSequence;
    use crate::Error;

    /// TorchScript module taking `[1, max_len]` int64 ids, giving `[1, labels]` logits.
    pub struct TorchModel {
        module: Mutex<CModule>,
        device: Device,
        vocab_size: usize,
        num_labels: usize,
    }

    impl TorchModel {
        pub fn load<P: AsRef<Path>>(path: P, vocab_size: usize, num_labels: usize) -> Result<Self, Error> {
            let path = path.as_ref();
            let device = Device::cuda_if_available();
            let module = CModule::load_on_device(path, device).map_err(|e| {
                Error::ModelLoad(format!("cannot load torchscript {}: {}", path.display(), e))
            })?;
            info!("Loaded torchscript model {} on {:?}", path.display(), device);
            Ok(Self {
                module: Mutex::new(module),
                device,
                vocab_size,
                num_labels,
            })
        }
    }

    impl SequenceClassifier for TorchModel {
        fn vocab_size(&self) -> usize {
            self.vocab_size
        }

        fn num_labels(&self) -> usize {
            self.num_labels
        }

        fn probabilities(&self, input: &EncodedSequence) -> Result<Vec<f32>, Error> {
            let ids: Vec<i64> = input.ids().iter().map(|&id| i64::from(id)).collect();
            let batch = Tensor::from_slice(&ids)
                .view([1, ids.len() as i64])
                .to_device(self.device);
            let module = self
                .module
                .lock()
                .map_err(|_| Error::Inference("torch module lock poisoned".to_string()))?;
            let logits = tch::no_grad(|| module.forward_ts(&[batch]))
                .map_err(|e| Error::Inference(format!("torch forward failed: {}", e)))?;
            let probabilities = logits
                .softmax(-1, Kind::Float)
                .to_device(Device::Cpu)
                .view([-1]);
            Vec::<f32>::try_from(&probabilities)
                .map_err(|e| Error::Inference(format!("torch output unreadable: {}", e)))
        }
    }
}
