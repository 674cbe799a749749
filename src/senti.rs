use serde::Serialize;

use std::fmt;

use log::*;

use crate::config::{Backend, Config};
use crate::model::{EmbeddingBagModel, SequenceClassifier};
use crate::vocab::EncodedSequence;
use crate::Error;

/// Output classes, in the order the model scores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Sentiment {
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Positive")]
    Positive,
    #[serde(rename = "Extremely Negative")]
    ExtremelyNegative,
    #[serde(rename = "Extremely Positive")]
    ExtremelyPositive,
    #[serde(rename = "Negative")]
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 5] = [
        Sentiment::Neutral,
        Sentiment::Positive,
        Sentiment::ExtremelyNegative,
        Sentiment::ExtremelyPositive,
        Sentiment::Negative,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Neutral => "Neutral",
            Sentiment::Positive => "Positive",
            Sentiment::ExtremelyNegative => "Extremely Negative",
            Sentiment::ExtremelyPositive => "Extremely Positive",
            Sentiment::Negative => "Negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Sentiment,
    pub score: f32,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} & {}", self.label, self.score)
    }
}

pub struct Senti {
    model: Box<dyn SequenceClassifier>,
    max_len: usize,
}

impl Senti {
    pub fn new(model: Box<dyn SequenceClassifier>, max_len: usize) -> Result<Self, Error> {
        if model.num_labels() != Sentiment::ALL.len() {
            return Err(Error::ModelLoad(format!(
                "model scores {} labels, expected {}",
                model.num_labels(),
                Sentiment::ALL.len()
            )));
        }
        if max_len == 0 {
            return Err(Error::Configuration("max_len must be positive".to_string()));
        }
        Ok(Self { model, max_len })
    }

    pub fn load(config: &Config) -> Result<Self, Error> {
        let model: Box<dyn SequenceClassifier> = match config.backend {
            Backend::EmbeddingBag => Box::new(EmbeddingBagModel::load(&config.model_path)?),
            #[cfg(feature = "torch")]
            Backend::Torchscript => Box::new(crate::model::TorchModel::load(
                &config.model_path,
                config.max_words,
                Sentiment::ALL.len(),
            )?),
            #[cfg(not(feature = "torch"))]
            Backend::Torchscript => {
                return Err(Error::ModelLoad(
                    "torchscript models need the torch feature".to_string(),
                ))
            }
        };
        Self::new(model, config.max_len)
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn vocab_size(&self) -> usize {
        self.model.vocab_size()
    }

    pub fn classify(&self, encoded: &EncodedSequence) -> Result<Prediction, Error> {
        if encoded.len() != self.max_len {
            return Err(Error::Inference(format!(
                "sequence has {} ids, expected {}",
                encoded.len(),
                self.max_len
            )));
        }
        let vocab_size = self.model.vocab_size();
        if let Some(id) = encoded.ids().iter().find(|&&id| id as usize >= vocab_size) {
            return Err(Error::Inference(format!(
                "id {} is outside the model's {} ids",
                id, vocab_size
            )));
        }

        let probabilities = self.model.probabilities(encoded)?;
        if probabilities.len() != Sentiment::ALL.len() {
            return Err(Error::Inference(format!(
                "model gave {} scores, expected {}",
                probabilities.len(),
                Sentiment::ALL.len()
            )));
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(Error::Inference("model gave a non finite score".to_string()));
        }

        // First maximum wins so ties resolve the same way every time.
        let (index, score) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });
        let label = Sentiment::from_index(index)
            .ok_or_else(|| Error::Inference(format!("no label for output {}", index)))?;
        trace!("Scored {:?} as {} ({})", probabilities, label, score);

        Ok(Prediction {
            label,
            score: score.max(0.0).min(1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f32>);

    impl SequenceClassifier for Fixed {
        fn vocab_size(&self) -> usize {
            10
        }

        fn num_labels(&self) -> usize {
            5
        }

        fn probabilities(&self, _: &EncodedSequence) -> Result<Vec<f32>, Error> {
            Ok(self.0.clone())
        }
    }

    fn senti(scores: Vec<f32>) -> Senti {
        Senti::new(Box::new(Fixed(scores)), 4).unwrap()
    }

    fn seq(ids: &[u32]) -> EncodedSequence {
        ids.to_vec().into()
    }

    #[test]
    fn picks_the_highest_score() {
        let prediction = senti(vec![0.1, 0.1, 0.6, 0.1, 0.1])
            .classify(&seq(&[0, 0, 1, 2]))
            .unwrap();
        assert_eq!(prediction.label, Sentiment::ExtremelyNegative);
        assert!((prediction.score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn ties_go_to_the_first_label() {
        let prediction = senti(vec![0.2; 5]).classify(&seq(&[0, 0, 0, 0])).unwrap();
        assert_eq!(prediction.label, Sentiment::Neutral);
    }

    #[test]
    fn malformed_input_is_an_inference_error() {
        let senti = senti(vec![0.2; 5]);
        assert!(matches!(senti.classify(&seq(&[0, 0, 0])), Err(Error::Inference(_))));
        assert!(matches!(senti.classify(&seq(&[0, 0, 0, 11])), Err(Error::Inference(_))));
    }

    #[test]
    fn malformed_output_is_an_inference_error() {
        let input = seq(&[0, 0, 0, 1]);
        assert!(matches!(senti(vec![0.5, 0.5]).classify(&input), Err(Error::Inference(_))));
        assert!(matches!(
            senti(vec![f32::NAN, 0.1, 0.1, 0.1, 0.1]).classify(&input),
            Err(Error::Inference(_))
        ));
    }

    #[test]
    fn wrong_label_count_fails_to_load() {
        let model = crate::model::EmbeddingBagModel::new(vec![vec![1.0]], vec![vec![1.0]], vec![0.0]).unwrap();
        assert!(matches!(Senti::new(Box::new(model), 4), Err(Error::ModelLoad(_))));
    }

    #[test]
    fn formats_label_and_score() {
        let prediction = Prediction {
            label: Sentiment::ExtremelyPositive,
            score: 0.75,
        };
        assert_eq!(prediction.to_string(), "Extremely Positive & 0.75");
        assert_eq!(
            serde_json::to_string(&prediction).unwrap(),
            r#"{"label":"Extremely Positive","score":0.75}"#
        );
    }
}
