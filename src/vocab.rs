use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use log::*;

use crate::normalize::Tokens;
use crate::Error;

pub const PAD_ID: u32 = 0;
pub const OOV_ID: u32 = 1;
pub const OOV_TOKEN: &str = "<OOV>";

/// Characters the Keras text tokenizer treats as separators.
pub const FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// Splits normalized tokens into vocabulary words the way the Keras
/// tokenizer does: lowercase, filter characters become separators, empty
/// pieces are dropped. `"sunny."` keys as `"sunny"`.
pub fn words(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .flat_map(|token| {
            token
                .to_lowercase()
                .split(|c: char| c.is_whitespace() || FILTERS.contains(c))
                .filter(|word| !word.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// What an unknown token turns into.
///
/// `Padding` maps it to the padding id, so an unknown word and an empty slot
/// look the same to the model. `Skip` drops it before padding. `Reserved`
/// gives it a dedicated id and numbers words from 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OovPolicy {
    Padding,
    Skip,
    Reserved,
}

impl Default for OovPolicy {
    fn default() -> Self {
        OovPolicy::Padding
    }
}

impl FromStr for OovPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "padding" => Ok(OovPolicy::Padding),
            "skip" => Ok(OovPolicy::Skip),
            "reserved" => Ok(OovPolicy::Reserved),
            other => Err(format!(
                "unknown oov policy {:?}, expected padding, skip or reserved",
                other
            )),
        }
    }
}

impl OovPolicy {
    fn first_word_id(self) -> u32 {
        match self {
            OovPolicy::Reserved => OOV_ID + 1,
            _ => PAD_ID + 1,
        }
    }
}

/// Always exactly `max_len` ids long when produced by [`encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSequence(Vec<u32>);

impl EncodedSequence {
    pub fn ids(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_all_padding(&self) -> bool {
        self.0.iter().all(|&id| id == PAD_ID)
    }
}

impl From<Vec<u32>> for EncodedSequence {
    fn from(ids: Vec<u32>) -> Self {
        Self(ids)
    }
}

/// Token to id mapping, frequency ranked. Read only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    word_index: HashMap<String, u32>,
    max_words: usize,
    oov: OovPolicy,
}

// Persisted form, readable by and from the Keras text tokenizer.
#[derive(Debug, Serialize, Deserialize)]
struct TokenizerArtifact {
    class_name: String,
    config: TokenizerArtifactConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenizerArtifactConfig {
    #[serde(default)]
    num_words: Option<usize>,
    #[serde(default)]
    oov_token: Option<String>,
    word_index: String,
}

impl Vocabulary {
    /// Ranks words by count across `texts`, ties going to the word seen
    /// first. Only ids below `max_words` are kept. Tokens are split with
    /// [`words`] first, so the result keys words like a Keras tokenizer.
    pub fn fit(texts: &[Tokens], max_words: usize, oov: OovPolicy) -> Result<Self, Error> {
        let first_id = oov.first_word_id();
        if max_words <= first_id as usize {
            return Err(Error::Configuration(format!(
                "max_words {} leaves no room for any word",
                max_words
            )));
        }

        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for word in texts.iter().flat_map(|text| words(text)) {
            let seen = counts.len();
            counts.entry(word).or_insert((0, seen)).0 += 1;
        }
        let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_b.cmp(count_a).then(first_a.cmp(first_b))
        });

        let mut word_index: HashMap<String, u32> = ranked
            .into_iter()
            .zip(first_id..)
            .take_while(|(_, id)| (*id as usize) < max_words)
            .map(|((word, _), id)| (word, id))
            .collect();
        if oov == OovPolicy::Reserved {
            word_index.insert(OOV_TOKEN.to_string(), OOV_ID);
        }
        debug!("Fitted vocabulary of {} words from {} texts", word_index.len(), texts.len());

        Ok(Self {
            word_index,
            max_words,
            oov,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P, max_words: usize, oov: OovPolicy) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read vocabulary {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw, max_words, oov)
    }

    pub fn from_json(raw: &str, max_words: usize, oov: OovPolicy) -> Result<Self, Error> {
        let artifact: TokenizerArtifact = serde_json::from_str(raw)
            .map_err(|e| Error::Configuration(format!("vocabulary artifact malformed: {}", e)))?;
        let full_index: HashMap<String, u32> = serde_json::from_str(&artifact.config.word_index)
            .map_err(|e| Error::Configuration(format!("vocabulary word index malformed: {}", e)))?;

        if let Some(num_words) = artifact.config.num_words {
            if num_words != max_words {
                warn!(
                    "Vocabulary was saved with {} words but {} are configured, using {}",
                    num_words, max_words, max_words
                );
            }
        }

        match (oov, artifact.config.oov_token.as_deref()) {
            (OovPolicy::Reserved, Some(token)) if full_index.get(token) == Some(&OOV_ID) => {}
            (OovPolicy::Reserved, _) => {
                return Err(Error::Configuration(format!(
                    "reserved oov policy needs an oov token with id {} in the vocabulary",
                    OOV_ID
                )));
            }
            (_, Some(token)) => {
                warn!("Vocabulary has oov token {:?} but the policy is {:?}", token, oov);
            }
            (_, None) => {}
        }

        let word_index: HashMap<String, u32> = full_index
            .into_iter()
            .filter(|(_, id)| *id != PAD_ID && (*id as usize) < max_words)
            .collect();

        Ok(Self {
            word_index,
            max_words,
            oov,
        })
    }

    pub fn to_json(&self) -> Result<String, Error> {
        let ordered: BTreeMap<&str, u32> = self
            .word_index
            .iter()
            .map(|(word, id)| (word.as_str(), *id))
            .collect();
        let artifact = TokenizerArtifact {
            class_name: "Tokenizer".to_string(),
            config: TokenizerArtifactConfig {
                num_words: Some(self.max_words),
                oov_token: match self.oov {
                    OovPolicy::Reserved => Some(OOV_TOKEN.to_string()),
                    _ => None,
                },
                word_index: serde_json::to_string(&ordered)?,
            },
        };
        Ok(serde_json::to_string_pretty(&artifact)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.word_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_index.is_empty()
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }

    pub fn oov(&self) -> OovPolicy {
        self.oov
    }

    pub fn get(&self, token: &str) -> Option<u32> {
        self.word_index.get(token).copied()
    }

    /// One past the largest id this vocabulary can emit.
    pub fn id_bound(&self) -> usize {
        let largest = self.word_index.values().copied().max().unwrap_or(PAD_ID);
        largest as usize + 1
    }

    fn id_for(&self, token: &str) -> Option<u32> {
        match (self.get(token), self.oov) {
            (Some(id), _) => Some(id),
            (None, OovPolicy::Padding) => Some(PAD_ID),
            (None, OovPolicy::Skip) => None,
            (None, OovPolicy::Reserved) => Some(OOV_ID),
        }
    }
}

/// Splits tokens with [`words`], looks every word up and fixes the result to
/// exactly `max_len` ids. Long sequences lose their oldest ids, short ones
/// are padded at the front.
pub fn encode(tokens: &[String], vocab: &Vocabulary, max_len: usize) -> Result<EncodedSequence, Error> {
    if vocab.is_empty() {
        return Err(Error::Configuration("vocabulary is empty".to_string()));
    }
    if max_len == 0 {
        return Err(Error::Configuration("max_len must be positive".to_string()));
    }

    let ids: Vec<u32> = words(tokens).iter().filter_map(|word| vocab.id_for(word)).collect();
    let kept = &ids[ids.len().saturating_sub(max_len)..];

    let mut padded = vec![PAD_ID; max_len - kept.len()];
    padded.extend_from_slice(kept);
    Ok(EncodedSequence(padded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Tokens {
        text.split_whitespace().map(String::from).collect()
    }

    fn corpus() -> Vec<Tokens> {
        vec![
            tokens("happi day sunni"),
            tokens("bad day mood"),
            tokens("happi day"),
        ]
    }

    #[test]
    fn ranks_by_count_then_first_seen() {
        let vocab = Vocabulary::fit(&corpus(), 100, OovPolicy::Padding).unwrap();
        assert_eq!(vocab.get("day"), Some(1));
        assert_eq!(vocab.get("happi"), Some(2));
        assert_eq!(vocab.get("sunni"), Some(3));
        assert_eq!(vocab.get("bad"), Some(4));
        assert_eq!(vocab.get("mood"), Some(5));
        assert_eq!(vocab.id_bound(), 6);
    }

    #[test]
    fn caps_ids_below_max_words() {
        let vocab = Vocabulary::fit(&corpus(), 3, OovPolicy::Padding).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.get("sunni"), None);
    }

    #[test]
    fn reserved_policy_numbers_words_from_two() {
        let vocab = Vocabulary::fit(&corpus(), 100, OovPolicy::Reserved).unwrap();
        assert_eq!(vocab.get(OOV_TOKEN), Some(OOV_ID));
        assert_eq!(vocab.get("day"), Some(2));
    }

    #[test]
    fn max_words_too_small() {
        assert!(matches!(
            Vocabulary::fit(&corpus(), 1, OovPolicy::Padding),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn pads_at_the_front() {
        let vocab = Vocabulary::fit(&corpus(), 100, OovPolicy::Padding).unwrap();
        let encoded = encode(&tokens("happi day"), &vocab, 5).unwrap();
        assert_eq!(encoded.ids(), &[0, 0, 0, 2, 1]);
    }

    #[test]
    fn truncates_from_the_front() {
        let vocab = Vocabulary::fit(&corpus(), 100, OovPolicy::Padding).unwrap();
        let encoded = encode(&tokens("mood bad sunni happi day"), &vocab, 3).unwrap();
        assert_eq!(encoded.ids(), &[3, 2, 1]);
    }

    #[test]
    fn empty_tokens_encode_to_all_padding() {
        let vocab = Vocabulary::fit(&corpus(), 100, OovPolicy::Padding).unwrap();
        let encoded = encode(&[], &vocab, crate::MAX_LEN).unwrap();
        assert_eq!(encoded.len(), crate::MAX_LEN);
        assert!(encoded.is_all_padding());
    }

    #[test]
    fn unknown_tokens_follow_the_policy() {
        let text = tokens("happi unseen day");

        let vocab = Vocabulary::fit(&corpus(), 100, OovPolicy::Padding).unwrap();
        assert_eq!(encode(&text, &vocab, 4).unwrap().ids(), &[0, 2, 0, 1]);

        let vocab = Vocabulary::fit(&corpus(), 100, OovPolicy::Skip).unwrap();
        assert_eq!(encode(&text, &vocab, 4).unwrap().ids(), &[0, 0, 2, 1]);

        let vocab = Vocabulary::fit(&corpus(), 100, OovPolicy::Reserved).unwrap();
        assert_eq!(encode(&text, &vocab, 4).unwrap().ids(), &[0, 3, 1, 2]);
    }

    #[test]
    fn empty_vocabulary_is_a_configuration_error() {
        let vocab = Vocabulary::fit(&[], 100, OovPolicy::Padding).unwrap();
        assert!(matches!(
            encode(&tokens("happi"), &vocab, 10),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn reads_keras_tokenizer_json() {
        let raw = r##"{
            "class_name": "Tokenizer",
            "config": {
                "num_words": 41157,
                "filters": "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n",
                "lower": true,
                "oov_token": null,
                "word_index": "{\"day\": 1, \"happi\": 2, \"sunni\": 3}"
            }
        }"##;
        let vocab = Vocabulary::from_json(raw, 3, OovPolicy::Padding).unwrap();
        assert_eq!(vocab.get("day"), Some(1));
        assert_eq!(vocab.get("happi"), Some(2));
        assert_eq!(vocab.get("sunni"), None);
    }

    #[test]
    fn punctuation_splits_like_keras() {
        let split = words(&tokens("sunny. Panic!! well-known @ ..."));
        assert_eq!(split, vec!["sunny", "panic", "well", "known"]);
    }

    #[test]
    fn keras_vocabulary_matches_punctuated_tokens() {
        let raw = r##"{
            "class_name": "Tokenizer",
            "config": {
                "num_words": 41157,
                "oov_token": null,
                "word_index": "{\"sunny\": 1, \"happi\": 2, \"day\": 3}"
            }
        }"##;
        let vocab = Vocabulary::from_json(raw, 41157, OovPolicy::Padding).unwrap();
        let normalizer = crate::normalize::Normalizer::new().unwrap();
        let tokens = normalizer.normalize("Today I am happy as day is sunny.");
        assert_eq!(encode(&tokens, &vocab, 6).unwrap().ids(), &[0, 0, 0, 2, 3, 1]);
    }

    #[test]
    fn fitted_and_keras_vocabularies_key_words_alike() {
        let vocab = Vocabulary::fit(&[tokens("sunny. day, sunny")], 100, OovPolicy::Padding).unwrap();
        assert_eq!(vocab.get("sunny"), Some(1));
        assert_eq!(vocab.get("sunny."), None);
        assert_eq!(vocab.get("day"), Some(2));
    }

    #[test]
    fn reserved_policy_needs_an_oov_token() {
        let vocab = Vocabulary::fit(&corpus(), 100, OovPolicy::Padding).unwrap();
        let raw = vocab.to_json().unwrap();
        assert!(matches!(
            Vocabulary::from_json(&raw, 100, OovPolicy::Reserved),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn survives_a_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        let vocab = Vocabulary::fit(&corpus(), 100, OovPolicy::Reserved).unwrap();
        vocab.save(&path).unwrap();
        let loaded = Vocabulary::load(&path, 100, OovPolicy::Reserved).unwrap();
        assert_eq!(loaded, vocab);
    }

    #[test]
    fn missing_artifact_is_a_configuration_error() {
        assert!(matches!(
            Vocabulary::load("/nonexistent/vocab.json", 100, OovPolicy::Padding),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("skip".parse::<OovPolicy>(), Ok(OovPolicy::Skip));
        assert!("zero".parse::<OovPolicy>().is_err());
    }
}
