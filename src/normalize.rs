use regex::Regex;

use std::borrow::Cow;
use std::collections::HashSet;

use log::*;

use crate::stemmer::PorterStemmer;
use crate::stopwords;
use crate::Error;

/// `@` followed by any run of word characters, a lone `@` included.
pub const MENTION_PATTERN: &str = r"@\w*";

/// Ordered stems of one input. Order feeds the positional encoding.
pub type Tokens = Vec<String>;

pub struct Normalizer {
    mention: Regex,
    stemmer: PorterStemmer,
    stopwords: HashSet<String>,
}

impl Normalizer {
    pub fn new() -> Result<Self, Error> {
        Self::with_stopwords(stopwords::english())
    }

    pub fn with_stopwords(stopwords: HashSet<String>) -> Result<Self, Error> {
        Ok(Self {
            mention: Regex::new(MENTION_PATTERN)?,
            stemmer: PorterStemmer::new(),
            stopwords,
        })
    }

    pub fn strip_mentions<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.mention.replace_all(text, "")
    }

    /// Mentions are deleted, the rest is split on whitespace and stemmed, then
    /// stems found in the stopword set are dropped. The stopword check runs on
    /// the stem, so `was` (stem `wa`) survives while `is` does not.
    pub fn normalize(&self, text: &str) -> Tokens {
        let stripped = self.strip_mentions(text);
        let tokens: Tokens = stripped
            .split_whitespace()
            .map(|token| self.stemmer.stem(token))
            .filter(|stem| !self.stopwords.contains(stem))
            .collect();
        trace!("Normalized {:?} into {:?}", text, tokens);
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new().unwrap()
    }

    #[test]
    fn sunny_day() {
        let tokens = normalizer().normalize("Today I am happy as day is sunny.");
        assert_eq!(tokens, vec!["today", "happi", "day", "sunny."]);
    }

    #[test]
    fn empty_input_gives_no_tokens() {
        assert!(normalizer().normalize("").is_empty());
        assert!(normalizer().normalize("   \t\n").is_empty());
    }

    #[test]
    fn mentions_are_deleted_not_replaced() {
        let normalizer = normalizer();
        assert_eq!(normalizer.strip_mentions("hi @bob, meet @alice_99"), "hi , meet ");
        assert_eq!(normalizer.normalize("@bob running"), vec!["run"]);
        assert_eq!(normalizer.normalize("@bob"), Vec::<String>::new());
    }

    #[test]
    fn no_mention_survives() {
        let normalizer = normalizer();
        let inputs = ["a@b", "@@twice", "mail me@home now", "@ lone", "x@y@z"];
        for input in inputs.iter() {
            let joined = normalizer.normalize(input).join(" ");
            assert!(!joined.contains('@'), "{:?} left {:?}", input, joined);
        }
    }

    #[test]
    fn stopwords_match_the_stemmed_form() {
        let tokens = normalizer().normalize("it was this");
        assert_eq!(tokens, vec!["wa", "thi"]);
    }

    #[test]
    fn custom_stopwords() {
        let stop: HashSet<String> = vec!["day".to_string()].into_iter().collect();
        let normalizer = Normalizer::with_stopwords(stop).unwrap();
        assert_eq!(normalizer.normalize("the day"), vec!["the"]);
    }

    #[test]
    fn stable_on_already_normalized_text() {
        let normalizer = normalizer();
        let once = normalizer.normalize("Today I am happy as day is sunny");
        let twice = normalizer.normalize(&once.join(" "));
        assert_eq!(once, twice);
    }
}
