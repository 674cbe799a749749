//! Rule based suffix stripping (Porter), with the usual extensions for short
//! words and a handful of irregular forms.

const IRREGULAR_FORMS: &[(&str, &str)] = &[
    ("skies", "sky"),
    ("sky", "sky"),
    ("dying", "die"),
    ("lying", "lie"),
    ("tying", "tie"),
    ("news", "news"),
    ("innings", "inning"),
    ("inning", "inning"),
    ("outings", "outing"),
    ("outing", "outing"),
    ("cannings", "canning"),
    ("canning", "canning"),
    ("howe", "howe"),
    ("proceed", "proceed"),
    ("exceed", "exceed"),
    ("succeed", "succeed"),
];

const STEP2_RULES: &[(&str, &str)] = &[
    ("ational", "ate"),
    ("tional", "tion"),
    ("enci", "ence"),
    ("anci", "ance"),
    ("izer", "ize"),
    ("bli", "ble"),
    ("entli", "ent"),
    ("eli", "e"),
    ("ousli", "ous"),
    ("ization", "ize"),
    ("ation", "ate"),
    ("ator", "ate"),
    ("alism", "al"),
    ("iveness", "ive"),
    ("fulness", "ful"),
    ("ousness", "ous"),
    ("aliti", "al"),
    ("iviti", "ive"),
    ("biliti", "ble"),
    ("fulli", "ful"),
    ("lessli", "less"),
    ("logi", "log"),
];

const STEP3_RULES: &[(&str, &str)] = &[
    ("icate", "ic"),
    ("ative", ""),
    ("alize", "al"),
    ("iciti", "ic"),
    ("ical", "ic"),
    ("ful", ""),
    ("ness", ""),
];

const STEP4_RULES: &[(&str, &str)] = &[
    ("al", ""),
    ("ance", ""),
    ("ence", ""),
    ("er", ""),
    ("ic", ""),
    ("able", ""),
    ("ible", ""),
    ("ant", ""),
    ("ement", ""),
    ("ment", ""),
    ("ent", ""),
    ("ion", ""),
    ("ou", ""),
    ("ism", ""),
    ("ate", ""),
    ("iti", ""),
    ("ous", ""),
    ("ive", ""),
    ("ize", ""),
];

/// Deterministic stemmer: the same token always gives the same stem.
///
/// Output is lowercased. Stemming is not idempotent in general, `agreed`
/// becomes `agre` and a second pass turns that into `agr`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PorterStemmer;

impl PorterStemmer {
    pub fn new() -> Self {
        Self
    }

    pub fn stem(&self, token: &str) -> String {
        let lower = token.to_lowercase();
        if let Some((_, root)) = IRREGULAR_FORMS.iter().find(|(form, _)| *form == lower) {
            return root.to_string();
        }
        if lower.chars().count() <= 2 {
            return lower;
        }

        let mut word = Word::new(&lower);
        word.step1a();
        word.step1b();
        word.step1c();
        word.step2();
        word.step3();
        word.step4();
        word.step5a();
        word.step5b();
        word.into_string()
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

struct Word {
    chars: Vec<char>,
}

impl Word {
    fn new(word: &str) -> Self {
        Self {
            chars: word.chars().collect(),
        }
    }

    fn into_string(self) -> String {
        self.chars.into_iter().collect()
    }

    fn len(&self) -> usize {
        self.chars.len()
    }

    fn is_consonant(&self, i: usize) -> bool {
        match self.chars[i] {
            c if is_vowel(c) => false,
            'y' => {
                // A run of y alternates, starting as a consonant unless a
                // vowel comes before it.
                let mut first = i;
                while first > 0 && self.chars[first - 1] == 'y' {
                    first -= 1;
                }
                let leads = first == 0 || is_vowel(self.chars[first - 1]);
                leads == ((i - first) % 2 == 0)
            }
            _ => true,
        }
    }

    /// Consonant flags for the first `len` letters, in one forward pass.
    fn consonants(&self, len: usize) -> Vec<bool> {
        let mut flags: Vec<bool> = Vec::with_capacity(len);
        for (i, &c) in self.chars.iter().take(len).enumerate() {
            let consonant = match c {
                c if is_vowel(c) => false,
                'y' => i == 0 || !flags[i - 1],
                _ => true,
            };
            flags.push(consonant);
        }
        flags
    }

    /// Number of vowel-consonant runs in the first `len` letters.
    fn measure(&self, len: usize) -> usize {
        let flags = self.consonants(len);
        flags
            .windows(2)
            .filter(|pair| !pair[0] && pair[1])
            .count()
    }

    fn has_vowel(&self, len: usize) -> bool {
        self.consonants(len).iter().any(|consonant| !consonant)
    }

    fn ends_with_double_consonant(&self, len: usize) -> bool {
        len >= 2 && self.chars[len - 1] == self.chars[len - 2] && self.is_consonant(len - 1)
    }

    fn ends_cvc(&self, len: usize) -> bool {
        if len >= 3 {
            self.is_consonant(len - 3)
                && !self.is_consonant(len - 2)
                && self.is_consonant(len - 1)
                && !matches!(self.chars[len - 1], 'w' | 'x' | 'y')
        } else if len == 2 {
            !self.is_consonant(0) && self.is_consonant(1)
        } else {
            false
        }
    }

    fn ends_with(&self, suffix: &str) -> bool {
        let suffix: Vec<char> = suffix.chars().collect();
        self.chars.ends_with(&suffix)
    }

    fn stem_len(&self, suffix: &str) -> usize {
        self.len() - suffix.chars().count()
    }

    fn replace(&mut self, stem_len: usize, replacement: &str) {
        self.chars.truncate(stem_len);
        self.chars.extend(replacement.chars());
    }

    /// Only the first listed suffix that matches is considered. When its
    /// condition fails the word is left alone.
    fn apply_first<F>(&mut self, rules: &[(&str, &str)], condition: F) -> bool
    where
        F: Fn(&Word, &str, usize) -> bool,
    {
        for &(suffix, replacement) in rules {
            if self.ends_with(suffix) {
                let stem = self.stem_len(suffix);
                if condition(self, suffix, stem) {
                    self.replace(stem, replacement);
                }
                return true;
            }
        }
        false
    }

    fn step1a(&mut self) {
        if self.ends_with("ies") && self.len() == 4 {
            let stem = self.stem_len("ies");
            self.replace(stem, "ie");
            return;
        }
        self.apply_first(
            &[("sses", "ss"), ("ies", "i"), ("ss", "ss"), ("s", "")],
            |_, _, _| true,
        );
    }

    fn step1b(&mut self) {
        if self.ends_with("ied") {
            let stem = self.stem_len("ied");
            let replacement = if self.len() == 4 { "ie" } else { "i" };
            self.replace(stem, replacement);
            return;
        }
        if self.ends_with("eed") {
            let stem = self.stem_len("eed");
            if self.measure(stem) > 0 {
                self.replace(stem, "ee");
            }
            return;
        }
        for &suffix in &["ed", "ing"] {
            if self.ends_with(suffix) {
                let stem = self.stem_len(suffix);
                if self.has_vowel(stem) {
                    self.chars.truncate(stem);
                    self.tidy_after_ed_ing();
                }
                return;
            }
        }
    }

    fn tidy_after_ed_ing(&mut self) {
        let len = self.len();
        if self.ends_with("at") || self.ends_with("bl") || self.ends_with("iz") {
            self.chars.push('e');
        } else if self.ends_with_double_consonant(len)
            && !matches!(self.chars[len - 1], 'l' | 's' | 'z')
        {
            self.chars.pop();
        } else if self.measure(len) == 1 && self.ends_cvc(len) {
            self.chars.push('e');
        }
    }

    fn step1c(&mut self) {
        let len = self.len();
        if len > 2 && self.chars[len - 1] == 'y' && self.is_consonant(len - 2) {
            self.chars[len - 1] = 'i';
        }
    }

    fn step2(&mut self) {
        if self.ends_with("alli") {
            let stem = self.stem_len("alli");
            if self.measure(stem) > 0 {
                self.replace(stem, "al");
                self.step2();
                return;
            }
        }
        self.apply_first(STEP2_RULES, |word, _, stem| word.measure(stem) > 0);
    }

    fn step3(&mut self) {
        self.apply_first(STEP3_RULES, |word, _, stem| word.measure(stem) > 0);
    }

    fn step4(&mut self) {
        self.apply_first(STEP4_RULES, |word, suffix, stem| {
            if word.measure(stem) <= 1 {
                return false;
            }
            if suffix == "ion" {
                stem > 0 && matches!(word.chars[stem - 1], 's' | 't')
            } else {
                true
            }
        });
    }

    fn step5a(&mut self) {
        if self.ends_with("e") {
            let stem = self.len() - 1;
            let m = self.measure(stem);
            if m > 1 || (m == 1 && !self.ends_cvc(stem)) {
                self.chars.truncate(stem);
            }
        }
    }

    fn step5b(&mut self) {
        let len = self.len();
        if self.ends_with("ll") && self.measure(len - 1) > 1 {
            self.chars.pop();
        }
    }
}
