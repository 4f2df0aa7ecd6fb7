use rand::Rng;
use rand::distr::{Distribution, weighted::WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use super::{GlyphSource, LineSource, SourceCommon, random_chars};
use crate::config::{GeneratorKind, TextConfig};

const LETTERS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const PUNCTUATION: &str = ".,!?;:-()[]{}\"'";

const COMMON_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old", "see",
    "two", "way", "who", "boy", "did", "its", "let", "put", "say", "she", "too", "use", "word",
    "work", "first", "would", "there", "could", "water", "after", "where", "right", "think",
    "little", "world", "years", "still", "place", "young", "great", "never", "again", "school",
    "family", "important", "different", "another",
];

/// Latin-script lines: random characters, word sequences, or a mix of words,
/// numbers and punctuation.
pub struct AlphabeticSource {
    common: SourceCommon,
    charset: Vec<char>,
    letters: Vec<char>,
    digits: Vec<char>,
    punctuation: Vec<char>,
    words: Vec<String>,
}

impl AlphabeticSource {
    pub(crate) fn new(common: SourceCommon, config: TextConfig) -> Self {
        let mut charset: Vec<char> = LETTERS.chars().collect();
        if config.include_numbers {
            charset.extend(DIGITS.chars());
        }
        if config.include_punctuation {
            charset.extend(PUNCTUATION.chars());
        }
        let words = if config.word_list.is_empty() {
            COMMON_WORDS.iter().map(|word| word.to_string()).collect()
        } else {
            config.word_list
        };
        Self {
            common,
            charset,
            letters: LETTERS.chars().collect(),
            digits: DIGITS.chars().collect(),
            punctuation: PUNCTUATION.chars().collect(),
            words,
        }
    }

    fn random_words(&self, rng: &mut StdRng, target: usize) -> String {
        let mut result = String::new();
        let mut length = 0;
        while length < target {
            let Some(word) = self.words.choose(rng) else {
                break;
            };
            let word_len = word.chars().count();
            if length + word_len <= target {
                result.push_str(word);
                length += word_len;
                if length + 1 < target {
                    result.push(' ');
                    length += 1;
                }
            } else {
                result.extend(word.chars().take(target - length));
                break;
            }
        }
        result
    }

    fn mixed(&self, rng: &mut StdRng, target: usize) -> String {
        let weights = [0.7, 0.2, 0.1];
        let Ok(picker) = WeightedIndex::new(weights) else {
            return random_chars(rng, &self.charset, target);
        };
        let mut result = String::new();
        let mut length = 0;
        while length < target {
            let remaining = target - length;
            match picker.sample(rng) {
                0 => {
                    let word_len = rng.random_range(remaining.min(2)..=remaining.min(8));
                    result.push_str(&random_chars(rng, &self.letters, word_len));
                    length += word_len;
                }
                1 => {
                    let num_len = rng.random_range(1..=remaining.min(4));
                    result.push_str(&random_chars(rng, &self.digits, num_len));
                    length += num_len;
                }
                _ => {
                    result.push_str(&random_chars(rng, &self.punctuation, 1));
                    length += 1;
                }
            }
            if length + 1 < target && rng.random_bool(0.3) {
                result.push(' ');
                length += 1;
            }
        }
        result.chars().take(target).collect()
    }
}

impl LineSource for AlphabeticSource {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Text
    }

    fn language(&self) -> &str {
        &self.common.language
    }

    fn produce_text(&self, index: u64, rng: &mut StdRng) -> Option<String> {
        self.common
            .text_or(index, rng, |rng, length| match rng.random_range(0..3) {
                0 => random_chars(rng, &self.charset, length),
                1 => self.random_words(rng, length),
                _ => self.mixed(rng, length),
            })
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }

    fn resolve_glyph_source(&self, rng: &mut StdRng) -> GlyphSource<'_> {
        self.common.backend.select(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::{asset_backend, common};
    use rand::SeedableRng;

    #[test]
    fn produced_text_respects_length_and_charset() {
        let source = AlphabeticSource::new(
            common(asset_backend(LETTERS), 3, 15),
            TextConfig {
                include_numbers: false,
                include_punctuation: false,
                word_list: Vec::new(),
            },
        );
        let mut rng = StdRng::seed_from_u64(21);
        for index in 0..60 {
            let text = source.produce_text(index, &mut rng).expect("text");
            assert!(text.chars().count() <= 15, "{}", text);
            assert!(!text.starts_with(' ') && !text.ends_with(' '));
        }
    }

    #[test]
    fn word_mode_uses_configured_words() {
        let source = AlphabeticSource::new(
            common(asset_backend(LETTERS), 3, 15),
            TextConfig {
                word_list: vec!["ab".to_string()],
                ..TextConfig::default()
            },
        );
        let mut rng = StdRng::seed_from_u64(4);
        let text = source.random_words(&mut rng, 8);
        assert_eq!(text, "ab ab ab");
    }
}
