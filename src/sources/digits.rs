use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, index};

use super::{GlyphSource, LineSource, SourceCommon, random_chars};
use crate::config::{DigitsConfig, GeneratorKind};

const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
const NONZERO: [char; 9] = ['1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// Digit runs, optionally broken by separators, and student-ID style numbers.
pub struct DigitSource {
    common: SourceCommon,
    config: DigitsConfig,
    separators: Vec<char>,
}

impl DigitSource {
    pub(crate) fn new(common: SourceCommon, config: DigitsConfig) -> Self {
        let separators = config.separator_chars.chars().collect();
        Self {
            common,
            config,
            separators,
        }
    }

    fn digit_run(&self, rng: &mut StdRng, length: usize) -> String {
        let digits = random_chars(rng, &DIGITS, length);
        if !self.config.add_separators || length <= 3 || self.separators.is_empty() {
            return digits;
        }
        let count = rng.random_range(1..=2.min(length - 1));
        let mut positions = index::sample(rng, length - 1, count).into_vec();
        positions.iter_mut().for_each(|position| *position += 1);

        let mut result = String::with_capacity(length + count);
        for (i, digit) in digits.chars().enumerate() {
            if positions.contains(&i) {
                if let Some(separator) = self.separators.choose(rng) {
                    result.push(*separator);
                }
            }
            result.push(digit);
        }
        result
    }

    fn student_id(&self, rng: &mut StdRng) -> String {
        let length = self.config.student_id_length;
        match rng.random_range(0..3) {
            0 => random_chars(rng, &NONZERO, length),
            1 => {
                let year = rng.random_range(18..=24);
                format!("20{}{}", year, random_chars(rng, &DIGITS, length - 4))
            }
            _ => {
                let lead = random_chars(rng, &NONZERO, 1);
                format!("{}{}", lead, random_chars(rng, &DIGITS, length - 1))
            }
        }
    }
}

impl LineSource for DigitSource {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Digits
    }

    fn language(&self) -> &str {
        &self.common.language
    }

    fn produce_text(&self, index: u64, rng: &mut StdRng) -> Option<String> {
        if let Some(corpus) = &self.common.corpus {
            return corpus.next_text(index, rng);
        }
        if rng.random_bool(self.config.student_id_probability) {
            return Some(self.student_id(rng));
        }
        let length = self.common.sample_length(rng);
        Some(self.digit_run(rng, length))
    }

    fn resolve_glyph_source(&self, rng: &mut StdRng) -> GlyphSource<'_> {
        self.common.backend.select(rng)
    }
}
