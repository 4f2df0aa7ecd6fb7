use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use super::{GlyphSource, LineSource, SourceCommon};
use crate::assets::GlyphAssetStore;
use crate::config::GeneratorKind;

const SPACE_PROBABILITY: f64 = 0.1;

/// Lines drawn only from characters that have handwritten assets.
pub struct HandwritingSource {
    common: SourceCommon,
    chars: Vec<char>,
}

impl HandwritingSource {
    pub(crate) fn new(common: SourceCommon, store: &dyn GlyphAssetStore) -> Self {
        let chars = store
            .characters()
            .into_iter()
            .filter(|ch| !ch.is_whitespace())
            .collect();
        Self { common, chars }
    }

    fn random_line(&self, rng: &mut StdRng, length: usize) -> String {
        let mut text = String::new();
        for i in 0..length {
            let after_space = text.ends_with(' ');
            if i > 0 && i + 1 < length && !after_space && rng.random_bool(SPACE_PROBABILITY) {
                text.push(' ');
                continue;
            }
            if let Some(ch) = self.chars.choose(rng) {
                text.push(*ch);
            }
        }
        text
    }
}

impl LineSource for HandwritingSource {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Handwriting
    }

    fn language(&self) -> &str {
        &self.common.language
    }

    fn produce_text(&self, index: u64, rng: &mut StdRng) -> Option<String> {
        if self.chars.is_empty() && self.common.corpus.is_none() {
            return None;
        }
        self.common
            .text_or(index, rng, |rng, length| self.random_line(rng, length))
    }

    fn resolve_glyph_source(&self, rng: &mut StdRng) -> GlyphSource<'_> {
        self.common.backend.select(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::{asset_backend, common};
    use crate::sources::GlyphBackend;
    use rand::SeedableRng;

    #[test]
    fn lines_use_only_stored_characters() {
        let backend = asset_backend("壹贰叁");
        let GlyphBackend::Assets { store, .. } = &backend else {
            panic!("asset backend expected");
        };
        let store = store.clone();
        let source = HandwritingSource::new(common(backend, 3, 8), store.as_ref());
        let mut rng = StdRng::seed_from_u64(13);
        for index in 0..40 {
            let text = source.produce_text(index, &mut rng).expect("text");
            assert_eq!(text.chars().count(), text.chars().count().clamp(3, 8));
            assert!(text.chars().all(|ch| ch == ' ' || "壹贰叁".contains(ch)));
            assert!(!text.starts_with(' ') && !text.ends_with(' '));
        }
    }

    #[test]
    fn spaces_never_repeat() {
        let backend = asset_backend("壹");
        let GlyphBackend::Assets { store, .. } = &backend else {
            panic!("asset backend expected");
        };
        let store = store.clone();
        let source = HandwritingSource::new(common(backend, 12, 24), store.as_ref());
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let length = rng.random_range(12..=24);
            let text = source.random_line(&mut rng, length);
            assert!(!text.contains("  "), "double space in {:?}", text);
            assert_eq!(text.chars().count(), length);
        }
    }
}
