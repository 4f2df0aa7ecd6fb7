mod chinese;
mod digits;
mod form;
mod handwriting;
mod text;

use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::sync::Arc;

use crate::assets::GlyphAssetStore;
use crate::config::{GeneratorKind, SynthConfig};
use crate::corpus::CorpusProvider;
use crate::error::{SynthError, SynthResult};
use crate::font::FontRasterizer;
use crate::glyph::Glyph;

pub use chinese::IdeographicSource;
pub use digits::DigitSource;
pub use form::{FormField, FormSource};
pub use handwriting::HandwritingSource;
pub use text::AlphabeticSource;

/// One generator variant: decides the label text and where its glyphs come from.
pub trait LineSource: Send + Sync {
    fn kind(&self) -> GeneratorKind;

    fn language(&self) -> &str;

    /// `None` when the source has run dry (an exhausted ordered corpus).
    fn produce_text(&self, index: u64, rng: &mut StdRng) -> Option<String>;

    /// Picks the font or writer style used for one whole line.
    fn resolve_glyph_source(&self, rng: &mut StdRng) -> GlyphSource<'_>;
}

/// Where glyph rasters come from for a run.
#[derive(Clone)]
pub enum GlyphBackend {
    Fonts {
        rasterizer: Arc<dyn FontRasterizer>,
        font_ids: Vec<String>,
        size: u32,
    },
    Assets {
        store: Arc<dyn GlyphAssetStore>,
        styles: Vec<String>,
    },
}

impl GlyphBackend {
    pub fn fonts(rasterizer: Arc<dyn FontRasterizer>, size: u32) -> Self {
        let font_ids = rasterizer.font_ids();
        Self::Fonts {
            rasterizer,
            font_ids,
            size,
        }
    }

    pub fn assets(store: Arc<dyn GlyphAssetStore>) -> Self {
        let styles = store.styles();
        Self::Assets { store, styles }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Fonts { font_ids, .. } => font_ids.is_empty(),
            Self::Assets { styles, .. } => styles.is_empty(),
        }
    }

    pub fn select(&self, rng: &mut StdRng) -> GlyphSource<'_> {
        match self {
            Self::Fonts {
                rasterizer,
                font_ids,
                size,
            } => GlyphSource::Font {
                rasterizer: rasterizer.as_ref(),
                font_id: font_ids.choose(rng).map(String::as_str),
                size: *size,
            },
            Self::Assets { store, styles } => GlyphSource::Assets {
                store: store.as_ref(),
                style_hint: styles.choose(rng).map(String::as_str),
            },
        }
    }
}

impl std::fmt::Debug for GlyphBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fonts { font_ids, size, .. } => f
                .debug_struct("Fonts")
                .field("font_ids", font_ids)
                .field("size", size)
                .finish(),
            Self::Assets { styles, .. } => {
                f.debug_struct("Assets").field("styles", styles).finish()
            }
        }
    }
}

/// The glyph provider resolved for a single line.
#[derive(Clone, Copy)]
pub enum GlyphSource<'a> {
    Assets {
        store: &'a dyn GlyphAssetStore,
        style_hint: Option<&'a str>,
    },
    Font {
        rasterizer: &'a dyn FontRasterizer,
        font_id: Option<&'a str>,
        size: u32,
    },
}

impl GlyphSource<'_> {
    pub fn style(&self) -> Option<&str> {
        match self {
            Self::Assets { style_hint, .. } => *style_hint,
            Self::Font { font_id, .. } => *font_id,
        }
    }

    /// Fetches or renders `character`. A character without an asset, or one
    /// the font does not cover, is an `InvalidGlyph` error.
    pub fn resolve(&self, character: char, rng: &mut StdRng) -> SynthResult<Arc<Glyph>> {
        match self {
            Self::Assets { store, style_hint } => {
                let candidates = store.lookup(character, *style_hint);
                candidates
                    .choose(rng)
                    .cloned()
                    .ok_or_else(|| SynthError::invalid_glyph(character, "no glyph asset"))
            }
            Self::Font {
                rasterizer,
                font_id,
                size,
            } => {
                let font_id =
                    font_id.ok_or_else(|| SynthError::invalid_glyph(character, "no font loaded"))?;
                rasterizer.render(character, font_id, *size).map(Arc::new)
            }
        }
    }
}

/// Text, lengths and corpus shared by every source.
#[derive(Clone)]
pub(crate) struct SourceCommon {
    pub(crate) language: String,
    pub(crate) min_length: usize,
    pub(crate) max_length: usize,
    pub(crate) corpus: Option<Arc<dyn CorpusProvider>>,
    pub(crate) backend: GlyphBackend,
}

impl SourceCommon {
    pub(crate) fn sample_length(&self, rng: &mut StdRng) -> usize {
        rng.random_range(self.min_length..=self.max_length.max(self.min_length))
    }

    /// Corpus text when a corpus is configured, otherwise `generate`.
    pub(crate) fn text_or(
        &self,
        index: u64,
        rng: &mut StdRng,
        generate: impl FnOnce(&mut StdRng, usize) -> String,
    ) -> Option<String> {
        match &self.corpus {
            Some(corpus) => corpus.next_text(index, rng),
            None => {
                let length = self.sample_length(rng);
                Some(generate(rng, length))
            }
        }
    }
}

pub(crate) fn random_chars(rng: &mut StdRng, pool: &[char], count: usize) -> String {
    (0..count).filter_map(|_| pool.choose(rng)).collect()
}

/// Builds the source for the configured generator.
pub fn build_source(
    config: &SynthConfig,
    backend: GlyphBackend,
    corpus: Option<Arc<dyn CorpusProvider>>,
) -> SynthResult<Arc<dyn LineSource>> {
    let generation = &config.generation;
    let common = SourceCommon {
        language: generation.language().to_string(),
        min_length: generation.min_length,
        max_length: generation.max_length,
        corpus,
        backend,
    };
    let source: Arc<dyn LineSource> = match generation.generator {
        GeneratorKind::Digits => Arc::new(DigitSource::new(common, config.digits.clone())),
        GeneratorKind::Text => Arc::new(AlphabeticSource::new(common, config.text.clone())),
        GeneratorKind::Chinese => Arc::new(IdeographicSource::new(common, &config.chinese)),
        GeneratorKind::Form => Arc::new(FormSource::new(common)),
        GeneratorKind::Handwriting => {
            let GlyphBackend::Assets { store, .. } = &common.backend else {
                return Err(SynthError::Config(
                    "the handwriting generator needs a glyph asset directory".to_string(),
                ));
            };
            let store = store.clone();
            Arc::new(HandwritingSource::new(common, store.as_ref()))
        }
    };
    Ok(source)
}
