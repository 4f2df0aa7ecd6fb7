#![allow(dead_code)]

use image::{GrayImage, Luma};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

use ocr_line_synth::config::{GeneratorKind, SynthConfig};
use ocr_line_synth::{
    Backgrounds, CorpusProvider, Glyph, GlyphBackend, GlyphCache, SamplePipeline, build_source,
};

/// Dark rectangle over the inner three fifths of a white cell.
pub fn block_glyph(character: char, width: u32, height: u32) -> Glyph {
    let mut image = GrayImage::from_pixel(width, height, Luma([255]));
    for y in height / 5..height - height / 5 {
        for x in width / 5..width - width / 5 {
            image.put_pixel(x, y, Luma([10]));
        }
    }
    Glyph::from_luma(character, &image, "w1").expect("block glyph")
}

pub fn asset_backend(chars: &str) -> GlyphBackend {
    let cache = GlyphCache::from_glyphs(chars.chars().map(|ch| block_glyph(ch, 30, 40)));
    GlyphBackend::assets(Arc::new(cache))
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn digit_config(total: usize, shard_size: usize, workers: usize) -> SynthConfig {
    let mut config = SynthConfig::default();
    config.generation.generator = GeneratorKind::Digits;
    config.generation.total = total;
    config.generation.shard_size = shard_size;
    config.generation.workers = workers;
    config.generation.min_length = 4;
    config.generation.max_length = 10;
    config
}

pub fn pipeline(
    config: SynthConfig,
    backend: GlyphBackend,
    corpus: Option<Arc<dyn CorpusProvider>>,
) -> SamplePipeline {
    let source = build_source(&config, backend, corpus).expect("source");
    SamplePipeline::new(Arc::new(config), source, Arc::new(Backgrounds::default()))
}
