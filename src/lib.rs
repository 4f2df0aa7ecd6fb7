use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub mod assets;
pub mod augment;
pub mod compose;
pub mod config;
pub mod corpus;
pub mod error;
pub mod font;
pub mod geom;
pub mod glyph;
pub mod logging;
pub mod pipeline;
pub mod pool;
pub mod postprocess;
pub mod quality;
pub mod report;
pub mod sample;
pub mod settings;
pub mod sources;

pub use assets::{GlyphAssetStore, GlyphCache};
pub use augment::{AugmentationPlan, Backgrounds};
pub use compose::{Composite, compose_line};
pub use config::{GeneratorKind, SynthConfig};
pub use corpus::{CorpusProvider, LineCorpus};
pub use error::{StorageError, SynthError, SynthResult};
pub use font::{FontRasterizer, TtfRasterizer};
pub use glyph::{CharBox, Glyph, GlyphKind};
pub use pipeline::{SamplePipeline, derive_seed};
pub use pool::{CancelToken, WriterFactory, run_batch};
pub use postprocess::PostProcessor;
pub use quality::QualityGate;
pub use report::{BatchReport, BatchStatus};
pub use sample::{DatasetWriter, DirectoryWriter, LabelRecord, MemoryWriter, Sample};
pub use sources::{GlyphBackend, LineSource, build_source};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub generator: Option<GeneratorKind>,
    pub count: Option<usize>,
    pub output: PathBuf,
    pub workers: Option<usize>,
    pub seed: Option<u64>,
    pub settings_path: Option<String>,
    pub fonts: Vec<PathBuf>,
    pub glyph_dir: Option<PathBuf>,
    pub char_dict: Option<PathBuf>,
    pub corpus: Vec<PathBuf>,
    pub backgrounds: Option<PathBuf>,
    pub no_augment: bool,
    pub show_config: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub text: String,
    /// `None` when nothing was generated (e.g. `--show-config`).
    pub status: Option<BatchStatus>,
}

pub fn run(config: Config) -> Result<RunOutput> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut synth = settings::load_config(settings_path)?;
    apply_overrides(&mut synth, &config);
    synth.validate()?;

    if config.show_config {
        let text = toml::to_string_pretty(&synth).with_context(|| "failed to render settings")?;
        return Ok(RunOutput { text, status: None });
    }

    let (backend, cache) = build_backend(&synth)?;
    let corpus = load_corpus(&synth, &backend)?;
    let backgrounds = match &synth.assets.background_dir {
        Some(dir) => Backgrounds::load_dir(dir)?,
        None => Backgrounds::default(),
    };

    let output = config.output.clone();
    fs::create_dir_all(&output)
        .with_context(|| format!("failed to create output directory: {}", output.display()))?;

    let source = build_source(&synth, backend, corpus)?;
    let synth = Arc::new(synth);
    let pipeline = SamplePipeline::new(synth.clone(), source, Arc::new(backgrounds));
    let format = synth.generation.output_format;
    let prefix = synth.generation.name_prefix.clone();
    let root = output.clone();
    let writers: Box<WriterFactory> = Box::new(move |shard| {
        Box::new(DirectoryWriter::new(&root, shard, format, &prefix)) as Box<dyn DatasetWriter>
    });

    let report = run_batch(&pipeline, writers.as_ref(), &CancelToken::new());
    drop(pipeline);
    if let Some(cache) = cache.and_then(|cache| Arc::try_unwrap(cache).ok()) {
        cache.teardown();
    }

    sample::write_labels(&output.join("all_labels.json"), &report.records())?;
    let report_path = output.join("report.json");
    let body = serde_json::to_vec_pretty(&report).with_context(|| "failed to serialize report")?;
    fs::write(&report_path, body)
        .with_context(|| format!("failed to write report: {}", report_path.display()))?;
    info!("dataset written to {}", output.display());

    Ok(RunOutput {
        text: report.summary(),
        status: Some(report.status),
    })
}

fn apply_overrides(synth: &mut SynthConfig, config: &Config) {
    let generation = &mut synth.generation;
    if let Some(generator) = config.generator {
        generation.generator = generator;
    }
    if let Some(count) = config.count {
        generation.total = count;
    }
    if let Some(workers) = config.workers {
        generation.workers = workers;
    }
    if let Some(seed) = config.seed {
        generation.base_seed = seed;
    }
    if config.no_augment {
        generation.augment = false;
    }

    let assets = &mut synth.assets;
    if !config.fonts.is_empty() {
        assets.font_paths = config.fonts.clone();
    }
    if config.glyph_dir.is_some() {
        assets.glyph_dir = config.glyph_dir.clone();
    }
    if config.char_dict.is_some() {
        assets.char_dict = config.char_dict.clone();
    }
    if !config.corpus.is_empty() {
        assets.corpus_files = config.corpus.clone();
    }
    if config.backgrounds.is_some() {
        assets.background_dir = config.backgrounds.clone();
    }
}

fn build_backend(synth: &SynthConfig) -> Result<(GlyphBackend, Option<Arc<GlyphCache>>)> {
    let assets = &synth.assets;
    match (&assets.char_dict, &assets.glyph_dir) {
        (Some(char_dict), Some(glyph_dir)) => {
            let cache = GlyphCache::load(char_dict, glyph_dir)?;
            if cache.is_empty() {
                return Err(anyhow!("no glyph assets found in {}", glyph_dir.display()));
            }
            let cache = Arc::new(cache);
            Ok((GlyphBackend::assets(cache.clone()), Some(cache)))
        }
        (None, None) => {
            let mut rasterizer = TtfRasterizer::new();
            if !assets.font_paths.is_empty() {
                rasterizer.load_paths(&assets.font_paths)?;
            }
            if rasterizer.is_empty() {
                rasterizer.load_system_families(&assets.font_families);
            }
            if rasterizer.is_empty() {
                return Err(anyhow!(
                    "no fonts available; pass --fonts or configure assets.font_families"
                ));
            }
            Ok((GlyphBackend::fonts(Arc::new(rasterizer), assets.font_size), None))
        }
        _ => Err(anyhow!("glyph assets need both --char-dict and --glyph-dir")),
    }
}

fn load_corpus(
    synth: &SynthConfig,
    backend: &GlyphBackend,
) -> Result<Option<Arc<dyn CorpusProvider>>> {
    let assets = &synth.assets;
    if assets.corpus_files.is_empty() {
        return Ok(None);
    }
    let mut corpus = LineCorpus::load(
        &assets.corpus_files,
        assets.corpus_mode,
        synth.generation.max_length,
    )?;
    if let GlyphBackend::Assets { store, .. } = backend {
        corpus.filter_available(|ch| store.contains(ch));
        if corpus.len() == 0 {
            return Err(anyhow!("no corpus line can be drawn with the loaded glyph assets"));
        }
    }
    Ok(Some(Arc::new(corpus)))
}
