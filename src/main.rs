use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use ocr_line_synth::{BatchStatus, GeneratorKind};

#[derive(Parser, Debug)]
#[command(
    name = "ocr-line-synth",
    version,
    about = "Generate synthetic OCR text-line images with character boxes"
)]
struct Cli {
    /// Line generator: digits, text, chinese, handwriting or form
    #[arg(short = 'g', long = "generator")]
    generator: Option<GeneratorKind>,

    /// Number of samples to generate
    #[arg(short = 'n', long = "count")]
    count: Option<usize>,

    /// Output directory
    #[arg(short = 'o', long = "output", default_value = "output")]
    output: PathBuf,

    /// Worker threads (0 = number of CPUs)
    #[arg(short = 'w', long = "workers")]
    workers: Option<usize>,

    /// Base seed; the same seed reproduces the same dataset
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Font files or directories (repeatable)
    #[arg(short = 'f', long = "fonts")]
    fonts: Vec<PathBuf>,

    /// Directory of pre-rendered glyph images (style_code.png)
    #[arg(long = "glyph-dir")]
    glyph_dir: Option<PathBuf>,

    /// Character dictionary mapping characters to glyph codes
    #[arg(long = "char-dict")]
    char_dict: Option<PathBuf>,

    /// Corpus text files, one line per sample (repeatable)
    #[arg(long = "corpus")]
    corpus: Vec<PathBuf>,

    /// Directory of paper background textures
    #[arg(short = 'b', long = "backgrounds")]
    backgrounds: Option<PathBuf>,

    /// Skip the augmentation pipeline
    #[arg(long = "no-augment")]
    no_augment: bool,

    /// Print the effective settings and exit
    #[arg(long = "show-config")]
    show_config: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    ocr_line_synth::logging::init(cli.verbose)?;

    let config = ocr_line_synth::Config {
        generator: cli.generator,
        count: cli.count,
        output: cli.output,
        workers: cli.workers,
        seed: cli.seed,
        settings_path: cli.config,
        fonts: cli.fonts,
        glyph_dir: cli.glyph_dir,
        char_dict: cli.char_dict,
        corpus: cli.corpus,
        backgrounds: cli.backgrounds,
        no_augment: cli.no_augment,
        show_config: cli.show_config,
    };
    let output = ocr_line_synth::run(config)?;
    println!("{}", output.text);
    if output.status == Some(BatchStatus::Failed) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
