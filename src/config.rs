use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{SynthError, SynthResult};

/// Every recognized option of a generation run. Built once, validated once,
/// then shared read-only by all workers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthConfig {
    pub generation: GenerationConfig,
    pub layout: LayoutConfig,
    pub augment: AugmentConfig,
    pub postprocess: PostprocessConfig,
    pub quality: QualityConfig,
    pub digits: DigitsConfig,
    pub text: TextConfig,
    pub chinese: ChineseConfig,
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Digits,
    Text,
    Chinese,
    Handwriting,
    Form,
}

impl GeneratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Digits => "digits",
            Self::Text => "text",
            Self::Chinese => "chinese",
            Self::Handwriting => "handwriting",
            Self::Form => "form",
        }
    }

    pub fn default_language(&self) -> &'static str {
        match self {
            Self::Digits => "digits",
            Self::Text | Self::Form => "en",
            Self::Chinese | Self::Handwriting => "zh",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorKind {
    type Err = SynthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "digits" | "digit" => Ok(Self::Digits),
            "text" | "en" => Ok(Self::Text),
            "chinese" | "zh" => Ok(Self::Chinese),
            "handwriting" | "hw" => Ok(Self::Handwriting),
            "form" | "forms" => Ok(Self::Form),
            other => Err(SynthError::Config(format!("unknown generator '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    pub generator: GeneratorKind,
    pub language: Option<String>,
    pub base_seed: u64,
    pub total: usize,
    pub shard_size: usize,
    /// 0 picks the number of logical CPUs.
    pub workers: usize,
    pub max_shard_retries: usize,
    pub retry_limit: usize,
    pub include_boxes: bool,
    pub augment: bool,
    pub min_length: usize,
    pub max_length: usize,
    pub output_format: OutputFormat,
    pub name_prefix: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorKind::Digits,
            language: None,
            base_seed: 42,
            total: 100,
            shard_size: 100,
            workers: 0,
            max_shard_retries: 2,
            retry_limit: 3,
            include_boxes: true,
            augment: true,
            min_length: 1,
            max_length: 20,
            output_format: OutputFormat::Png,
            name_prefix: "sample".to_string(),
        }
    }
}

impl GenerationConfig {
    pub fn language(&self) -> &str {
        self.language
            .as_deref()
            .unwrap_or_else(|| self.generator.default_language())
    }

    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingGlyphPolicy {
    Placeholder,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub line_height: u32,
    pub margin_left: u32,
    pub margin_right: u32,
    pub margin_top: u32,
    pub margin_bottom: u32,
    pub min_gap: f32,
    pub max_gap: f32,
    pub jitter_amplitude: f32,
    pub overlap_tolerance: u32,
    /// Characters whose neighbouring gaps get widened.
    pub separator_set: String,
    pub separator_multiplier: f32,
    pub separator_multipliers: BTreeMap<String, f32>,
    /// Shared baseline position as a fraction of the line height.
    pub baseline_ratio: f32,
    pub space_width_ratio: f32,
    pub min_placeholder_width: u32,
    pub missing_glyph_policy: MissingGlyphPolicy,
    pub background_level: u8,
    /// Per-style baseline position inside the glyph cell, as a fraction of its height.
    pub style_baselines: BTreeMap<String, f32>,
    /// Per-glyph vertical offset drawn from `[-n, n]` pixels.
    pub vertical_jitter: u32,
    /// Per-glyph size factor drawn from `[1 - s, 1 + s]`.
    pub scale_jitter: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_height: 64,
            margin_left: 8,
            margin_right: 8,
            margin_top: 6,
            margin_bottom: 6,
            min_gap: 2.0,
            max_gap: 6.0,
            jitter_amplitude: 1.0,
            overlap_tolerance: 0,
            separator_set: "-".to_string(),
            separator_multiplier: 2.0,
            separator_multipliers: BTreeMap::new(),
            baseline_ratio: 0.8,
            space_width_ratio: 0.35,
            min_placeholder_width: 4,
            missing_glyph_policy: MissingGlyphPolicy::Placeholder,
            background_level: 255,
            style_baselines: BTreeMap::new(),
            vertical_jitter: 0,
            scale_jitter: 0.0,
        }
    }
}

impl LayoutConfig {
    pub fn is_separator(&self, ch: char) -> bool {
        self.separator_set.contains(ch)
    }

    pub fn separator_multiplier_for(&self, ch: char) -> f32 {
        let mut buf = [0u8; 4];
        let key: &str = ch.encode_utf8(&mut buf);
        self.separator_multipliers
            .get(key)
            .copied()
            .unwrap_or(self.separator_multiplier)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AugmentConfig {
    pub geometry: GeometryConfig,
    pub elastic: ElasticConfig,
    pub stroke: StrokeConfig,
    pub photometric: PhotometricConfig,
    pub noise: NoiseConfig,
    pub blur: BlurConfig,
    pub background: BackgroundConfig,
}

impl AugmentConfig {
    /// A pipeline where every stage is switched off.
    pub fn disabled() -> Self {
        let mut config = Self::default();
        config.geometry.probability = 0.0;
        config.elastic.probability = 0.0;
        config.stroke.probability = 0.0;
        config.photometric.probability = 0.0;
        config.noise.probability = 0.0;
        config.blur.probability = 0.0;
        config.background.probability = 0.0;
        config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeometryConfig {
    pub probability: f64,
    /// Chance of a perspective warp instead of a rotation once the stage fires.
    pub perspective_share: f64,
    pub rotation_degrees: [f32; 2],
    pub perspective_strength: [f32; 2],
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            probability: 0.5,
            perspective_share: 0.5,
            rotation_degrees: [-5.0, 5.0],
            perspective_strength: [0.0, 0.1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElasticConfig {
    pub probability: f64,
    /// Displacement strength in pixels.
    pub alpha: [f32; 2],
    /// Smoothness of the displacement field.
    pub sigma: [f32; 2],
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            probability: 0.0,
            alpha: [20.0, 34.0],
            sigma: [4.0, 6.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrokeConfig {
    pub probability: f64,
    pub thicken_share: f64,
    /// Filter radius in pixels.
    pub kernel: [u32; 2],
    pub gap_probability: f64,
    pub gap_count: [u32; 2],
    pub gap_length: [u32; 2],
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            probability: 0.5,
            thicken_share: 0.5,
            kernel: [1, 1],
            gap_probability: 0.3,
            gap_count: [1, 3],
            gap_length: [2, 8],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhotometricConfig {
    pub probability: f64,
    pub brightness: [f32; 2],
    pub contrast: [f32; 2],
}

impl Default for PhotometricConfig {
    fn default() -> Self {
        Self {
            probability: 0.5,
            brightness: [0.7, 1.3],
            contrast: [0.8, 1.2],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseConfig {
    pub probability: f64,
    pub stddev: [f32; 2],
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            probability: 0.2,
            stddev: [2.0, 8.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlurConfig {
    pub probability: f64,
    /// Odd kernel sizes; sigma follows from the kernel.
    pub kernel: [u32; 2],
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            probability: 0.15,
            kernel: [3, 5],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundConfig {
    pub probability: f64,
    /// Chance of a texture (when any are loaded) instead of a solid fill.
    pub texture_share: f64,
    pub alpha: [f32; 2],
    pub solid_level: [u8; 2],
    pub ink_threshold: u8,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            probability: 0.5,
            texture_share: 0.8,
            alpha: [0.8, 1.0],
            solid_level: [200, 255],
            ink_threshold: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostprocessConfig {
    /// Crop the canvas to its ink and boxes plus a random margin.
    pub crop_whitespace: bool,
    /// Pixels darker than this count as ink when cropping.
    pub ink_threshold: u8,
    pub crop_margin: [u32; 2],
    /// Letterbox `[width, height]`; `[0, 0]` keeps the cropped size.
    pub target_size: [u32; 2],
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            crop_whitespace: false,
            ink_threshold: 230,
            crop_margin: [0, 3],
            target_size: [0, 0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    pub min_width: u32,
    pub min_height: u32,
    pub min_aspect: f32,
    pub max_aspect: f32,
    pub min_variance: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_width: 16,
            min_height: 16,
            min_aspect: 0.25,
            max_aspect: 80.0,
            min_variance: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DigitsConfig {
    pub add_separators: bool,
    pub separator_chars: String,
    pub student_id_probability: f64,
    pub student_id_length: usize,
}

impl Default for DigitsConfig {
    fn default() -> Self {
        Self {
            add_separators: false,
            separator_chars: "- .".to_string(),
            student_id_probability: 0.0,
            student_id_length: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    pub include_numbers: bool,
    pub include_punctuation: bool,
    pub word_list: Vec<String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            include_numbers: true,
            include_punctuation: true,
            word_list: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChineseConfig {
    pub include_punctuation: bool,
    /// Empty means the built-in common character set.
    pub charset: String,
    /// Use the built-in traditional character set instead of the simplified one.
    pub traditional: bool,
    /// Chance of a verse-like line (five or seven character clauses).
    pub poem_probability: f64,
    /// Chance of a name or address line.
    pub form_probability: f64,
}

impl Default for ChineseConfig {
    fn default() -> Self {
        Self {
            include_punctuation: true,
            charset: String::new(),
            traditional: false,
            poem_probability: 0.0,
            form_probability: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusMode {
    Sampled,
    Ordered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    pub char_dict: Option<PathBuf>,
    pub glyph_dir: Option<PathBuf>,
    pub font_paths: Vec<PathBuf>,
    pub font_families: Vec<String>,
    pub font_size: u32,
    pub corpus_files: Vec<PathBuf>,
    pub corpus_mode: CorpusMode,
    pub background_dir: Option<PathBuf>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            char_dict: None,
            glyph_dir: None,
            font_paths: Vec::new(),
            font_families: vec!["sans-serif".to_string()],
            font_size: 48,
            corpus_files: Vec::new(),
            corpus_mode: CorpusMode::Sampled,
            background_dir: None,
        }
    }
}

impl SynthConfig {
    /// Fail-fast range checks; reports every problem at once.
    pub fn validate(&self) -> SynthResult<()> {
        let mut problems = Vec::new();

        let g = &self.generation;
        if g.shard_size == 0 {
            problems.push("generation.shard_size must be > 0".to_string());
        }
        if g.min_length == 0 || g.min_length > g.max_length {
            problems.push(format!(
                "generation length range [{}, {}] is invalid",
                g.min_length, g.max_length
            ));
        }
        if g.name_prefix.trim().is_empty() {
            problems.push("generation.name_prefix is empty".to_string());
        }

        let l = &self.layout;
        if l.line_height == 0 {
            problems.push("layout.line_height must be > 0".to_string());
        }
        if !(l.min_gap <= l.max_gap) {
            problems.push(format!(
                "layout gap range [{}, {}] is inverted",
                l.min_gap, l.max_gap
            ));
        }
        if l.min_gap < -(l.overlap_tolerance as f32) {
            problems.push(format!(
                "layout.min_gap {} overlaps more than overlap_tolerance {}",
                l.min_gap, l.overlap_tolerance
            ));
        }
        if !(l.jitter_amplitude >= 0.0) {
            problems.push("layout.jitter_amplitude must be >= 0".to_string());
        }
        if !(l.separator_multiplier > 0.0) {
            problems.push("layout.separator_multiplier must be > 0".to_string());
        }
        for (key, value) in &l.separator_multipliers {
            if key.chars().count() != 1 {
                problems.push(format!(
                    "layout.separator_multipliers key '{}' must be one character",
                    key
                ));
            }
            if !(*value > 0.0) {
                problems.push(format!("layout.separator_multipliers.{} must be > 0", key));
            }
        }
        check_unit(&mut problems, "layout.baseline_ratio", l.baseline_ratio as f64);
        for (style, ratio) in &l.style_baselines {
            check_unit(
                &mut problems,
                &format!("layout.style_baselines.{}", style),
                *ratio as f64,
            );
        }
        if !(l.space_width_ratio > 0.0) {
            problems.push("layout.space_width_ratio must be > 0".to_string());
        }
        if l.min_placeholder_width == 0 {
            problems.push("layout.min_placeholder_width must be > 0".to_string());
        }
        if !(0.0..0.5).contains(&l.scale_jitter) {
            problems.push(format!("layout.scale_jitter {} must lie in [0, 0.5)", l.scale_jitter));
        }

        let a = &self.augment;
        check_unit(&mut problems, "augment.geometry.probability", a.geometry.probability);
        check_unit(
            &mut problems,
            "augment.geometry.perspective_share",
            a.geometry.perspective_share,
        );
        check_span(&mut problems, "augment.geometry.rotation_degrees", a.geometry.rotation_degrees);
        check_span(
            &mut problems,
            "augment.geometry.perspective_strength",
            a.geometry.perspective_strength,
        );
        if a.geometry.perspective_strength[0] < 0.0 || a.geometry.perspective_strength[1] > 0.5 {
            problems.push("augment.geometry.perspective_strength must lie in [0, 0.5]".to_string());
        }
        check_unit(&mut problems, "augment.elastic.probability", a.elastic.probability);
        check_span(&mut problems, "augment.elastic.alpha", a.elastic.alpha);
        check_span(&mut problems, "augment.elastic.sigma", a.elastic.sigma);
        if a.elastic.alpha[0] < 0.0 || !(a.elastic.sigma[0] > 0.0) {
            problems.push("augment.elastic needs alpha >= 0 and sigma > 0".to_string());
        }
        check_unit(&mut problems, "augment.stroke.probability", a.stroke.probability);
        check_unit(&mut problems, "augment.stroke.thicken_share", a.stroke.thicken_share);
        check_unit(&mut problems, "augment.stroke.gap_probability", a.stroke.gap_probability);
        check_int_span(&mut problems, "augment.stroke.kernel", a.stroke.kernel);
        check_int_span(&mut problems, "augment.stroke.gap_count", a.stroke.gap_count);
        check_int_span(&mut problems, "augment.stroke.gap_length", a.stroke.gap_length);
        check_unit(&mut problems, "augment.photometric.probability", a.photometric.probability);
        check_span(&mut problems, "augment.photometric.brightness", a.photometric.brightness);
        check_span(&mut problems, "augment.photometric.contrast", a.photometric.contrast);
        if a.photometric.brightness[0] < 0.0 || a.photometric.contrast[0] < 0.0 {
            problems.push("augment.photometric factors must be >= 0".to_string());
        }
        check_unit(&mut problems, "augment.noise.probability", a.noise.probability);
        check_span(&mut problems, "augment.noise.stddev", a.noise.stddev);
        if a.noise.stddev[0] < 0.0 {
            problems.push("augment.noise.stddev must be >= 0".to_string());
        }
        check_unit(&mut problems, "augment.blur.probability", a.blur.probability);
        check_int_span(&mut problems, "augment.blur.kernel", a.blur.kernel);
        if a.blur.kernel.iter().any(|k| *k < 3 || k % 2 == 0) {
            problems.push("augment.blur.kernel sizes must be odd and >= 3".to_string());
        }
        check_unit(&mut problems, "augment.background.probability", a.background.probability);
        check_unit(
            &mut problems,
            "augment.background.texture_share",
            a.background.texture_share,
        );
        check_span(&mut problems, "augment.background.alpha", a.background.alpha);
        check_unit(&mut problems, "augment.background.alpha[0]", a.background.alpha[0] as f64);
        check_unit(&mut problems, "augment.background.alpha[1]", a.background.alpha[1] as f64);
        if a.background.solid_level[0] > a.background.solid_level[1] {
            problems.push("augment.background.solid_level is inverted".to_string());
        }

        let p = &self.postprocess;
        check_int_span(&mut problems, "postprocess.crop_margin", p.crop_margin);
        if (p.target_size[0] == 0) != (p.target_size[1] == 0) {
            problems.push(format!(
                "postprocess.target_size {:?} needs both sides or neither",
                p.target_size
            ));
        }

        let q = &self.quality;
        if !(q.min_aspect > 0.0 && q.min_aspect <= q.max_aspect) {
            problems.push(format!(
                "quality aspect range [{}, {}] is invalid",
                q.min_aspect, q.max_aspect
            ));
        }
        if !(q.min_variance >= 0.0) {
            problems.push("quality.min_variance must be >= 0".to_string());
        }

        check_unit(
            &mut problems,
            "digits.student_id_probability",
            self.digits.student_id_probability,
        );
        check_unit(&mut problems, "chinese.poem_probability", self.chinese.poem_probability);
        check_unit(&mut problems, "chinese.form_probability", self.chinese.form_probability);
        if self.chinese.poem_probability + self.chinese.form_probability > 1.0 {
            problems.push("chinese poem and form probabilities exceed 1 together".to_string());
        }
        if self.digits.student_id_length < 5 {
            problems.push("digits.student_id_length must be >= 5".to_string());
        }
        if self.assets.font_size == 0 {
            problems.push("assets.font_size must be > 0".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SynthError::Config(problems.join("; ")))
        }
    }
}

fn check_unit(problems: &mut Vec<String>, name: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        problems.push(format!("{} = {} is outside [0, 1]", name, value));
    }
}

fn check_span(problems: &mut Vec<String>, name: &str, span: [f32; 2]) {
    if !(span[0] <= span[1]) {
        problems.push(format!("{} [{}, {}] is inverted", name, span[0], span[1]));
    }
}

fn check_int_span(problems: &mut Vec<String>, name: &str, span: [u32; 2]) {
    if span[0] > span[1] {
        problems.push(format!("{} [{}, {}] is inverted", name, span[0], span[1]));
    }
}
