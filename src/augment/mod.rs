mod background;
mod elastic;
mod geometry;
mod stroke;
mod tone;

use rand::Rng;
use rand::rngs::StdRng;

use crate::compose::Composite;
use crate::config::AugmentConfig;

pub use background::Backgrounds;

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryOp {
    Rotate {
        degrees: f32,
    },
    /// Corner displacements as fractions of `min(width, height)`, in
    /// top-left, top-right, bottom-right, bottom-left order.
    Perspective {
        offsets: [(f32, f32); 4],
    },
}

/// Smooth random displacement of the strokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticPlan {
    pub alpha: f32,
    pub sigma: f32,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeOp {
    Thicken { radius: u32 },
    Thin { radius: u32 },
}

/// A horizontal break in the strokes, positioned by fractions of the text band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeGap {
    pub fx: f32,
    pub fy: f32,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokePlan {
    pub op: StrokeOp,
    pub gaps: Vec<StrokeGap>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotometricPlan {
    pub brightness: f32,
    pub contrast: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoisePlan {
    pub stddev: f32,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurPlan {
    pub kernel: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundFill {
    Texture { index: usize, offset: (f32, f32) },
    Solid { level: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundPlan {
    pub fill: BackgroundFill,
    pub alpha: f32,
    pub ink_threshold: u8,
}

/// Resolved parameters for one sample. Sampling consumes the RNG; applying
/// is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AugmentationPlan {
    pub geometry: Option<GeometryOp>,
    pub elastic: Option<ElasticPlan>,
    pub stroke: Option<StrokePlan>,
    pub photometric: Option<PhotometricPlan>,
    pub noise: Option<NoisePlan>,
    pub blur: Option<BlurPlan>,
    pub background: Option<BackgroundPlan>,
}

fn span(rng: &mut StdRng, range: [f32; 2]) -> f32 {
    rng.random_range(range[0]..=range[1])
}

fn int_span(rng: &mut StdRng, range: [u32; 2]) -> u32 {
    rng.random_range(range[0]..=range[1])
}

impl AugmentationPlan {
    /// Every stage draws its activation first, whether or not it is enabled.
    /// Elastic is drawn last but applied right after geometry.
    pub fn sample(config: &AugmentConfig, background_count: usize, rng: &mut StdRng) -> Self {
        let mut plan = Self::default();

        if rng.random_bool(config.geometry.probability) {
            let geometry = &config.geometry;
            plan.geometry = Some(if rng.random_bool(geometry.perspective_share) {
                let [low, high] = geometry.perspective_strength;
                let mut offsets = [(0.0, 0.0); 4];
                for offset in &mut offsets {
                    let dx = rng.random_range(low..=high) * sign(rng);
                    let dy = rng.random_range(low..=high) * sign(rng);
                    *offset = (dx, dy);
                }
                GeometryOp::Perspective { offsets }
            } else {
                GeometryOp::Rotate {
                    degrees: span(rng, geometry.rotation_degrees),
                }
            });
        }

        if rng.random_bool(config.stroke.probability) {
            let stroke = &config.stroke;
            let radius = int_span(rng, stroke.kernel);
            let op = if rng.random_bool(stroke.thicken_share) {
                StrokeOp::Thicken { radius }
            } else {
                StrokeOp::Thin { radius }
            };
            let mut gaps = Vec::new();
            if rng.random_bool(stroke.gap_probability) {
                for _ in 0..int_span(rng, stroke.gap_count) {
                    gaps.push(StrokeGap {
                        fx: rng.random_range(0.0..=1.0),
                        fy: rng.random_range(0.0..=1.0),
                        length: int_span(rng, stroke.gap_length),
                    });
                }
            }
            plan.stroke = Some(StrokePlan { op, gaps });
        }

        if rng.random_bool(config.photometric.probability) {
            plan.photometric = Some(PhotometricPlan {
                brightness: span(rng, config.photometric.brightness),
                contrast: span(rng, config.photometric.contrast),
            });
        }

        if rng.random_bool(config.noise.probability) {
            plan.noise = Some(NoisePlan {
                stddev: span(rng, config.noise.stddev),
                seed: rng.random::<u64>(),
            });
        }

        if rng.random_bool(config.blur.probability) {
            let [low, high] = config.blur.kernel;
            let steps = (high - low) / 2;
            plan.blur = Some(BlurPlan {
                kernel: low + 2 * rng.random_range(0..=steps),
            });
        }

        if rng.random_bool(config.background.probability) {
            let background = &config.background;
            let textured = rng.random_bool(background.texture_share) && background_count > 0;
            let fill = if textured {
                BackgroundFill::Texture {
                    index: rng.random_range(0..background_count),
                    offset: (rng.random_range(0.0..=1.0), rng.random_range(0.0..=1.0)),
                }
            } else {
                let [low, high] = background.solid_level;
                BackgroundFill::Solid {
                    level: rng.random_range(low..=high),
                }
            };
            plan.background = Some(BackgroundPlan {
                fill,
                alpha: span(rng, background.alpha),
                ink_threshold: background.ink_threshold,
            });
        }

        if rng.random_bool(config.elastic.probability) {
            plan.elastic = Some(ElasticPlan {
                alpha: span(rng, config.elastic.alpha),
                sigma: span(rng, config.elastic.sigma),
                seed: rng.random::<u64>(),
            });
        }

        plan
    }

    pub fn is_identity(&self) -> bool {
        self == &Self::default()
    }

    /// Names of the stages this plan applies, in application order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if let Some(geometry) = &self.geometry {
            names.push(match geometry {
                GeometryOp::Rotate { .. } => "rotate",
                GeometryOp::Perspective { .. } => "perspective",
            });
        }
        if self.elastic.is_some() {
            names.push("elastic");
        }
        if let Some(stroke) = &self.stroke {
            names.push(match stroke.op {
                StrokeOp::Thicken { .. } => "thicken",
                StrokeOp::Thin { .. } => "thin",
            });
            if !stroke.gaps.is_empty() {
                names.push("stroke_gaps");
            }
        }
        if self.photometric.is_some() {
            names.push("photometric");
        }
        if self.noise.is_some() {
            names.push("noise");
        }
        if self.blur.is_some() {
            names.push("blur");
        }
        if self.background.is_some() {
            names.push("background");
        }
        names
    }

    pub fn apply(&self, composite: Composite, backgrounds: &Backgrounds) -> Composite {
        let mut composite = composite;
        match &self.geometry {
            Some(GeometryOp::Rotate { degrees }) => {
                composite = geometry::rotate(composite, *degrees);
            }
            Some(GeometryOp::Perspective { offsets }) => {
                composite = geometry::perspective(composite, offsets);
            }
            None => {}
        }
        if let Some(elastic) = &self.elastic {
            composite = elastic::deform(composite, elastic);
        }
        if let Some(stroke) = &self.stroke {
            stroke::apply(&mut composite, stroke);
        }
        if let Some(photometric) = &self.photometric {
            tone::photometric(&mut composite.image, photometric);
        }
        if let Some(noise) = &self.noise {
            composite.image = tone::noise(&composite.image, noise);
        }
        if let Some(blur) = &self.blur {
            composite.image = tone::blur(&composite.image, blur);
        }
        if let Some(background) = &self.background {
            background::apply(&mut composite.image, background, backgrounds);
        }
        composite
    }
}

fn sign(rng: &mut StdRng) -> f32 {
    if rng.random_bool(0.5) { 1.0 } else { -1.0 }
}

/// Paper level of a composite: the brightest corner.
pub(crate) fn paper_level(image: &image::GrayImage) -> u8 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return 255;
    }
    [(0, 0), (width - 1, 0), (0, height - 1), (width - 1, height - 1)]
        .iter()
        .map(|&(x, y)| image.get_pixel(x, y)[0])
        .max()
        .unwrap_or(255)
}
