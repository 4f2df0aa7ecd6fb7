use std::fmt;

use crate::compose::Composite;
use crate::config::QualityConfig;
use crate::error::{SynthError, SynthResult};

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    TooNarrow { width: u32, min: u32 },
    TooShort { height: u32, min: u32 },
    Aspect { ratio: f32, min: f32, max: f32 },
    LowVariance { variance: f64, min: f64 },
    CollapsedBox { position: usize, character: char },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooNarrow { width, min } => write!(f, "width {} < {}", width, min),
            Self::TooShort { height, min } => write!(f, "height {} < {}", height, min),
            Self::Aspect { ratio, min, max } => {
                write!(f, "aspect {:.2} outside [{}, {}]", ratio, min, max)
            }
            Self::LowVariance { variance, min } => {
                write!(f, "pixel variance {:.1} < {}", variance, min)
            }
            Self::CollapsedBox {
                position,
                character,
            } => write!(f, "box {} ({:?}) collapsed", position, character),
        }
    }
}

/// Accepts or rejects a finished composite.
#[derive(Debug, Clone)]
pub struct QualityGate {
    config: QualityConfig,
}

impl QualityGate {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn inspect(&self, composite: &Composite) -> SynthResult<()> {
        let reasons = self.reasons(composite);
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(SynthError::QualityRejection(reasons))
        }
    }

    pub fn reasons(&self, composite: &Composite) -> Vec<RejectReason> {
        let config = &self.config;
        let (width, height) = composite.image.dimensions();
        let mut reasons = Vec::new();
        if width < config.min_width {
            reasons.push(RejectReason::TooNarrow {
                width,
                min: config.min_width,
            });
        }
        if height < config.min_height {
            reasons.push(RejectReason::TooShort {
                height,
                min: config.min_height,
            });
        }
        if height > 0 {
            let ratio = width as f32 / height as f32;
            if ratio < config.min_aspect || ratio > config.max_aspect {
                reasons.push(RejectReason::Aspect {
                    ratio,
                    min: config.min_aspect,
                    max: config.max_aspect,
                });
            }
        }
        let variance = pixel_variance(&composite.image);
        if variance < config.min_variance {
            reasons.push(RejectReason::LowVariance {
                variance,
                min: config.min_variance,
            });
        }
        for (position, char_box) in composite.boxes.iter().enumerate() {
            if !char_box.is_synthetic() && char_box.bbox.area() == 0 {
                reasons.push(RejectReason::CollapsedBox {
                    position,
                    character: char_box.character,
                });
            }
        }
        reasons
    }
}

pub fn pixel_variance(image: &image::GrayImage) -> f64 {
    let count = image.pixels().len();
    if count == 0 {
        return 0.0;
    }
    let (sum, sum_sq) = image.pixels().fold((0.0f64, 0.0f64), |(sum, sum_sq), pixel| {
        let value = pixel[0] as f64;
        (sum + value, sum_sq + value * value)
    });
    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::BBoxPx;
    use crate::glyph::{CharBox, GlyphKind};
    use image::{GrayImage, Luma};

    fn composite(image: GrayImage, boxes: Vec<CharBox>) -> Composite {
        Composite {
            image,
            boxes,
            text: String::new(),
            substitutions: Vec::new(),
            dropped: Vec::new(),
        }
    }

    fn inked() -> GrayImage {
        let mut image = GrayImage::from_pixel(80, 30, Luma([255]));
        for y in 8..22 {
            for x in 10..60 {
                image.put_pixel(x, y, Luma([0]));
            }
        }
        image
    }

    #[test]
    fn blank_canvas_is_rejected_for_variance() {
        let gate = QualityGate::new(QualityConfig::default());
        let blank = composite(GrayImage::from_pixel(80, 30, Luma([255])), Vec::new());
        let err = gate.inspect(&blank).unwrap_err();
        let SynthError::QualityRejection(reasons) = err else {
            panic!("expected a quality rejection");
        };
        assert!(matches!(reasons[..], [RejectReason::LowVariance { .. }]));
    }

    #[test]
    fn inked_line_passes() {
        let gate = QualityGate::new(QualityConfig::default());
        let ok = composite(
            inked(),
            vec![CharBox {
                character: 'a',
                bbox: BBoxPx::new(10, 8, 50, 14),
                kind: GlyphKind::Ink,
            }],
        );
        gate.inspect(&ok).expect("accepted");
    }

    #[test]
    fn collapsed_ink_box_and_bad_shape_are_reported() {
        let gate = QualityGate::new(QualityConfig::default());
        let mut image = GrayImage::from_pixel(8, 40, Luma([255]));
        image.put_pixel(2, 2, Luma([0]));
        let bad = composite(
            image,
            vec![
                CharBox {
                    character: 'a',
                    bbox: BBoxPx::new(7, 3, 0, 5),
                    kind: GlyphKind::Ink,
                },
                CharBox {
                    character: ' ',
                    bbox: BBoxPx::new(7, 3, 0, 5),
                    kind: GlyphKind::Space,
                },
            ],
        );
        let reasons = gate.reasons(&bad);
        assert!(reasons.contains(&RejectReason::TooNarrow { width: 8, min: 16 }));
        assert!(reasons.iter().any(|r| matches!(r, RejectReason::Aspect { .. })));
        assert!(reasons.contains(&RejectReason::CollapsedBox {
            position: 0,
            character: 'a'
        }));
        assert!(!reasons.contains(&RejectReason::CollapsedBox {
            position: 1,
            character: ' '
        }));
    }
}
