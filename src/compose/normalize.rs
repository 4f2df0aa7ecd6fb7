use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{LayoutConfig, MissingGlyphPolicy};
use crate::error::{SynthError, SynthResult};
use crate::glyph::{Glyph, GlyphKind};

/// Sizing rules shared by every glyph of a line.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricConfig {
    pub line_height: u32,
    pub baseline_ratio: f32,
    pub space_width_ratio: f32,
    pub min_placeholder_width: u32,
    pub missing_glyph_policy: MissingGlyphPolicy,
    pub style_baselines: BTreeMap<String, f32>,
}

impl MetricConfig {
    pub fn from_layout(layout: &LayoutConfig) -> Self {
        Self {
            line_height: layout.line_height,
            baseline_ratio: layout.baseline_ratio,
            space_width_ratio: layout.space_width_ratio,
            min_placeholder_width: layout.min_placeholder_width,
            missing_glyph_policy: layout.missing_glyph_policy,
            style_baselines: layout.style_baselines.clone(),
        }
    }

    fn cell_baseline(&self) -> u32 {
        (self.baseline_ratio * self.line_height as f32).round() as u32
    }

    fn space_width(&self) -> u32 {
        ((self.space_width_ratio * self.line_height as f32).round() as u32).max(1)
    }

    fn placeholder_width(&self) -> u32 {
        self.min_placeholder_width.max(self.space_width())
    }
}

/// A glyph (or blank slot) scaled to the line height.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedGlyph<'a> {
    pub glyph: Option<&'a Glyph>,
    pub character: char,
    pub kind: GlyphKind,
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Distance from the top of the scaled cell to the baseline.
    pub baseline_offset: u32,
}

impl NormalizedGlyph<'_> {
    fn blank(character: char, kind: GlyphKind, width: u32, metrics: &MetricConfig) -> Self {
        Self {
            glyph: None,
            character,
            kind,
            scaled_width: width.max(1),
            scaled_height: metrics.line_height,
            baseline_offset: metrics.cell_baseline(),
        }
    }
}

/// A character drawn as a blank placeholder because its glyph was unusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub position: usize,
    pub character: char,
    pub reason: String,
}

/// A character removed from the label because its glyph was unusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedGlyph {
    /// Position in the requested text, before removal.
    pub position: usize,
    pub character: char,
    pub reason: String,
}

/// One requested character after glyph lookup.
#[derive(Debug, Clone)]
pub enum LineSlot {
    Space(char),
    Glyph(Arc<Glyph>),
    Missing { character: char, reason: String },
}

impl LineSlot {
    pub fn character(&self) -> char {
        match self {
            Self::Space(character) => *character,
            Self::Glyph(glyph) => glyph.character(),
            Self::Missing { character, .. } => *character,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedLine<'a> {
    pub glyphs: Vec<NormalizedGlyph<'a>>,
    pub text: String,
    pub substitutions: Vec<Substitution>,
    pub dropped: Vec<DroppedGlyph>,
}

fn baseline_sits_on_ink(character: char) -> bool {
    character.is_alphanumeric()
}

pub fn normalize_glyph<'a>(
    glyph: &'a Glyph,
    metrics: &MetricConfig,
) -> SynthResult<NormalizedGlyph<'a>> {
    let extent = glyph
        .ink_extent()
        .ok_or_else(|| SynthError::invalid_glyph(glyph.character(), "glyph has no ink"))?;
    let height = metrics.line_height;
    let scale = height as f32 / glyph.native_height() as f32;
    let scaled_width = ((glyph.native_width() as f32 * scale).round() as u32).max(1);

    let baseline_offset = if let Some(baseline) = glyph.baseline() {
        (baseline as f32 * scale).round() as u32
    } else if let Some(ratio) = metrics.style_baselines.get(glyph.style_id()) {
        (ratio * height as f32).round() as u32
    } else if baseline_sits_on_ink(glyph.character()) {
        ((extent.bottom + 1) as f32 * scale).round() as u32
    } else {
        metrics.cell_baseline()
    };

    Ok(NormalizedGlyph {
        glyph: Some(glyph),
        character: glyph.character(),
        kind: GlyphKind::Ink,
        scaled_width,
        scaled_height: height,
        baseline_offset: baseline_offset.min(height),
    })
}

/// Normalizes a resolved line. Unusable glyphs become placeholders or are
/// dropped according to the missing-glyph policy.
pub fn normalize_line<'a>(slots: &'a [LineSlot], metrics: &MetricConfig) -> NormalizedLine<'a> {
    let mut line = NormalizedLine {
        glyphs: Vec::with_capacity(slots.len()),
        text: String::with_capacity(slots.len()),
        substitutions: Vec::new(),
        dropped: Vec::new(),
    };
    for (position, slot) in slots.iter().enumerate() {
        let character = slot.character();
        let failure = match slot {
            LineSlot::Space(_) => {
                line.glyphs.push(NormalizedGlyph::blank(
                    character,
                    GlyphKind::Space,
                    metrics.space_width(),
                    metrics,
                ));
                line.text.push(character);
                continue;
            }
            LineSlot::Glyph(glyph) => match normalize_glyph(glyph, metrics) {
                Ok(normalized) => {
                    line.glyphs.push(normalized);
                    line.text.push(character);
                    continue;
                }
                Err(err) => err.to_string(),
            },
            LineSlot::Missing { reason, .. } => reason.clone(),
        };

        match metrics.missing_glyph_policy {
            MissingGlyphPolicy::Placeholder => {
                line.substitutions.push(Substitution {
                    position: line.glyphs.len(),
                    character,
                    reason: failure,
                });
                line.glyphs.push(NormalizedGlyph::blank(
                    character,
                    GlyphKind::Placeholder,
                    metrics.placeholder_width(),
                    metrics,
                ));
                line.text.push(character);
            }
            MissingGlyphPolicy::Drop => line.dropped.push(DroppedGlyph {
                position,
                character,
                reason: failure,
            }),
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::block_glyph;
    use image::{GrayImage, Luma};

    fn metrics() -> MetricConfig {
        MetricConfig::from_layout(&LayoutConfig::default())
    }

    #[test]
    fn glyphs_scale_to_line_height_keeping_aspect() {
        let glyph = block_glyph('a', "s", 30, 40);
        let normalized = normalize_glyph(&glyph, &metrics()).expect("normalized");
        assert_eq!(normalized.scaled_height, 64);
        assert_eq!(normalized.scaled_width, 48);
        // last ink row 31 of 40, scaled by 1.6
        assert_eq!(normalized.baseline_offset, 51);
    }

    #[test]
    fn blank_glyph_is_invalid() {
        let image = GrayImage::from_pixel(10, 10, Luma([255]));
        let glyph = Glyph::from_luma('q', &image, "s").expect("glyph");
        let err = normalize_glyph(&glyph, &metrics()).unwrap_err();
        assert!(matches!(err, SynthError::InvalidGlyph { character: 'q', .. }));
    }

    #[test]
    fn baseline_prefers_glyph_then_style_then_ink() {
        let mut metrics = metrics();
        metrics.style_baselines.insert("ruled".to_string(), 0.5);
        let explicit = block_glyph('b', "ruled", 20, 32).with_baseline(16);
        assert_eq!(normalize_glyph(&explicit, &metrics).unwrap().baseline_offset, 32);
        let styled = block_glyph('b', "ruled", 20, 32);
        assert_eq!(normalize_glyph(&styled, &metrics).unwrap().baseline_offset, 32);
        let symbol = block_glyph('-', "plain", 20, 32);
        assert_eq!(normalize_glyph(&symbol, &metrics).unwrap().baseline_offset, 51);
    }

    #[test]
    fn missing_glyphs_become_placeholders() {
        let slots = vec![
            LineSlot::Glyph(Arc::new(block_glyph('a', "s", 20, 20))),
            LineSlot::Space(' '),
            LineSlot::Missing {
                character: 'z',
                reason: "no glyph asset".to_string(),
            },
        ];
        let line = normalize_line(&slots, &metrics());
        assert_eq!(line.text, "a z");
        assert_eq!(line.glyphs.len(), 3);
        assert_eq!(line.glyphs[1].kind, GlyphKind::Space);
        assert_eq!(line.glyphs[1].scaled_width, 22);
        assert_eq!(line.glyphs[2].kind, GlyphKind::Placeholder);
        assert_eq!(line.substitutions.len(), 1);
        assert_eq!(line.substitutions[0].position, 2);
    }

    #[test]
    fn drop_policy_removes_text_and_glyph_together() {
        let mut metrics = metrics();
        metrics.missing_glyph_policy = MissingGlyphPolicy::Drop;
        let slots = vec![
            LineSlot::Missing {
                character: 'z',
                reason: "no glyph asset".to_string(),
            },
            LineSlot::Glyph(Arc::new(block_glyph('a', "s", 20, 20))),
        ];
        let line = normalize_line(&slots, &metrics);
        assert_eq!(line.text, "a");
        assert_eq!(line.glyphs.len(), 1);
        assert_eq!(line.dropped[0].position, 0);
        assert!(line.substitutions.is_empty());
    }
}
