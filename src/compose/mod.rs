mod composite;
mod layout;
mod normalize;

use rand::rngs::StdRng;

use crate::config::LayoutConfig;
use crate::error::SynthResult;
use crate::sources::GlyphSource;

pub use composite::{Composite, paint};
pub use layout::{LinePlan, Placement, plan_line};
pub use normalize::{
    DroppedGlyph, LineSlot, MetricConfig, NormalizedGlyph, NormalizedLine, Substitution,
    normalize_glyph, normalize_line,
};

/// Looks up a glyph for every character of `text`.
pub fn resolve_slots(text: &str, source: &GlyphSource<'_>, rng: &mut StdRng) -> Vec<LineSlot> {
    text.chars()
        .map(|character| {
            if character.is_whitespace() {
                return LineSlot::Space(character);
            }
            match source.resolve(character, rng) {
                Ok(glyph) => LineSlot::Glyph(glyph),
                Err(err) => LineSlot::Missing {
                    character,
                    reason: err.to_string(),
                },
            }
        })
        .collect()
}

/// Normalize, lay out and paint one line of text.
pub fn compose_line(
    text: &str,
    source: &GlyphSource<'_>,
    layout: &LayoutConfig,
    rng: &mut StdRng,
) -> SynthResult<Composite> {
    let slots = resolve_slots(text, source, rng);
    let metrics = MetricConfig::from_layout(layout);
    let NormalizedLine {
        glyphs,
        text,
        substitutions,
        dropped,
    } = normalize_line(&slots, &metrics);
    let plan = plan_line(glyphs, layout, rng)?;
    let mut composite = paint(&plan, &text, layout.background_level);
    composite.substitutions = substitutions;
    composite.dropped = dropped;
    Ok(composite)
}
