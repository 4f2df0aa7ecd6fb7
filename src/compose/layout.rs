use rand::Rng;
use rand::rngs::StdRng;

use super::normalize::NormalizedGlyph;
use crate::config::LayoutConfig;
use crate::error::{SynthError, SynthResult};

#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub glyph: NormalizedGlyph<'a>,
    pub x: u32,
    pub y: u32,
}

impl Placement<'_> {
    pub fn right(&self) -> u32 {
        self.x + self.glyph.scaled_width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.glyph.scaled_height
    }
}

#[derive(Debug, Clone)]
pub struct LinePlan<'a> {
    pub placements: Vec<Placement<'a>>,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub baseline_y: u32,
}

impl LinePlan<'_> {
    /// Widest overlap between consecutive placements.
    pub fn max_overlap(&self) -> u32 {
        self.placements
            .windows(2)
            .map(|pair| pair[0].right().saturating_sub(pair[1].x))
            .max()
            .unwrap_or(0)
    }
}

/// Gap multiplier for the boundary between `left` and `right`.
fn separator_factor(config: &LayoutConfig, left: char, right: char) -> f32 {
    match (config.is_separator(left), config.is_separator(right)) {
        (true, true) => config
            .separator_multiplier_for(left)
            .max(config.separator_multiplier_for(right)),
        (true, false) => config.separator_multiplier_for(left),
        (false, true) => config.separator_multiplier_for(right),
        (false, false) => 1.0,
    }
}

fn draw_gap(config: &LayoutConfig, rng: &mut StdRng) -> f32 {
    let base = rng.random_range(config.min_gap..=config.max_gap);
    let amplitude = config.jitter_amplitude;
    let jitter = rng.random_range(-amplitude..=amplitude);
    base + jitter
}

/// Resizes a rendered glyph by `factor` about its baseline.
fn rescale<'a>(glyph: NormalizedGlyph<'a>, factor: f32, max_height: u32) -> NormalizedGlyph<'a> {
    let scale = |value: u32| (value as f32 * factor).round() as u32;
    NormalizedGlyph {
        scaled_width: scale(glyph.scaled_width).max(1),
        scaled_height: scale(glyph.scaled_height).clamp(1, max_height.max(1)),
        baseline_offset: scale(glyph.baseline_offset),
        ..glyph
    }
}

/// Places normalized glyphs left to right on a shared baseline. Size and
/// vertical jitter, when configured, are drawn per rendered glyph.
pub fn plan_line<'a>(
    glyphs: Vec<NormalizedGlyph<'a>>,
    config: &LayoutConfig,
    rng: &mut StdRng,
) -> SynthResult<LinePlan<'a>> {
    if glyphs.is_empty() {
        return Err(SynthError::EmptyInput);
    }
    let line_height = config.line_height;
    let canvas_height = line_height + config.margin_top + config.margin_bottom;
    let baseline_y = config.margin_top + (config.baseline_ratio * line_height as f32).round() as u32;
    let tolerance = config.overlap_tolerance as i64;

    let mut placements: Vec<Placement<'a>> = Vec::with_capacity(glyphs.len());
    let mut cursor = config.margin_left as i64;
    for mut glyph in glyphs {
        if config.scale_jitter > 0.0 && glyph.glyph.is_some() {
            let spread = config.scale_jitter;
            let factor = rng.random_range(1.0 - spread..=1.0 + spread);
            glyph = rescale(glyph, factor, canvas_height);
        }
        let lift = if config.vertical_jitter > 0 && glyph.glyph.is_some() {
            let reach = config.vertical_jitter as i64;
            rng.random_range(-reach..=reach)
        } else {
            0
        };
        let mut x = cursor;
        if let Some(previous) = placements.last() {
            let factor = separator_factor(config, previous.glyph.character, glyph.character);
            let gap = (draw_gap(config, rng) * factor).round() as i64;
            x = (cursor + gap.max(-tolerance)).max(previous.x as i64);
        }
        let x = x.max(0) as u32;
        let max_y = canvas_height.saturating_sub(glyph.scaled_height);
        let y = (baseline_y as i64 - glyph.baseline_offset as i64 + lift).clamp(0, max_y as i64) as u32;
        cursor = x as i64 + glyph.scaled_width as i64;
        placements.push(Placement { glyph, x, y });
    }

    let cursor_end = placements.iter().map(Placement::right).max().unwrap_or(0);
    Ok(LinePlan {
        placements,
        canvas_width: cursor_end + config.margin_right,
        canvas_height,
        baseline_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::GlyphKind;
    use rand::SeedableRng;

    fn cell(character: char, width: u32, baseline_offset: u32) -> NormalizedGlyph<'static> {
        NormalizedGlyph {
            glyph: None,
            character,
            kind: GlyphKind::Ink,
            scaled_width: width,
            scaled_height: 64,
            baseline_offset,
        }
    }

    fn fixed_gaps(gap: f32) -> LayoutConfig {
        LayoutConfig {
            min_gap: gap,
            max_gap: gap,
            jitter_amplitude: 0.0,
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn empty_line_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = plan_line(Vec::new(), &LayoutConfig::default(), &mut rng).unwrap_err();
        assert!(matches!(err, SynthError::EmptyInput));
    }

    #[test]
    fn fixed_gaps_give_exact_positions() {
        let config = fixed_gaps(4.0);
        let mut rng = StdRng::seed_from_u64(0);
        let plan = plan_line(vec![cell('a', 10, 51), cell('b', 12, 51)], &config, &mut rng)
            .expect("plan");
        assert_eq!(plan.placements[0].x, 8);
        assert_eq!(plan.placements[1].x, 22);
        assert_eq!(plan.canvas_width, 42);
        assert_eq!(plan.canvas_height, 76);
        assert_eq!(plan.baseline_y, 57);
        assert_eq!(plan.placements[0].y, 6);
    }

    #[test]
    fn negative_gaps_respect_overlap_tolerance() {
        let config = LayoutConfig {
            min_gap: -6.0,
            max_gap: -2.0,
            jitter_amplitude: 3.0,
            overlap_tolerance: 3,
            ..LayoutConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(77);
        let glyphs = (0..30).map(|i| cell('a', 8 + i % 5, 40)).collect();
        let plan = plan_line(glyphs, &config, &mut rng).expect("plan");
        assert!(plan.max_overlap() <= 3);
        for pair in plan.placements.windows(2) {
            assert!(pair[1].x >= pair[0].x);
        }
        for placement in &plan.placements {
            assert!(placement.right() <= plan.canvas_width);
            assert!(placement.bottom() <= plan.canvas_height);
        }
    }

    #[test]
    fn separators_widen_their_gaps_once() {
        let mut config = fixed_gaps(4.0);
        config.separator_multipliers.insert("-".to_string(), 3.0);
        let mut rng = StdRng::seed_from_u64(1);
        let plan = plan_line(
            vec![cell('A', 10, 51), cell('-', 6, 51), cell('B', 10, 51)],
            &config,
            &mut rng,
        )
        .expect("plan");
        let gap1 = plan.placements[1].x - plan.placements[0].right();
        let gap2 = plan.placements[2].x - plan.placements[1].right();
        assert_eq!((gap1, gap2), (12, 12));
    }

    #[test]
    fn jitter_moves_and_resizes_rendered_glyphs_only() {
        let glyph = crate::glyph::Glyph::new(
            'a',
            image::GrayAlphaImage::from_pixel(4, 4, image::LumaA([0, 255])),
            "w1",
        )
        .expect("glyph");
        let rendered = NormalizedGlyph {
            glyph: Some(&glyph),
            ..cell('a', 40, 51)
        };
        let config = LayoutConfig {
            vertical_jitter: 3,
            scale_jitter: 0.1,
            ..fixed_gaps(4.0)
        };
        let mut rng = StdRng::seed_from_u64(12);
        let glyphs = (0..40).map(|_| rendered).chain([cell(' ', 14, 0)]).collect();
        let plan = plan_line(glyphs, &config, &mut rng).expect("plan");

        let widths: Vec<u32> = plan.placements[..40]
            .iter()
            .map(|p| p.glyph.scaled_width)
            .collect();
        assert!(widths.iter().all(|w| (36..=44).contains(w)));
        assert!(widths.iter().any(|w| *w != 40));
        let ys: Vec<u32> = plan.placements[..40].iter().map(|p| p.y).collect();
        assert!(ys.iter().any(|y| *y != ys[0]));
        for placement in &plan.placements {
            assert!(placement.bottom() <= plan.canvas_height);
        }
        let space = plan.placements[40];
        assert_eq!((space.glyph.scaled_width, space.glyph.scaled_height), (14, 64));
    }

    #[test]
    fn tall_baselines_are_clamped_into_the_canvas() {
        let config = fixed_gaps(2.0);
        let mut rng = StdRng::seed_from_u64(1);
        let plan = plan_line(vec![cell('g', 10, 0)], &config, &mut rng).expect("plan");
        assert_eq!(plan.placements[0].y, 12);
        assert!(plan.placements[0].bottom() <= plan.canvas_height);
    }
}
