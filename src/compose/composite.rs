use image::imageops::{self, FilterType};
use image::{GrayAlphaImage, GrayImage, Luma};

use super::layout::{LinePlan, Placement};
use super::normalize::{DroppedGlyph, Substitution};
use crate::geom::BBoxPx;
use crate::glyph::{CharBox, GlyphKind, ink_extent_of};

/// A composed line: raster, per-character boxes and the label they spell.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub image: GrayImage,
    pub boxes: Vec<CharBox>,
    pub text: String,
    pub substitutions: Vec<Substitution>,
    pub dropped: Vec<DroppedGlyph>,
}

impl Composite {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Renders `plan` onto a fresh canvas. Glyph rasters are only read.
pub fn paint(plan: &LinePlan<'_>, text: &str, background_level: u8) -> Composite {
    let mut image = GrayImage::from_pixel(
        plan.canvas_width,
        plan.canvas_height,
        Luma([background_level]),
    );
    let mut boxes = Vec::with_capacity(plan.placements.len());
    for placement in &plan.placements {
        boxes.push(paint_placement(&mut image, placement));
    }
    Composite {
        image,
        boxes,
        text: text.to_string(),
        substitutions: Vec::new(),
        dropped: Vec::new(),
    }
}

fn paint_placement(canvas: &mut GrayImage, placement: &Placement<'_>) -> CharBox {
    let glyph = &placement.glyph;
    let cell = BBoxPx::new(placement.x, placement.y, glyph.scaled_width, glyph.scaled_height);
    let Some(source) = glyph.glyph else {
        return CharBox {
            character: glyph.character,
            bbox: cell,
            kind: glyph.kind,
        };
    };

    let scaled = scale_raster(source.image(), glyph.scaled_width, glyph.scaled_height);
    let blend = source.has_alpha();
    for (gx, gy, pixel) in scaled.enumerate_pixels() {
        let x = placement.x + gx;
        let y = placement.y + gy;
        if x >= canvas.width() || y >= canvas.height() {
            continue;
        }
        let [luma, alpha] = pixel.0;
        let out = if blend {
            let a = alpha as f32 / 255.0;
            let bg = canvas.get_pixel(x, y)[0] as f32;
            (luma as f32 * a + bg * (1.0 - a)).round() as u8
        } else {
            luma
        };
        canvas.put_pixel(x, y, Luma([out]));
    }

    let bbox = match ink_extent_of(&scaled) {
        Some(extent) => BBoxPx::new(
            placement.x + extent.left,
            placement.y + extent.top,
            extent.right - extent.left + 1,
            extent.bottom - extent.top + 1,
        ),
        None => cell,
    };
    CharBox {
        character: glyph.character,
        bbox,
        kind: GlyphKind::Ink,
    }
}

fn scale_raster(image: &GrayAlphaImage, width: u32, height: u32) -> GrayAlphaImage {
    if image.dimensions() == (width, height) {
        image.clone()
    } else {
        imageops::resize(image, width, height, FilterType::Triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::normalize::NormalizedGlyph;
    use crate::glyph::Glyph;
    use image::LumaA;

    fn plan_with<'a>(glyph: NormalizedGlyph<'a>, x: u32, y: u32) -> LinePlan<'a> {
        LinePlan {
            placements: vec![Placement { glyph, x, y }],
            canvas_width: 40,
            canvas_height: 20,
            baseline_y: 16,
        }
    }

    #[test]
    fn alpha_glyphs_blend_over_background() {
        let mut raster = GrayAlphaImage::from_pixel(4, 4, LumaA([0, 0]));
        raster.put_pixel(1, 1, LumaA([0, 255]));
        raster.put_pixel(2, 2, LumaA([0, 128]));
        let glyph = Glyph::new('x', raster, "font").expect("glyph");
        let normalized = NormalizedGlyph {
            glyph: Some(&glyph),
            character: 'x',
            kind: GlyphKind::Ink,
            scaled_width: 4,
            scaled_height: 4,
            baseline_offset: 4,
        };
        let composite = paint(&plan_with(normalized, 10, 5), "x", 200);
        assert_eq!(composite.image.get_pixel(11, 6)[0], 0);
        assert_eq!(composite.image.get_pixel(12, 7)[0], 100);
        assert_eq!(composite.image.get_pixel(10, 5)[0], 200);
        assert_eq!(composite.boxes[0].bbox, BBoxPx::new(11, 6, 2, 2));
    }

    #[test]
    fn blank_slots_get_cell_boxes() {
        let normalized = NormalizedGlyph {
            glyph: None,
            character: ' ',
            kind: GlyphKind::Space,
            scaled_width: 7,
            scaled_height: 12,
            baseline_offset: 10,
        };
        let composite = paint(&plan_with(normalized, 3, 4), " ", 255);
        assert_eq!(composite.boxes[0].bbox, BBoxPx::new(3, 4, 7, 12));
        assert!(composite.boxes[0].is_synthetic());
        assert!(composite.image.pixels().all(|pixel| pixel[0] == 255));
    }
}
