use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use rand::Rng;
use rand::rngs::StdRng;

use crate::augment::paper_level;
use crate::compose::Composite;
use crate::config::PostprocessConfig;
use crate::geom::{BBoxPx, bounds_of_points};

/// Final canvas shaping after augmentation: whitespace crop, then an
/// aspect-preserving letterbox. Boxes are carried along.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    config: PostprocessConfig,
}

impl PostProcessor {
    pub fn new(config: PostprocessConfig) -> Self {
        Self { config }
    }

    /// Returns the shaped composite and the names of the steps that ran.
    pub fn apply(&self, composite: Composite, rng: &mut StdRng) -> (Composite, Vec<&'static str>) {
        let mut steps = Vec::new();
        let mut composite = composite;
        if self.config.crop_whitespace {
            let margin = self.config.crop_margin;
            let margins = [(); 4].map(|_| rng.random_range(margin[0]..=margin[1]));
            if let Some(cropped) = crop(&composite, self.config.ink_threshold, margins) {
                composite = cropped;
                steps.push("crop");
            }
        }
        let [width, height] = self.config.target_size;
        if width > 0 && height > 0 {
            composite = letterbox(composite, width, height);
            steps.push("resize");
        }
        (composite, steps)
    }
}

/// Bounds of every pixel darker than `threshold`, merged with every box.
fn content_bounds(composite: &Composite, threshold: u8) -> Option<BBoxPx> {
    let mut points: Vec<(f32, f32)> = Vec::new();
    let mut ink: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in composite.image.enumerate_pixels() {
        if pixel[0] < threshold {
            ink = Some(match ink {
                Some((l, t, r, b)) => (l.min(x), t.min(y), r.max(x + 1), b.max(y + 1)),
                None => (x, y, x + 1, y + 1),
            });
        }
    }
    if let Some((l, t, r, b)) = ink {
        points.extend([(l as f32, t as f32), (r as f32, b as f32)]);
    }
    for char_box in &composite.boxes {
        points.extend(char_box.bbox.corners());
    }
    if points.is_empty() {
        return None;
    }
    Some(bounds_of_points(&points, composite.width(), composite.height()))
}

/// `margins` are left, top, right, bottom.
fn crop(composite: &Composite, threshold: u8, margins: [u32; 4]) -> Option<Composite> {
    let bounds = content_bounds(composite, threshold)?;
    if bounds.area() == 0 {
        return None;
    }
    let [left, top, right, bottom] = margins;
    let x = bounds.x.saturating_sub(left);
    let y = bounds.y.saturating_sub(top);
    let x2 = (bounds.right() + right).min(composite.width());
    let y2 = (bounds.bottom() + bottom).min(composite.height());
    let image = imageops::crop_imm(&composite.image, x, y, x2 - x, y2 - y).to_image();
    let boxes = composite
        .boxes
        .iter()
        .map(|char_box| {
            let mut char_box = char_box.clone();
            char_box.bbox.x -= x;
            char_box.bbox.y -= y;
            char_box
        })
        .collect();
    Some(Composite {
        image,
        boxes,
        ..composite.clone()
    })
}

/// Scales to fit `width` x `height` and centres on a paper-coloured canvas.
fn letterbox(composite: Composite, width: u32, height: u32) -> Composite {
    let (src_w, src_h) = composite.image.dimensions();
    if src_w == 0 || src_h == 0 {
        return composite;
    }
    let scale = (width as f32 / src_w as f32).min(height as f32 / src_h as f32);
    let new_w = ((src_w as f32 * scale) as u32).clamp(1, width);
    let new_h = ((src_h as f32 * scale) as u32).clamp(1, height);
    let resized = imageops::resize(&composite.image, new_w, new_h, FilterType::Lanczos3);
    let pad_x = (width - new_w) / 2;
    let pad_y = (height - new_h) / 2;
    let mut image = GrayImage::from_pixel(width, height, Luma([paper_level(&composite.image)]));
    imageops::replace(&mut image, &resized, pad_x as i64, pad_y as i64);

    let (sx, sy) = (new_w as f32 / src_w as f32, new_h as f32 / src_h as f32);
    let boxes = composite
        .boxes
        .into_iter()
        .map(|mut char_box| {
            let corners = char_box
                .bbox
                .corners()
                .map(|(x, y)| (pad_x as f32 + x * sx, pad_y as f32 + y * sy));
            char_box.bbox = bounds_of_points(&corners, width, height);
            char_box
        })
        .collect();
    Composite {
        image,
        boxes,
        ..composite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::{CharBox, GlyphKind};
    use rand::SeedableRng;

    fn line() -> Composite {
        let mut image = GrayImage::from_pixel(100, 50, Luma([250]));
        for y in 20..30 {
            for x in 30..60 {
                image.put_pixel(x, y, Luma([20]));
            }
        }
        Composite {
            image,
            boxes: vec![
                CharBox {
                    character: 'a',
                    bbox: BBoxPx::new(30, 20, 30, 10),
                    kind: GlyphKind::Ink,
                },
                CharBox {
                    character: ' ',
                    bbox: BBoxPx::new(60, 15, 8, 20),
                    kind: GlyphKind::Space,
                },
            ],
            text: "a ".to_string(),
            substitutions: Vec::new(),
            dropped: Vec::new(),
        }
    }

    #[test]
    fn crop_keeps_ink_and_every_box() {
        let cropped = crop(&line(), 230, [2, 0, 1, 3]).expect("crop");
        // content spans x 30..68 and y 15..35
        assert_eq!(cropped.image.dimensions(), (38 + 3, 20 + 3));
        assert_eq!(cropped.boxes[0].bbox, BBoxPx::new(2, 5, 30, 10));
        assert_eq!(cropped.boxes[1].bbox, BBoxPx::new(32, 0, 8, 20));
        assert_eq!(cropped.image.get_pixel(2, 5)[0], 20);
    }

    #[test]
    fn margins_stop_at_the_canvas_edge() {
        let mut composite = line();
        composite.boxes[1].bbox = BBoxPx::new(90, 0, 10, 50);
        let cropped = crop(&composite, 230, [3, 3, 3, 3]).expect("crop");
        assert_eq!(cropped.image.dimensions(), (73, 50));
    }

    #[test]
    fn letterbox_scales_boxes_with_pixels() {
        let out = letterbox(line(), 200, 50);
        assert_eq!(out.image.dimensions(), (200, 50));
        // 100x50 fits as 100x50 at scale 1, centred with 50 px each side
        assert_eq!(out.boxes[0].bbox, BBoxPx::new(80, 20, 30, 10));
        assert_eq!(out.image.get_pixel(10, 25)[0], 250);

        let small = letterbox(line(), 50, 50);
        assert_eq!(small.boxes[0].bbox, BBoxPx::new(15, 22, 15, 5));
    }

    #[test]
    fn disabled_processor_changes_nothing() {
        let processor = PostProcessor::new(PostprocessConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        let (out, steps) = processor.apply(line(), &mut rng);
        assert!(steps.is_empty());
        assert_eq!(out, line());
    }

    #[test]
    fn crop_then_resize_reports_both_steps() {
        let processor = PostProcessor::new(PostprocessConfig {
            crop_whitespace: true,
            target_size: [128, 32],
            ..PostprocessConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(4);
        let (out, steps) = processor.apply(line(), &mut rng);
        assert_eq!(steps, vec!["crop", "resize"]);
        assert_eq!(out.image.dimensions(), (128, 32));
        for char_box in &out.boxes {
            assert!(char_box.bbox.right() <= 128 && char_box.bbox.bottom() <= 32);
        }
    }
}
