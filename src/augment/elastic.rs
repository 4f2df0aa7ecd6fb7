use image::{ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{Interpolation, warp_with};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ElasticPlan, paper_level};
use crate::compose::Composite;
use crate::geom::{BBoxPx, bounds_of_points};

type Field = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Smoothed displacement fields: uniform noise in [-1, 1], blurred by
/// `sigma`, then scaled by `alpha` pixels.
fn displacement(width: u32, height: u32, plan: &ElasticPlan) -> (Field, Field) {
    let mut rng = StdRng::seed_from_u64(plan.seed);
    let mut field = || {
        let raw: Field =
            ImageBuffer::from_fn(width, height, |_, _| Luma([rng.random_range(-1.0f32..=1.0)]));
        let mut smooth = gaussian_blur_f32(&raw, plan.sigma.max(0.1));
        for value in smooth.iter_mut() {
            *value *= plan.alpha;
        }
        smooth
    };
    let dx = field();
    let dy = field();
    (dx, dy)
}

fn at(field: &Field, x: f32, y: f32) -> f32 {
    let (width, height) = field.dimensions();
    let x = (x.round().max(0.0) as u32).min(width - 1);
    let y = (y.round().max(0.0) as u32).min(height - 1);
    field.get_pixel(x, y)[0]
}

/// Points along the outline of a box, about every four pixels.
fn outline(bbox: BBoxPx) -> Vec<(f32, f32)> {
    let mut points = Vec::new();
    let (x1, y1) = (bbox.x as f32, bbox.y as f32);
    let (x2, y2) = (bbox.right() as f32, bbox.bottom() as f32);
    let steps = |length: u32| (length / 4).max(1);
    for i in 0..=steps(bbox.w) {
        let x = x1 + (x2 - x1) * i as f32 / steps(bbox.w) as f32;
        points.push((x, y1));
        points.push((x, y2));
    }
    for i in 0..=steps(bbox.h) {
        let y = y1 + (y2 - y1) * i as f32 / steps(bbox.h) as f32;
        points.push((x1, y));
        points.push((x2, y));
    }
    points
}

/// Local, smooth warping of the strokes. The canvas keeps its size; each
/// box follows the displacement of its outline.
pub(crate) fn deform(composite: Composite, plan: &ElasticPlan) -> Composite {
    let (width, height) = composite.image.dimensions();
    if width == 0 || height == 0 {
        return composite;
    }
    let (dx, dy) = displacement(width, height, plan);
    let paper = paper_level(&composite.image);
    let (max_x, max_y) = ((width - 1) as f32, (height - 1) as f32);
    let image = warp_with(
        &composite.image,
        |x, y| {
            (
                (x + at(&dx, x, y)).clamp(0.0, max_x),
                (y + at(&dy, x, y)).clamp(0.0, max_y),
            )
        },
        Interpolation::Bilinear,
        Luma([paper]),
    );
    // output q samples input q + d(q), so input ink at p lands near p - d(p)
    let boxes = composite
        .boxes
        .into_iter()
        .map(|mut char_box| {
            let moved: Vec<(f32, f32)> = outline(char_box.bbox)
                .into_iter()
                .map(|(x, y)| (x - at(&dx, x, y), y - at(&dy, x, y)))
                .collect();
            char_box.bbox = bounds_of_points(&moved, width, height);
            char_box
        })
        .collect();
    Composite {
        image,
        boxes,
        ..composite
    }
}
