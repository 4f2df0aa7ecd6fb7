use image::{GrayImage, Luma};

use super::{StrokeOp, StrokePlan, paper_level};
use crate::compose::Composite;
use crate::geom::BBoxPx;

pub(crate) fn apply(composite: &mut Composite, plan: &StrokePlan) {
    let paper = paper_level(&composite.image);
    match plan.op {
        StrokeOp::Thicken { radius } => {
            composite.image = rank_filter(&composite.image, radius, u8::min);
            let (width, height) = composite.image.dimensions();
            for char_box in composite.boxes.iter_mut().filter(|b| !b.is_synthetic()) {
                char_box.bbox = grow(char_box.bbox, radius, width, height);
            }
        }
        StrokeOp::Thin { radius } => {
            composite.image = rank_filter(&composite.image, radius, u8::max);
        }
    }
    if !plan.gaps.is_empty() {
        cut_gaps(composite, plan, paper);
    }
}

/// Square min or max filter. Ink is dark, so `min` thickens strokes and
/// `max` thins them.
fn rank_filter(image: &GrayImage, radius: u32, pick: fn(u8, u8) -> u8) -> GrayImage {
    if radius == 0 {
        return image.clone();
    }
    let (width, height) = image.dimensions();
    let r = radius as i64;
    let mut rows = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let lo = (x as i64 - r).max(0) as u32;
            let hi = (x as i64 + r).min(width as i64 - 1) as u32;
            let value = (lo..=hi)
                .map(|sx| image.get_pixel(sx, y)[0])
                .reduce(pick)
                .unwrap_or(0);
            rows.put_pixel(x, y, Luma([value]));
        }
    }
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let lo = (y as i64 - r).max(0) as u32;
        let hi = (y as i64 + r).min(height as i64 - 1) as u32;
        for x in 0..width {
            let value = (lo..=hi)
                .map(|sy| rows.get_pixel(x, sy)[0])
                .reduce(pick)
                .unwrap_or(0);
            out.put_pixel(x, y, Luma([value]));
        }
    }
    out
}

fn grow(bbox: BBoxPx, by: u32, width: u32, height: u32) -> BBoxPx {
    let x = bbox.x.saturating_sub(by);
    let y = bbox.y.saturating_sub(by);
    let right = (bbox.right() + by).min(width);
    let bottom = (bbox.bottom() + by).min(height);
    BBoxPx::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
}

/// Paints short paper-coloured runs across the text band.
fn cut_gaps(composite: &mut Composite, plan: &StrokePlan, paper: u8) {
    let (width, height) = composite.image.dimensions();
    let inked = composite.boxes.iter().filter(|b| !b.is_synthetic());
    let top = inked.clone().map(|b| b.bbox.y).min().unwrap_or(0);
    let bottom = inked.map(|b| b.bbox.bottom()).max().unwrap_or(height).max(top + 1);
    for gap in &plan.gaps {
        let length = gap.length.min(width);
        let x0 = (gap.fx * (width - length) as f32).round() as u32;
        let y = (top as f32 + gap.fy * (bottom - top - 1) as f32).round() as u32;
        if y >= height {
            continue;
        }
        for x in x0..(x0 + length).min(width) {
            composite.image.put_pixel(x, y, Luma([paper]));
        }
    }
}
