use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::debug;

use super::paper_level;
use crate::compose::Composite;
use crate::geom::bounds_of_points;

/// Rotates about the centre, growing the canvas so no corner is cut off.
pub(crate) fn rotate(composite: Composite, degrees: f32) -> Composite {
    let (width, height) = composite.image.dimensions();
    let theta = degrees.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let out_width = (width as f32 * cos + height as f32 * sin).ceil().max(1.0) as u32;
    let out_height = (width as f32 * sin + height as f32 * cos).ceil().max(1.0) as u32;
    let projection = Projection::translate(out_width as f32 / 2.0, out_height as f32 / 2.0)
        * Projection::rotate(theta)
        * Projection::translate(-(width as f32) / 2.0, -(height as f32) / 2.0);
    warp_composite(composite, &projection, out_width, out_height)
}

/// Moves each corner by its offset, scaled by the shorter canvas side.
pub(crate) fn perspective(composite: Composite, offsets: &[(f32, f32); 4]) -> Composite {
    let (width, height) = composite.image.dimensions();
    let (w, h) = (width as f32, height as f32);
    let reach = w.min(h);
    let from = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let mut to = from;
    for (corner, (dx, dy)) in to.iter_mut().zip(offsets) {
        corner.0 += dx * reach;
        corner.1 += dy * reach;
    }
    let Some(projection) = Projection::from_control_points(from, to) else {
        debug!("degenerate perspective offsets, skipping warp");
        return composite;
    };
    warp_composite(composite, &projection, width, height)
}

fn warp_composite(
    composite: Composite,
    projection: &Projection,
    out_width: u32,
    out_height: u32,
) -> Composite {
    let paper = paper_level(&composite.image);
    let mut image = GrayImage::from_pixel(out_width, out_height, Luma([paper]));
    warp_into(
        &composite.image,
        projection,
        Interpolation::Bilinear,
        Luma([paper]),
        &mut image,
    );
    let boxes = composite
        .boxes
        .into_iter()
        .map(|mut char_box| {
            let corners = char_box.bbox.corners().map(|point| *projection * point);
            char_box.bbox = bounds_of_points(&corners, out_width, out_height);
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
    use crate::geom::BBoxPx;
    use crate::glyph::{CharBox, GlyphKind};

    fn square() -> Composite {
        let mut image = GrayImage::from_pixel(60, 40, Luma([255]));
        for y in 10..20 {
            for x in 20..30 {
                image.put_pixel(x, y, Luma([0]));
            }
        }
        Composite {
            image,
            boxes: vec![CharBox {
                character: 'x',
                bbox: BBoxPx::new(20, 10, 10, 10),
                kind: GlyphKind::Ink,
            }],
            text: "x".to_string(),
            substitutions: Vec::new(),
            dropped: Vec::new(),
        }
    }

    fn ink_inside(composite: &Composite, slack: u32) -> bool {
        let bbox = composite.boxes[0].bbox;
        composite
            .image
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel[0] < 100)
            .all(|(x, y, _)| {
                x + slack >= bbox.x
                    && x <= bbox.right() + slack
                    && y + slack >= bbox.y
                    && y <= bbox.bottom() + slack
            })
    }

    #[test]
    fn rotation_expands_canvas_and_moves_boxes_with_ink() {
        let rotated = rotate(square(), 30.0);
        assert!(rotated.image.width() > 60);
        assert!(rotated.image.height() > 40);
        assert!(ink_inside(&rotated, 1));
        assert_eq!(rotated.image.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn perspective_keeps_canvas_and_box_correspondence() {
        let offsets = [(0.05, 0.02), (-0.08, 0.04), (-0.03, -0.06), (0.07, -0.01)];
        let warped = perspective(square(), &offsets);
        assert_eq!(warped.image.dimensions(), (60, 40));
        assert!(ink_inside(&warped, 1));
        assert!(warped.boxes[0].bbox.area() > 0);
    }

    #[test]
    fn zero_rotation_is_near_identity() {
        let original = square();
        let rotated = rotate(original.clone(), 0.0);
        assert_eq!(rotated.image.dimensions(), original.image.dimensions());
        assert_eq!(rotated.boxes, original.boxes);
    }
}
