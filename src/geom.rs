use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBoxPx {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BBoxPx {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn corners(&self) -> [(f32, f32); 4] {
        let x1 = self.x as f32;
        let y1 = self.y as f32;
        let x2 = self.right() as f32;
        let y2 = self.bottom() as f32;
        [(x1, y1), (x2, y1), (x2, y2), (x1, y2)]
    }
}

/// Axis-aligned bounds of transformed points, clipped to the image.
pub(crate) fn bounds_of_points(points: &[(f32, f32)], width: u32, height: u32) -> BBoxPx {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let clamp_x = |v: f32| v.round().clamp(0.0, width as f32) as u32;
    let clamp_y = |v: f32| v.round().clamp(0.0, height as f32) as u32;
    let x1 = clamp_x(min_x);
    let y1 = clamp_y(min_y);
    let x2 = clamp_x(max_x).max(x1);
    let y2 = clamp_y(max_y).max(y1);
    BBoxPx {
        x: x1,
        y: y1,
        w: x2 - x1,
        h: y2 - y1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_bounds_are_clipped() {
        let bbox = bounds_of_points(&[(-3.2, 4.0), (20.6, 9.0), (5.0, 50.0)], 16, 32);
        assert_eq!(bbox, BBoxPx::new(0, 4, 16, 28));
    }
}
