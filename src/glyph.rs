use image::{GrayAlphaImage, GrayImage, LumaA};
use serde::{Deserialize, Serialize};

use crate::error::{SynthError, SynthResult};
use crate::geom::BBoxPx;

/// Luma below this value (on an opaque pixel) counts as ink.
pub const INK_THRESHOLD: u8 = 200;

pub(crate) fn ink_coverage(pixel: LumaA<u8>) -> u8 {
    let [luma, alpha] = pixel.0;
    ((255 - luma as u32) * alpha as u32 / 255) as u8
}

pub(crate) fn is_ink(pixel: LumaA<u8>) -> bool {
    ink_coverage(pixel) > 255 - INK_THRESHOLD
}

/// A single character raster, either scanned handwriting or a rendered font glyph.
#[derive(Debug, Clone)]
pub struct Glyph {
    character: char,
    image: GrayAlphaImage,
    style_id: String,
    baseline: Option<u32>,
    has_alpha: bool,
}

/// Inclusive row/column range of the inked pixels of a glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InkExtent {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Glyph {
    pub fn new(
        character: char,
        image: GrayAlphaImage,
        style_id: impl Into<String>,
    ) -> SynthResult<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(SynthError::invalid_glyph(
                character,
                format!("zero-area image {}x{}", width, height),
            ));
        }
        let has_alpha = image.pixels().any(|pixel| pixel[1] < 255);
        Ok(Self {
            character,
            image,
            style_id: style_id.into(),
            baseline: None,
            has_alpha,
        })
    }

    /// Wraps an opaque grayscale scan (dark ink on light paper).
    pub fn from_luma(
        character: char,
        image: &GrayImage,
        style_id: impl Into<String>,
    ) -> SynthResult<Self> {
        let (width, height) = image.dimensions();
        let mut rgba = GrayAlphaImage::new(width, height);
        for (x, y, pixel) in image.enumerate_pixels() {
            rgba.put_pixel(x, y, LumaA([pixel[0], 255]));
        }
        Self::new(character, rgba, style_id)
    }

    pub fn with_baseline(mut self, baseline: u32) -> Self {
        self.baseline = Some(baseline.min(self.native_height()));
        self
    }

    pub fn character(&self) -> char {
        self.character
    }

    pub fn image(&self) -> &GrayAlphaImage {
        &self.image
    }

    pub fn style_id(&self) -> &str {
        &self.style_id
    }

    pub fn baseline(&self) -> Option<u32> {
        self.baseline
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    pub fn native_width(&self) -> u32 {
        self.image.width()
    }

    pub fn native_height(&self) -> u32 {
        self.image.height()
    }

    pub fn ink_extent(&self) -> Option<InkExtent> {
        ink_extent_of(&self.image)
    }
}

pub(crate) fn ink_extent_of(image: &GrayAlphaImage) -> Option<InkExtent> {
    let mut extent: Option<InkExtent> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if !is_ink(*pixel) {
            continue;
        }
        extent = Some(match extent {
            None => InkExtent {
                left: x,
                top: y,
                right: x,
                bottom: y,
            },
            Some(e) => InkExtent {
                left: e.left.min(x),
                top: e.top.min(y),
                right: e.right.max(x),
                bottom: e.bottom.max(y),
            },
        });
    }
    extent
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlyphKind {
    Ink,
    Space,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharBox {
    pub character: char,
    pub bbox: BBoxPx,
    pub kind: GlyphKind,
}

impl CharBox {
    pub fn is_synthetic(&self) -> bool {
        self.kind != GlyphKind::Ink
    }
}
