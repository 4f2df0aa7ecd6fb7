use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{BackgroundFill, BackgroundPlan};

/// Paper textures shared read-only by all workers.
#[derive(Debug, Clone, Default)]
pub struct Backgrounds {
    images: Vec<GrayImage>,
}

impl Backgrounds {
    pub fn new(images: Vec<GrayImage>) -> Self {
        let images = images
            .into_iter()
            .filter(|image| image.width() > 0 && image.height() > 0)
            .collect();
        Self { images }
    }

    /// Loads every decodable image in `dir`; undecodable files are skipped.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to list background directory: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        let mut images = Vec::new();
        for path in paths {
            match image::open(&path) {
                Ok(image) => images.push(image.to_luma8()),
                Err(err) => warn!("skipping background {}: {}", path.display(), err),
            }
        }
        info!("loaded {} background textures", images.len());
        Ok(Self::new(images))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// A `width` x `height` crop, upscaling the texture first when it is too small.
    fn patch(&self, index: usize, offset: (f32, f32), width: u32, height: u32) -> Option<GrayImage> {
        let texture = self.images.get(index)?;
        let (tw, th) = texture.dimensions();
        let scale = (width as f32 / tw as f32).max(height as f32 / th as f32).max(1.0);
        let resized;
        let texture = if scale > 1.0 {
            let sw = ((tw as f32 * scale).ceil() as u32).max(width);
            let sh = ((th as f32 * scale).ceil() as u32).max(height);
            resized = imageops::resize(texture, sw, sh, FilterType::Triangle);
            &resized
        } else {
            texture
        };
        let x = (offset.0 * (texture.width() - width) as f32).round() as u32;
        let y = (offset.1 * (texture.height() - height) as f32).round() as u32;
        Some(imageops::crop_imm(texture, x, y, width, height).to_image())
    }
}

/// Darken-blends the paper with the chosen background; ink stays on top.
pub(crate) fn apply(image: &mut GrayImage, plan: &BackgroundPlan, backgrounds: &Backgrounds) {
    let (width, height) = image.dimensions();
    let patch = match plan.fill {
        BackgroundFill::Texture { index, offset } => backgrounds.patch(index, offset, width, height),
        BackgroundFill::Solid { .. } => None,
    };
    let solid = match plan.fill {
        BackgroundFill::Solid { level } => level,
        BackgroundFill::Texture { .. } => 255,
    };
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let fg = pixel[0];
        if fg < plan.ink_threshold {
            continue;
        }
        let bg = patch.as_ref().map_or(solid, |patch| patch.get_pixel(x, y)[0]);
        let paper = fg.min(bg) as f32;
        let out = plan.alpha * paper + (1.0 - plan.alpha) * fg as f32;
        *pixel = Luma([out.round().clamp(0.0, 255.0) as u8]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> GrayImage {
        let mut image = GrayImage::from_pixel(40, 10, Luma([255]));
        image.put_pixel(5, 5, Luma([20]));
        image
    }

    #[test]
    fn solid_fill_tints_paper_but_not_ink() {
        let mut image = line();
        let plan = BackgroundPlan {
            fill: BackgroundFill::Solid { level: 200 },
            alpha: 1.0,
            ink_threshold: 180,
        };
        apply(&mut image, &plan, &Backgrounds::default());
        assert_eq!(image.get_pixel(0, 0)[0], 200);
        assert_eq!(image.get_pixel(5, 5)[0], 20);
    }

    #[test]
    fn small_textures_are_upscaled_to_cover() {
        let backgrounds = Backgrounds::new(vec![GrayImage::from_pixel(8, 4, Luma([150]))]);
        let mut image = line();
        let plan = BackgroundPlan {
            fill: BackgroundFill::Texture {
                index: 0,
                offset: (0.7, 0.2),
            },
            alpha: 0.5,
            ink_threshold: 180,
        };
        apply(&mut image, &plan, &backgrounds);
        assert_eq!(image.get_pixel(39, 9)[0], 203);
        assert_eq!(image.get_pixel(5, 5)[0], 20);
    }

    #[test]
    fn load_dir_skips_non_images() {
        let dir = tempfile::tempdir().expect("tempdir");
        GrayImage::from_pixel(16, 16, Luma([180]))
            .save(dir.path().join("paper.png"))
            .expect("save");
        fs::write(dir.path().join("notes.txt"), "not an image").expect("write");
        let backgrounds = Backgrounds::load_dir(dir.path()).expect("load");
        assert_eq!(backgrounds.len(), 1);
    }
}
