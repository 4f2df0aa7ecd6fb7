use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use imageproc::noise::gaussian_noise;

use super::{BlurPlan, NoisePlan, PhotometricPlan};

/// Brightness scales the value, contrast stretches it around mid-grey.
pub(crate) fn photometric(image: &mut GrayImage, plan: &PhotometricPlan) {
    for pixel in image.pixels_mut() {
        let value = pixel[0] as f32 * plan.brightness;
        let value = (value - 127.5) * plan.contrast + 127.5;
        pixel[0] = value.round().clamp(0.0, 255.0) as u8;
    }
}

pub(crate) fn noise(image: &GrayImage, plan: &NoisePlan) -> GrayImage {
    if plan.stddev <= 0.0 {
        return image.clone();
    }
    gaussian_noise(image, 0.0, plan.stddev as f64, plan.seed)
}

/// Sigma follows the usual kernel-size rule, so a 3px kernel gives 0.8.
pub(crate) fn blur(image: &GrayImage, plan: &BlurPlan) -> GrayImage {
    gaussian_blur_f32(image, kernel_sigma(plan.kernel))
}

fn kernel_sigma(kernel: u32) -> f32 {
    0.3 * ((kernel.max(3) as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn neutral_photometric_is_identity() {
        let mut image = GrayImage::from_fn(16, 4, |x, _| Luma([(x * 16) as u8]));
        let original = image.clone();
        photometric(
            &mut image,
            &PhotometricPlan {
                brightness: 1.0,
                contrast: 1.0,
            },
        );
        assert_eq!(image, original);
    }

    #[test]
    fn contrast_pushes_values_apart() {
        let mut image = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 100 } else { 160 }]));
        photometric(
            &mut image,
            &PhotometricPlan {
                brightness: 1.0,
                contrast: 2.0,
            },
        );
        assert_eq!(image.get_pixel(0, 0)[0], 73);
        assert_eq!(image.get_pixel(1, 0)[0], 193);
    }

    #[test]
    fn noise_is_seeded() {
        let image = GrayImage::from_pixel(20, 20, Luma([128]));
        let plan = NoisePlan {
            stddev: 6.0,
            seed: 17,
        };
        let a = noise(&image, &plan);
        assert_eq!(a, noise(&image, &plan));
        assert_ne!(a, image);
    }

    #[test]
    fn blur_softens_edges() {
        let image = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 0 } else { 255 }]));
        let blurred = blur(&image, &BlurPlan { kernel: 5 });
        let edge = blurred.get_pixel(10, 10)[0];
        assert!(edge > 0 && edge < 255);
        assert!((kernel_sigma(3) - 0.8).abs() < 1e-6);
    }
}
