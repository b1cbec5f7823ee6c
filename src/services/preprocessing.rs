use crate::models::config::PreprocessingConfig;
use image::{DynamicImage, GenericImageView, ImageBuffer, Luma};
use imageproc::contrast::otsu_level;

/// Deterministic image cleanup applied before recognition: grayscale,
/// conditional upscaling for small crops, brightness normalization, and
/// Otsu binarization. Best-effort enhancement, never a hard dependency.
pub struct Preprocessor {
    config: PreprocessingConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    /// Full pipeline. On any internal failure the original pixels are
    /// returned unprocessed; a degraded request beats a failed one.
    pub fn preprocess(&self, image: &DynamicImage) -> DynamicImage {
        match self.run(image) {
            Ok(processed) => processed,
            Err(reason) => {
                tracing::warn!(reason, "preprocessing failed, using raw image");
                image.clone()
            }
        }
    }

    fn run(&self, image: &DynamicImage) -> Result<DynamicImage, &'static str> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err("empty image");
        }

        // Step 1: collapse color channels.
        let mut gray = image.to_luma8();

        // Step 2: small source text needs magnification before recognition.
        if gray.height() < self.config.min_height {
            gray = self.upscale(&gray);
        }

        // Step 3: the game UI draws light text on dark panels; the engine
        // favors dark-on-light, so flip when the frame is mostly dark.
        if mean_brightness(&gray) < 128 {
            for pixel in gray.pixels_mut() {
                pixel[0] = 255 - pixel[0];
            }
        }

        // Step 4: crisp black/white split at the optimal global threshold.
        Ok(DynamicImage::ImageLuma8(binarize(&gray)))
    }

    fn upscale(&self, gray: &ImageBuffer<Luma<u8>, Vec<u8>>) -> ImageBuffer<Luma<u8>, Vec<u8>> {
        let new_width = (gray.width() as f64 * self.config.upscale_factor) as u32;
        let new_height = (gray.height() as f64 * self.config.upscale_factor) as u32;
        image::imageops::resize(
            gray,
            new_width.max(1),
            new_height.max(1),
            image::imageops::FilterType::CatmullRom,
        )
    }
}

fn mean_brightness(gray: &ImageBuffer<Luma<u8>, Vec<u8>>) -> u8 {
    let sum: u64 = gray.pixels().map(|p| p[0] as u64).sum();
    let count = gray.pixels().len() as u64;
    if count == 0 {
        return 0;
    }
    (sum / count) as u8
}

fn binarize(gray: &ImageBuffer<Luma<u8>, Vec<u8>>) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    let threshold = otsu_level(gray);
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}
