use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use larder_core::PreprocessConfig;
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Image has no pixels")]
    EmptyImage,
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// 3x3 sharpen kernel; weights sum to 16 and `sharpen` divides by that.
const SHARPEN_KERNEL: [i32; 9] = [-2, -2, -2, -2, 32, -2, -2, -2, -2];
const SHARPEN_SCALE: i32 = 16;

/// A decoded source image plus its EXIF orientation tag (1 when absent).
pub struct RawImage {
    pub image: DynamicImage,
    pub orientation: u32,
}

impl RawImage {
    /// Decode JPEG / PNG / WEBP / ... bytes. Fails only when the bytes are not
    /// a decodable image; missing EXIF is not an error.
    pub fn decode(data: &[u8]) -> Result<Self, PreprocessError> {
        let image = image::load_from_memory(data)?;
        Ok(Self { image, orientation: read_exif_orientation(data) })
    }
}

impl From<DynamicImage> for RawImage {
    fn from(image: DynamicImage) -> Self {
        Self { image, orientation: 1 }
    }
}

/// Image handed to the recognizer. `degraded` is set when normalization
/// failed and the original bitmap was passed through unchanged.
pub struct NormalizedImage {
    image: DynamicImage,
    degraded: bool,
}

impl NormalizedImage {
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn to_png(&self) -> Result<Vec<u8>, PreprocessError> {
        encode_as_png(&self.image)
    }
}

/// Makes receipt photos friendlier to OCR: upright, grayscale, stretched,
/// sharpened and, for small photos, upscaled.
#[derive(Debug, Clone, Default)]
pub struct ImageNormalizer {
    config: PreprocessConfig,
}

impl From<&PreprocessConfig> for ImageNormalizer {
    fn from(config: &PreprocessConfig) -> Self {
        Self { config: config.clone() }
    }
}

impl ImageNormalizer {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Normalize, or hand back the original image if any step fails.
    pub fn normalize(&self, raw: RawImage) -> NormalizedImage {
        match self.try_normalize(&raw) {
            Ok(image) => NormalizedImage { image, degraded: false },
            Err(e) => {
                warn!("Image normalization failed, using original image: {e}");
                NormalizedImage { image: raw.image, degraded: true }
            }
        }
    }

    pub fn try_normalize(&self, raw: &RawImage) -> Result<DynamicImage, PreprocessError> {
        let (width, height) = (raw.image.width(), raw.image.height());
        if width == 0 || height == 0 {
            return Err(PreprocessError::EmptyImage);
        }

        let rotated = apply_orientation(&raw.image, raw.orientation);
        let upright = rotated.as_ref().unwrap_or(&raw.image);

        let gray = stretch_contrast(upright.to_luma8());
        let sharp = sharpen(&gray);

        let short_side = sharp.width().min(sharp.height());
        if short_side >= self.config.min_short_side {
            return Ok(DynamicImage::ImageLuma8(sharp));
        }

        // The upscale is capped so the longer side stays within max_dimension.
        let max = self.config.max_dimension;
        let long_side = sharp.width().max(sharp.height());
        let scale = f64::from(self.config.upscale_factor)
            .min(f64::from(max) / f64::from(long_side));
        if scale <= 1.0 {
            debug!(long_side, max, "Upscale skipped, image already at the size limit");
            return Ok(DynamicImage::ImageLuma8(sharp));
        }

        let new_w = ((f64::from(sharp.width()) * scale) as u32).clamp(1, max);
        let new_h = ((f64::from(sharp.height()) * scale) as u32).clamp(1, max);
        let scaled = imageops::resize(&sharp, new_w, new_h, FilterType::CatmullRom);
        Ok(DynamicImage::ImageLuma8(scaled))
    }
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Transform for an EXIF orientation tag; `None` when the image is already
/// upright or the tag is unknown.
pub fn apply_orientation(img: &DynamicImage, orientation: u32) -> Option<DynamicImage> {
    match orientation {
        2 => Some(img.fliph()),
        3 => Some(img.rotate180()),
        4 => Some(img.flipv()),
        5 => Some(img.rotate90().fliph()),
        6 => Some(img.rotate90()),
        7 => Some(img.rotate270().fliph()),
        8 => Some(img.rotate270()),
        _ => None,
    }
}

/// Linear min/max stretch to the full 0..=255 range.
pub fn stretch_contrast(gray: GrayImage) -> GrayImage {
    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px == min_px {
        // Uniform image: nothing to stretch.
        return gray;
    }

    let range = (max_px - min_px) as u32;
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        let v = ((p - min_px) as u32 * 255 / range) as u8;
        Luma([v])
    })
}

/// 3x3 sharpen. Border pixels are copied from the source.
///
/// `imageops::filter3x3` applies the same kernel but leaves a zeroed 1 px
/// frame, which blackens strips one or two pixels thick entirely.
pub fn sharpen(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    ImageBuffer::from_fn(w, h, |x, y| {
        if x == 0 || y == 0 || x + 1 >= w || y + 1 >= h {
            return *gray.get_pixel(x, y);
        }
        let mut acc = 0i32;
        for (i, weight) in SHARPEN_KERNEL.iter().enumerate() {
            let px = x + i as u32 % 3 - 1;
            let py = y + i as u32 / 3 - 1;
            acc += weight * i32::from(gray.get_pixel(px, py)[0]);
        }
        let v = (acc + SHARPEN_SCALE / 2).div_euclid(SHARPEN_SCALE);
        Luma([v.clamp(0, 255) as u8])
    })
}

fn encode_as_png(img: &DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
