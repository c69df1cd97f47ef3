//! Upload decoding into the fixed-size RGB array the classifiers expect.
//!
//! Any pixel format the `image` crate understands (grayscale, RGBA, palette,
//! 16-bit) is converted to 8-bit RGB, then resized to a square without
//! preserving aspect ratio, matching the classifiers' training input.

use image::imageops::{self, FilterType};
use ndarray::Array3;
use tracing::debug;

use crate::error::{InferenceError, InferenceResult};

/// Decoded image as a `height x width x channels` array of `u8` (RGB).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pixels: Array3<u8>,
}

impl DecodedImage {
    /// Wrap an existing pixel array. The channel count is not enforced here;
    /// [`crate::LeafImageValidator`] rejects anything that is not 3-channel.
    pub fn from_array(pixels: Array3<u8>) -> Self {
        Self { pixels }
    }

    /// A `size x size` image filled with a single RGB color.
    pub fn uniform(size: u32, rgb: [u8; 3]) -> Self {
        let size = size as usize;
        let pixels = Array3::from_shape_fn((size, size, 3), |(_, _, c)| rgb[c]);
        Self { pixels }
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }
}

/// Turns raw upload bytes into a [`DecodedImage`].
#[derive(Debug, Clone, Copy)]
pub struct ImageDecoder {
    size: u32,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

impl ImageDecoder {
    /// Side length used by the shipped classifiers.
    pub const DEFAULT_SIZE: u32 = 256;

    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }

    /// Output side length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Decode, convert to RGB and resize to `size x size`.
    ///
    /// Every underlying decoder failure is reported as
    /// [`InferenceError::ImageDecode`].
    pub fn decode(&self, bytes: &[u8]) -> InferenceResult<DecodedImage> {
        if bytes.is_empty() {
            return Err(InferenceError::image_decode("empty upload"));
        }

        let img = image::load_from_memory(bytes)
            .map_err(|e| InferenceError::image_decode(e.to_string()))?;

        let (orig_w, orig_h) = (img.width(), img.height());
        let rgb = img.to_rgb8();
        let rgb = if rgb.dimensions() == (self.size, self.size) {
            rgb
        } else {
            imageops::resize(&rgb, self.size, self.size, FilterType::CatmullRom)
        };

        let (w, h) = rgb.dimensions();
        let pixels = Array3::from_shape_vec((h as usize, w as usize, 3), rgb.into_raw())
            .map_err(|e| InferenceError::image_decode(format!("pixel buffer shape: {e}")))?;

        debug!(
            orig_width = orig_w,
            orig_height = orig_h,
            size = self.size,
            "Decoded upload"
        );

        Ok(DecodedImage { pixels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn test_decode_resizes_to_square() {
        let img = RgbImage::from_pixel(64, 32, Rgb([10, 200, 30]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageOutputFormat::Png);

        let decoded = ImageDecoder::new(256).decode(&bytes).unwrap();
        assert_eq!(decoded.height(), 256);
        assert_eq!(decoded.width(), 256);
        assert_eq!(decoded.channels(), 3);
        let green = decoded.pixels()[[100, 100, 1]];
        assert!((199..=200).contains(&green), "green channel was {green}");
    }

    #[test]
    fn test_decode_converts_grayscale_and_rgba() {
        let gray = GrayImage::from_pixel(16, 16, Luma([90]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageOutputFormat::Png);
        let decoded = ImageDecoder::new(8).decode(&bytes).unwrap();
        assert_eq!(decoded.channels(), 3);
        let px = decoded.pixels();
        assert!(px[[0, 0, 0]].abs_diff(90) <= 1);
        assert_eq!(px[[0, 0, 0]], px[[0, 0, 2]]);

        let rgba = RgbaImage::from_pixel(16, 16, Rgba([1, 2, 3, 128]));
        let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageOutputFormat::Png);
        let decoded = ImageDecoder::new(16).decode(&bytes).unwrap();
        assert_eq!(decoded.channels(), 3);
        assert_eq!(decoded.pixels()[[5, 5, 2]], 3);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let img = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 77]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageOutputFormat::Jpeg(90));

        let decoder = ImageDecoder::default();
        let first = decoder.decode(&bytes).unwrap();
        let second = decoder.decode(&bytes).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_decode_rejects_non_images() {
        let decoder = ImageDecoder::default();
        assert!(matches!(
            decoder.decode(&[]),
            Err(InferenceError::ImageDecode(_))
        ));
        assert!(matches!(
            decoder.decode(b"this is a plain text file, not a photo"),
            Err(InferenceError::ImageDecode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let img = RgbImage::from_pixel(32, 32, Rgb([50, 120, 50]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageOutputFormat::Png);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            ImageDecoder::default().decode(truncated),
            Err(InferenceError::ImageDecode(_))
        ));
    }

    #[test]
    fn test_uniform_image() {
        let img = DecodedImage::uniform(4, [1, 2, 3]);
        assert_eq!(img.pixels().dim(), (4, 4, 3));
        assert_eq!(img.pixels()[[3, 3, 1]], 2);
    }
}
