use crate::types::*;
#[allow(deprecated)]
use image::codecs::webp::{WebPEncoder, WebPQuality};
use image::{ColorType, DynamicImage, ImageOutputFormat};
use std::io::Cursor;

/// Targets the image engine can encode to.
pub const IMAGE_TARGETS: &[&str] = &["png", "jpg", "jpeg", "webp"];

pub struct ImageProcessor {
    compression_settings: CompressionSettings,
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self {
            compression_settings: CompressionSettings::default(),
        }
    }

    pub fn supports(&self, _from: &str, to: &str) -> bool {
        IMAGE_TARGETS.contains(&to)
    }

    /// Re-encode any decodable image into `to`. The container is detected
    /// from the bytes, so `from` only feeds error messages.
    pub fn convert(&self, content: &[u8], from: &str, to: &str) -> Result<Vec<u8>, ConversionError> {
        if !self.supports(from, to) {
            return Err(ConversionError::UnsupportedConversion {
                category: EngineCategory::Image,
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let img = image::load_from_memory(content)?;
        log::debug!("Decoded {} image {}x{}", from, img.width(), img.height());

        match to {
            "png" => self.encode_png(&img),
            "webp" => self.encode_webp(&img),
            _ => self.encode_jpeg(&img),
        }
    }

    /// Encode image as JPEG; alpha is flattened first.
    fn encode_jpeg(&self, img: &DynamicImage) -> Result<Vec<u8>, ConversionError> {
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut output = Vec::new();
        let mut cursor = Cursor::new(&mut output);

        rgb.write_to(&mut cursor, ImageOutputFormat::Jpeg(self.compression_settings.quality))?;
        Ok(output)
    }

    /// Encode image as PNG
    fn encode_png(&self, img: &DynamicImage) -> Result<Vec<u8>, ConversionError> {
        let mut output = Vec::new();
        let mut cursor = Cursor::new(&mut output);

        img.write_to(&mut cursor, ImageOutputFormat::Png)?;
        Ok(output)
    }

    /// Encode image as lossy WebP at the configured quality
    #[allow(deprecated)]
    fn encode_webp(&self, img: &DynamicImage) -> Result<Vec<u8>, ConversionError> {
        let rgba = img.to_rgba8();
        let mut output = Vec::new();

        WebPEncoder::new_with_quality(&mut output, WebPQuality::lossy(self.compression_settings.quality))
            .encode(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)?;
        Ok(output)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample_png() -> Vec<u8> {
        let mut img = RgbaImage::new(8, 8);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgba([(x * 30) as u8, (y * 30) as u8, 120, 200]);
        }
        let mut output = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut output), ImageOutputFormat::Png)
            .unwrap();
        output
    }

    #[test]
    fn png_to_jpg_flattens_alpha() {
        let output = ImageProcessor::new().convert(&sample_png(), "png", "jpg").unwrap();
        assert_eq!(&output[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn png_to_webp_writes_riff_container() {
        let output = ImageProcessor::new().convert(&sample_png(), "png", "webp").unwrap();
        assert_eq!(&output[..4], b"RIFF");
        assert_eq!(&output[8..12], b"WEBP");
    }

    #[test]
    fn jpg_back_to_png() {
        let processor = ImageProcessor::new();
        let jpg = processor.convert(&sample_png(), "png", "jpg").unwrap();
        let png = processor.convert(&jpg, "jpg", "png").unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn non_image_targets_are_unsupported() {
        let err = ImageProcessor::new().convert(&sample_png(), "jpeg", "pdf").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported image conversion: jpeg → pdf");
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = ImageProcessor::new().convert(b"not an image", "png", "jpg").unwrap_err();
        assert!(matches!(err, ConversionError::Image(_)));
    }
}
