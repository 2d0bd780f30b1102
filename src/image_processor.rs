use crate::types::*;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;

pub struct ImageProcessor {
    settings: ImageSettings,
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self {
            settings: ImageSettings::default(),
        }
    }

    pub fn with_settings(settings: ImageSettings) -> Self {
        Self { settings }
    }

    /// Re-encode an image in `format` with the size-oriented encoder settings:
    /// JPEG at the configured quality, PNG at the best deflate level.
    pub fn compress(&self, content: &[u8], format: ImageFormat) -> Result<Vec<u8>, ConversionError> {
        let img = image::load_from_memory(content)?;

        let compressed = match format {
            ImageFormat::Jpeg => self.encode_jpeg(&img, self.settings.quality)?,
            ImageFormat::Png => self.encode_png_best(&img)?,
            other => self.encode(&img, other)?,
        };

        log::info!(
            "Image compressed as {:?}: {} -> {} bytes",
            format,
            content.len(),
            compressed.len()
        );
        Ok(compressed)
    }

    /// Resize to exactly `width`x`height`, ignoring the aspect ratio.
    pub fn resize(
        &self,
        content: &[u8],
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Result<Vec<u8>, ConversionError> {
        let img = image::load_from_memory(content)?;
        let (from_width, from_height) = img.dimensions();

        let resized = img.resize_exact(width, height, FilterType::Lanczos3);
        log::info!("Image resized: {}x{} -> {}x{}", from_width, from_height, width, height);

        self.encode(&resized, format)
    }

    /// Decode any supported image and re-encode it in `format`.
    pub fn convert(&self, content: &[u8], format: ImageFormat) -> Result<Vec<u8>, ConversionError> {
        let img = image::load_from_memory(content)?;
        let converted = self.encode(&img, format)?;
        log::info!("Image converted to {:?}: {} bytes", format, converted.len());
        Ok(converted)
    }

    /// Encode with the format's default encoder settings.
    pub fn encode(&self, img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ConversionError> {
        let mut output = Cursor::new(Vec::new());

        if format == ImageFormat::Jpeg {
            // JPEG has no alpha channel.
            DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut output, format)?;
        } else {
            img.write_to(&mut output, format)?;
        }
        Ok(output.into_inner())
    }

    /// Encode image as JPEG with specified quality
    fn encode_jpeg(&self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ConversionError> {
        let mut output = Vec::new();
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut output, quality))?;
        Ok(output)
    }

    fn encode_png_best(&self, img: &DynamicImage) -> Result<Vec<u8>, ConversionError> {
        let mut output = Vec::new();
        img.write_with_encoder(PngEncoder::new_with_quality(
            &mut output,
            CompressionType::Best,
            PngFilter::Adaptive,
        ))?;
        Ok(output)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Format implied by the filename's extension, falling back to sniffing the bytes.
pub fn detect_format(filename: &str, content: &[u8]) -> Result<ImageFormat, ConversionError> {
    match ImageFormat::from_path(Path::new(filename)) {
        Ok(format) => Ok(format),
        Err(_) => Ok(image::guess_format(content)?),
    }
}

/// Parse a user-supplied target format name such as `PNG`, `jpg` or `WebP`.
pub fn parse_target_format(name: &str) -> Result<ImageFormat, ConversionError> {
    let normalized = name.trim().to_lowercase();
    match normalized.as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "webp" => Ok(ImageFormat::WebP),
        "gif" => Ok(ImageFormat::Gif),
        "bmp" => Ok(ImageFormat::Bmp),
        "tif" | "tiff" => Ok(ImageFormat::Tiff),
        _ => Err(ConversionError::UnsupportedFormat {
            format: name.to_string(),
        }),
    }
}
