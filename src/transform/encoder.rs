//! Output encoders
//!
//! One encoder per [`OutputFormat`], all taking straight RGBA8 pixels.

use std::io::Cursor;

use super::error::ImageError;
use crate::format::OutputFormat;

/// Encodes raw RGBA pixel data into one output format
pub trait ImageEncoder: Send + Sync {
    /// Encode `data` (4 bytes per pixel, row-major) at the given quality (1-100)
    fn encode(&self, data: &[u8], width: u32, height: u32, quality: u8)
        -> Result<Vec<u8>, ImageError>;
}

/// JPEG encoder using the image crate. Alpha is flattened onto white.
pub struct JpegEncoder;

impl ImageEncoder for JpegEncoder {
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, ImageError> {
        use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
        use image::ImageEncoder as _;

        let rgb_data = flatten_on_white(data);

        let mut output = Cursor::new(Vec::new());
        ImageJpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100))
            .write_image(&rgb_data, width, height, image::ColorType::Rgb8)
            .map_err(|e| ImageError::encode_failed("jpeg", e.to_string()))?;

        Ok(output.into_inner())
    }
}

/// PNG encoder using the image crate. Quality is ignored.
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        _quality: u8,
    ) -> Result<Vec<u8>, ImageError> {
        use image::codecs::png::PngEncoder as ImagePngEncoder;
        use image::ImageEncoder as _;

        let mut output = Cursor::new(Vec::new());
        ImagePngEncoder::new(&mut output)
            .write_image(data, width, height, image::ColorType::Rgba8)
            .map_err(|e| ImageError::encode_failed("png", e.to_string()))?;

        Ok(output.into_inner())
    }
}

/// Lossy WebP encoder using libwebp
pub struct WebPEncoder;

impl ImageEncoder for WebPEncoder {
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, ImageError> {
        let memory = webp::Encoder::from_rgba(data, width, height)
            .encode_simple(false, quality.clamp(1, 100) as f32)
            .map_err(|e| ImageError::encode_failed("webp", format!("{:?}", e)))?;

        Ok(memory.to_vec())
    }
}

/// Factory for creating encoders based on output format
pub struct EncoderFactory;

impl EncoderFactory {
    pub fn create(format: OutputFormat) -> Box<dyn ImageEncoder> {
        match format {
            OutputFormat::Jpeg => Box::new(JpegEncoder),
            OutputFormat::Png => Box::new(PngEncoder),
            OutputFormat::WebP => Box::new(WebPEncoder),
        }
    }
}

/// Composite RGBA over a white background, dropping alpha
fn flatten_on_white(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);

    for chunk in rgba.chunks_exact(4) {
        let alpha = chunk[3] as u16;
        for &channel in &chunk[..3] {
            let blended = (channel as u16 * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(blended as u8);
        }
    }

    rgb
}
