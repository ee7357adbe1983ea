//! Image processing implementation
//!
//! Handles the actual image transformation: decode → crop/fit → resize → extend → encode

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::num::NonZeroU32;

use super::encoder::EncoderFactory;
use super::error::ImageError;
use crate::constants::{EXTEND_BACKGROUND, MAX_DIMENSION, MAX_SOURCE_PIXELS, OUTPUT_QUALITY};
use crate::descriptor::TransformParams;

/// Where each stage of the transform lands, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    /// Region of the source that is kept: (x, y, width, height)
    pub source: (u32, u32, u32, u32),
    /// Size the kept region is scaled to
    pub scaled: (u32, u32),
    /// Final output size; larger than `scaled` only when letterboxing
    pub canvas: (u32, u32),
}

impl Geometry {
    /// Offset of the scaled image on the canvas (centered)
    pub fn offset(&self) -> (u32, u32) {
        (
            (self.canvas.0 - self.scaled.0) / 2,
            (self.canvas.1 - self.scaled.1) / 2,
        )
    }
}

fn scale(value: u32, numerator: u32, denominator: u32) -> u32 {
    ((value as f64 * numerator as f64 / denominator as f64).round() as u32).max(1)
}

/// Compute the transform geometry for a source of `src_w`×`src_h`
pub(crate) fn compute_geometry(src_w: u32, src_h: u32, params: &TransformParams) -> Geometry {
    let full = (0, 0, src_w, src_h);
    let (w, h) = (params.width, params.height);

    match (w, h) {
        (0, 0) => Geometry {
            source: full,
            scaled: (src_w, src_h),
            canvas: (src_w, src_h),
        },
        (0, h) => {
            let derived = scale(src_w, h, src_h).min(MAX_DIMENSION);
            Geometry {
                source: full,
                scaled: (derived, h),
                canvas: (derived, h),
            }
        }
        (w, 0) => {
            let derived = scale(src_h, w, src_w).min(MAX_DIMENSION);
            Geometry {
                source: full,
                scaled: (w, derived),
                canvas: (w, derived),
            }
        }
        (w, h) if params.crop => {
            // Largest centered region of the source with the target aspect
            let wide = src_w as u64 * h as u64 > w as u64 * src_h as u64;
            let (crop_w, crop_h) = if wide {
                (scale(src_h, w, h).min(src_w), src_h)
            } else {
                (src_w, scale(src_w, h, w).min(src_h))
            };
            Geometry {
                source: ((src_w - crop_w) / 2, (src_h - crop_h) / 2, crop_w, crop_h),
                scaled: (w, h),
                canvas: (w, h),
            }
        }
        (w, h) => {
            // Fit inside, then letterbox
            let fit_by_width = src_w as u64 * h as u64 >= w as u64 * src_h as u64;
            let scaled = if fit_by_width {
                (w, scale(src_h, w, src_w).min(h))
            } else {
                (scale(src_w, h, src_h).min(w), h)
            };
            Geometry {
                source: full,
                scaled,
                canvas: (w, h),
            }
        }
    }
}

/// Decode, transform and encode `data` according to `params`
pub fn process_image(data: &[u8], params: &TransformParams) -> Result<Vec<u8>, ImageError> {
    // 1. Reject oversized sources before allocating pixel buffers
    let (src_w, src_h) = read_dimensions(data)?;
    let pixels = src_w as u64 * src_h as u64;
    if pixels > MAX_SOURCE_PIXELS {
        return Err(ImageError::image_bomb(src_w, src_h, MAX_SOURCE_PIXELS));
    }

    // 2. Decode
    let img = decode_image(data)?;
    let geometry = compute_geometry(img.width(), img.height(), params);

    // 3. Crop
    let (x, y, crop_w, crop_h) = geometry.source;
    let img = if (crop_w, crop_h) != (img.width(), img.height()) {
        img.crop_imm(x, y, crop_w, crop_h)
    } else {
        img
    };

    // 4. Resize
    let scaled = if geometry.scaled != (img.width(), img.height()) {
        resize_image(&img, geometry.scaled.0, geometry.scaled.1)?
    } else {
        img.to_rgba8()
    };

    // 5. Extend
    let output = if geometry.canvas != geometry.scaled {
        let mut canvas =
            RgbaImage::from_pixel(geometry.canvas.0, geometry.canvas.1, Rgba(EXTEND_BACKGROUND));
        let (dx, dy) = geometry.offset();
        image::imageops::overlay(&mut canvas, &scaled, dx as i64, dy as i64);
        canvas
    } else {
        scaled
    };

    // 6. Encode
    let (width, height) = output.dimensions();
    EncoderFactory::create(params.format).encode(output.as_raw(), width, height, OUTPUT_QUALITY)
}

fn read_dimensions(data: &[u8]) -> Result<(u32, u32), ImageError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

fn decode_image(data: &[u8]) -> Result<DynamicImage, ImageError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?
        .decode()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

/// Resize with fast-image-resize using a Catmull-Rom (bicubic) filter
fn resize_image(img: &DynamicImage, target_w: u32, target_h: u32) -> Result<RgbaImage, ImageError> {
    let src_width = NonZeroU32::new(img.width())
        .ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::CatmullRom));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| ImageError::resize_failed("Failed to create output image buffer"))
}
