//! Transform error types
//!
//! Transform failures never reach the client. The pipeline logs them and
//! serves the source bytes instead.

use std::fmt;

/// Errors that can occur while transforming an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Failed to detect the format of or decode the source
    DecodeFailed { message: String },
    /// Resize or crop failed
    ResizeFailed { message: String },
    /// Encoding to the output format failed
    EncodeFailed { format: String, message: String },
    /// Source dimensions exceed the decode limit
    ImageBombDetected {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            ImageError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            ImageError::ImageBombDetected {
                width,
                height,
                pixels,
                max_pixels,
            } => {
                write!(
                    f,
                    "Image dimensions {}x{} ({} pixels) exceed limit of {} pixels",
                    width, height, pixels, max_pixels
                )
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn image_bomb(width: u32, height: u32, max_pixels: u64) -> Self {
        ImageError::ImageBombDetected {
            width,
            height,
            pixels: width as u64 * height as u64,
            max_pixels,
        }
    }
}
