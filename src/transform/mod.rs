//! Image transformation
//!
//! Decodes the source, crops or letterboxes it to the requested box, resizes
//! and re-encodes it:
//! - Both dimensions 0: source size, re-encoded only
//! - One dimension 0: the other follows the source aspect ratio
//! - Crop: centered crop to the target aspect, then exact scale
//! - No crop: fit inside and extend on a white canvas
//!
//! Failures are never fatal to a request, see [`transform_or_passthrough`].

pub mod encoder;
pub mod error;
pub mod processor;

use bytes::Bytes;

pub use encoder::{EncoderFactory, ImageEncoder};
pub use error::ImageError;
pub use processor::process_image;

use crate::descriptor::TransformParams;
use crate::metrics::PipelineMetrics;

/// Turns source image bytes into the requested variant
pub trait Transformer: Send + Sync {
    fn apply(&self, source: &[u8], params: &TransformParams) -> Result<Bytes, ImageError>;
}

/// Production transformer backed by `image` and `fast_image_resize`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTransformer;

impl Transformer for ImageTransformer {
    fn apply(&self, source: &[u8], params: &TransformParams) -> Result<Bytes, ImageError> {
        process_image(source, params).map(Bytes::from)
    }
}

/// Apply `transformer`, returning the input unchanged if it fails
pub fn transform_or_passthrough(
    transformer: &dyn Transformer,
    source: Bytes,
    params: &TransformParams,
) -> Bytes {
    match transformer.apply(&source, params) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(
                error = %e,
                width = params.width,
                height = params.height,
                format = %params.format,
                "Transform failed, serving source bytes"
            );
            PipelineMetrics::global().record_transform_failure();
            source
        }
    }
}
