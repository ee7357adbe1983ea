// Fallback image provider

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

use crate::descriptor::TransformParams;
use crate::error::PipelineError;
use crate::transform::{transform_or_passthrough, Transformer};

/// Loads the handler's error image, resized to the request when configured
#[derive(Clone)]
pub struct FallbackProvider {
    transformer: Arc<dyn Transformer>,
}

impl FallbackProvider {
    pub fn new(transformer: Arc<dyn Transformer>) -> Self {
        Self { transformer }
    }

    /// Produce the fallback body
    ///
    /// Fails when no image is configured or it cannot be read. A transform
    /// failure is not an error: the file is served as stored.
    pub async fn provide(
        &self,
        path: Option<&Path>,
        resize: bool,
        params: &TransformParams,
    ) -> Result<Bytes, PipelineError> {
        let path = path.ok_or_else(|| PipelineError::fallback("no fallback image configured"))?;

        let data = tokio::fs::read(path).await.map_err(|e| {
            PipelineError::fallback(format!(
                "failed to read fallback image {}: {}",
                path.display(),
                e
            ))
        })?;
        let data = Bytes::from(data);

        if !resize {
            return Ok(data);
        }

        let transformer = self.transformer.clone();
        let params = *params;
        let fallback = data.clone();
        match tokio::task::spawn_blocking(move || {
            transform_or_passthrough(transformer.as_ref(), data, &params)
        })
        .await
        {
            Ok(output) => Ok(output),
            Err(e) => {
                tracing::error!(error = %e, "Fallback transform task failed");
                Ok(fallback)
            }
        }
    }
}
