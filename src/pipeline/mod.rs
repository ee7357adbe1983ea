//! Request dispatch
//!
//! The [`Dispatcher`] maps `/{prefix}/{file}` onto the [`ImagePipeline`] of the
//! handler mounted at `prefix` and turns every outcome into an
//! [`ImageResponse`]. It knows nothing about the HTTP server and is driven
//! directly in tests.

mod image_pipeline;
mod response;

pub use image_pipeline::ImagePipeline;
pub use response::ImageResponse;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{DiskBackend, DiskCache, TokioFsBackend, WorkQueue};
use crate::coalescing::RequestCoalescer;
use crate::config::Config;
use crate::descriptor::parse_query;
use crate::metrics::PipelineMetrics;
use crate::s3::Origin;
use crate::transform::Transformer;

/// Predicate over the `t` query parameter (empty string when absent)
pub type Authorizer = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Routes requests to per-handler pipelines
pub struct Dispatcher {
    pipelines: HashMap<String, ImagePipeline>,
    queue: WorkQueue,
}

impl Dispatcher {
    /// Build one pipeline per configured handler
    ///
    /// The background cache worker starts with the first request that needs it.
    pub fn new(
        config: &Config,
        origin: Arc<dyn Origin>,
        transformer: Arc<dyn Transformer>,
        authorizer: Option<Authorizer>,
    ) -> Self {
        let backend: Arc<dyn DiskBackend> = Arc::new(TokioFsBackend::new());
        let queue = WorkQueue::new(backend.clone());
        Self::with_backend(config, origin, transformer, authorizer, backend, queue)
    }

    /// Build with an explicit cache backend and work queue
    pub fn with_backend(
        config: &Config,
        origin: Arc<dyn Origin>,
        transformer: Arc<dyn Transformer>,
        authorizer: Option<Authorizer>,
        backend: Arc<dyn DiskBackend>,
        queue: WorkQueue,
    ) -> Self {
        let cache = DiskCache::new(backend, queue.clone());
        let coalescer = RequestCoalescer::new();

        let pipelines = config
            .handlers
            .iter()
            .map(|handler| {
                let pipeline = ImagePipeline::new(
                    handler.clone(),
                    origin.clone(),
                    transformer.clone(),
                    cache.clone(),
                    coalescer.clone(),
                    authorizer.clone(),
                );
                (handler.route_prefix().to_string(), pipeline)
            })
            .collect();

        Self { pipelines, queue }
    }

    /// Route prefixes served, in no particular order
    pub fn route_prefixes(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    /// Handle a GET for `path` with the raw query string
    pub async fn dispatch(&self, path: &str, query: Option<&str>) -> ImageResponse {
        let start = Instant::now();

        let Some((pipeline, file_name)) = self.route(path) else {
            tracing::debug!(path = %path, "No handler for path");
            PipelineMetrics::global().record_request("not_found", start.elapsed().as_secs_f64());
            return ImageResponse::empty(404);
        };

        let query = parse_query(query);
        let (response, outcome) = pipeline.handle(&file_name, &query).await;

        PipelineMetrics::global().record_request(outcome, start.elapsed().as_secs_f64());
        response
    }

    /// Wait until queued cache writes and removals have finished
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Match `/{prefix}/{file}` with exactly one non-empty file segment
    fn route(&self, path: &str) -> Option<(&ImagePipeline, String)> {
        let (prefix, file) = path.strip_prefix('/')?.split_once('/')?;
        if file.is_empty() || file.contains('/') {
            return None;
        }

        let pipeline = self.pipelines.get(prefix)?;
        let file_name = urlencoding::decode(file)
            .map(|f| f.into_owned())
            .unwrap_or_else(|_| file.to_string());
        Some((pipeline, file_name))
    }
}
