// Per-handler request pipeline
//
// describe → authorize → cache lookup → (hit) serve
//                                     → (miss/stale) single-flight { fetch → transform } → write-back → serve
// Validation, authorization and fetch failures all end in the fallback image with 404.

use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::response::ImageResponse;
use super::Authorizer;
use crate::cache::{CacheLookup, DiskCache};
use crate::coalescing::{CoalescingSlot, RequestCoalescer};
use crate::config::HandlerConfig;
use crate::constants::TOKEN_QUERY_PARAM;
use crate::descriptor::{TransformParams, TransformSpec};
use crate::error::PipelineError;
use crate::fallback::FallbackProvider;
use crate::format::OutputFormat;
use crate::metrics::PipelineMetrics;
use crate::s3::{FetchRequest, Origin};
use crate::transform::{transform_or_passthrough, Transformer};

/// How a successful body was obtained
enum Produced {
    Cached(Bytes),
    Fetched(Bytes),
}

/// Request pipeline for a single handler (one route prefix, one bucket)
pub struct ImagePipeline {
    handler: HandlerConfig,
    default_format: OutputFormat,
    origin: Arc<dyn Origin>,
    transformer: Arc<dyn Transformer>,
    fallback: FallbackProvider,
    cache: DiskCache,
    coalescer: RequestCoalescer,
    authorizer: Option<Authorizer>,
}

impl ImagePipeline {
    pub fn new(
        handler: HandlerConfig,
        origin: Arc<dyn Origin>,
        transformer: Arc<dyn Transformer>,
        cache: DiskCache,
        coalescer: RequestCoalescer,
        authorizer: Option<Authorizer>,
    ) -> Self {
        Self {
            default_format: handler.default_format(),
            fallback: FallbackProvider::new(transformer.clone()),
            handler,
            origin,
            transformer,
            cache,
            coalescer,
            authorizer,
        }
    }

    /// Run one request for `file_name` and return the response with its outcome label
    pub async fn handle(
        &self,
        file_name: &str,
        query: &HashMap<String, String>,
    ) -> (ImageResponse, &'static str) {
        let params = TransformParams::from_query(query, self.default_format);

        let spec = match TransformSpec::build(&self.handler, params, file_name) {
            Ok(spec) => spec,
            Err(e) => {
                let response = self
                    .degrade(
                        e,
                        self.handler.error_image.as_deref(),
                        self.handler.error_resize_crop,
                        &params,
                    )
                    .await;
                return (response, "fallback");
            }
        };

        if let Some(authorizer) = &self.authorizer {
            let token = query
                .get(TOKEN_QUERY_PARAM)
                .map(String::as_str)
                .unwrap_or("");
            if !authorizer(token) {
                return (
                    self.degrade_spec(PipelineError::Unauthorized, &spec).await,
                    "fallback",
                );
            }
        }

        match self.produce(&spec).await {
            Ok(Produced::Cached(body)) => (ImageResponse::ok(body), "hit"),
            Ok(Produced::Fetched(body)) => (ImageResponse::ok(body), "fetched"),
            Err(e) => (self.degrade_spec(e, &spec).await, "fallback"),
        }
    }

    async fn produce(&self, spec: &TransformSpec) -> Result<Produced, PipelineError> {
        let metrics = PipelineMetrics::global();

        if !spec.cache_ttl.is_enabled() {
            metrics.record_cache_lookup("disabled");
        } else {
            match self.cache.lookup(spec).await {
                CacheLookup::Hit(body) => {
                    metrics.record_cache_lookup("hit");
                    return Ok(Produced::Cached(body));
                }
                CacheLookup::Miss => metrics.record_cache_lookup("miss"),
                CacheLookup::Stale => metrics.record_cache_lookup("stale"),
            }
        }

        self.fetch_coalesced(spec).await.map(Produced::Fetched)
    }

    /// Fetch and transform, sharing the work with concurrent identical requests
    async fn fetch_coalesced(&self, spec: &TransformSpec) -> Result<Bytes, PipelineError> {
        let key = DiskCache::entry_path(spec).to_string_lossy().into_owned();

        match self.coalescer.acquire(&key).await {
            CoalescingSlot::Follower(outcome) => {
                tracing::debug!(key = %key, "Served by in-flight request");
                outcome.map_err(PipelineError::fetch_transport)
            }
            CoalescingSlot::Leader(guard) => {
                let result = self.fetch_and_transform(spec).await;

                if let Ok(body) = &result {
                    if spec.cache_ttl.is_enabled() {
                        // Completion is tracked by the queue, not the request
                        drop(self.cache.write_back(spec, body.clone()));
                    }
                }

                guard.publish(result.clone().map_err(|e| e.to_string()));
                result
            }
        }
    }

    async fn fetch_and_transform(&self, spec: &TransformSpec) -> Result<Bytes, PipelineError> {
        let request = FetchRequest {
            bucket: spec.bucket.clone(),
            ..FetchRequest::new(&self.handler.s3, spec.object_key.clone())
        };

        let source = self.origin.fetch(&request).await.map_err(|e| {
            tracing::warn!(
                bucket = %request.bucket,
                key = %request.key,
                error = %e,
                "Origin fetch failed"
            );
            PipelineMetrics::global().record_fetch_failure();
            e
        })?;

        tracing::debug!(key = %request.key, bytes = source.len(), "Fetched source image");

        let transformer = self.transformer.clone();
        let params = spec.params;
        let input = source.clone();
        match tokio::task::spawn_blocking(move || {
            transform_or_passthrough(transformer.as_ref(), input, &params)
        })
        .await
        {
            Ok(output) => Ok(output),
            Err(e) => {
                tracing::error!(error = %e, "Transform task failed, serving source bytes");
                PipelineMetrics::global().record_transform_failure();
                Ok(source)
            }
        }
    }

    async fn degrade_spec(&self, error: PipelineError, spec: &TransformSpec) -> ImageResponse {
        self.degrade(
            error,
            spec.fallback_image.as_deref(),
            spec.fallback_resize,
            &spec.params,
        )
        .await
    }

    /// Serve the fallback image (or nothing) with 404
    async fn degrade(
        &self,
        error: PipelineError,
        fallback_image: Option<&Path>,
        resize: bool,
        params: &TransformParams,
    ) -> ImageResponse {
        tracing::info!(
            handler = %self.handler.name,
            reason = error.kind(),
            error = %error,
            "Serving fallback image"
        );
        PipelineMetrics::global().record_fallback(error.kind());

        match self.fallback.provide(fallback_image, resize, params).await {
            Ok(body) => ImageResponse::not_found(body),
            Err(e) => {
                tracing::warn!(handler = %self.handler.name, error = %e, "No fallback image available");
                ImageResponse::empty(404)
            }
        }
    }
}
