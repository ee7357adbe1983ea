// Proxy module - Pingora ProxyHttp implementation
//
// Every request is answered in `request_filter`; nothing is proxied upstream.
// Image routes go through the Dispatcher, which fetches from S3 itself.

mod context;
mod special_endpoints;

pub use context::RequestContext;
pub use special_endpoints::{handle_health, handle_metrics, EndpointResponse};

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::Instant;

use crate::pipeline::Dispatcher;
use special_endpoints::{HEALTH_PATH, METRICS_PATH};

/// Serves image routes plus `/health` and `/metrics`
pub struct ImageProxy {
    dispatcher: Arc<Dispatcher>,
    route_prefixes: Vec<String>,
    start_time: Instant,
}

impl ImageProxy {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let mut route_prefixes: Vec<String> =
            dispatcher.route_prefixes().map(str::to_string).collect();
        route_prefixes.sort();

        Self {
            dispatcher,
            route_prefixes,
            start_time: Instant::now(),
        }
    }

    /// Write a complete response with `Content-Length` and `X-Request-ID`
    async fn respond(
        session: &mut Session,
        ctx: &mut RequestContext,
        status: u16,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<()> {
        let mut header = ResponseHeader::build(status, None)?;
        if let Some(content_type) = content_type {
            header.insert_header("Content-Type", content_type)?;
        }
        header.insert_header("Content-Length", body.len().to_string())?;
        header.insert_header("X-Request-ID", ctx.request_id())?;

        ctx.set_bytes_sent(body.len());

        if body.is_empty() {
            session
                .write_response_header(Box::new(header), true)
                .await?;
        } else {
            session
                .write_response_header(Box::new(header), false)
                .await?;
            session.write_response_body(Some(body), true).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProxyHttp for ImageProxy {
    type CTX = RequestContext;

    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new()
    }

    /// Never reached: `request_filter` answers every request
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        tracing::error!(request_id = %ctx.request_id(), "Upstream selection requested");
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "image server has no upstream peers",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let is_get = req.method == Method::GET;
        let method = req.method.as_str().to_string();
        let path = req.uri.path().to_string();
        let query = req.uri.query().map(str::to_string);
        ctx.set_request(&method, &path);

        if !is_get {
            Self::respond(session, ctx, 405, None, Bytes::new()).await?;
            return Ok(true);
        }

        match path.as_str() {
            HEALTH_PATH => {
                let response = handle_health(self.start_time, &self.route_prefixes);
                Self::respond(
                    session,
                    ctx,
                    response.status,
                    Some(response.content_type),
                    Bytes::from(response.body),
                )
                .await?;
            }
            METRICS_PATH => {
                let response = handle_metrics();
                Self::respond(
                    session,
                    ctx,
                    response.status,
                    Some(response.content_type),
                    Bytes::from(response.body),
                )
                .await?;
            }
            _ => {
                let response = self.dispatcher.dispatch(&path, query.as_deref()).await;
                Self::respond(
                    session,
                    ctx,
                    response.status,
                    response.content_type,
                    response.body,
                )
                .await?;
            }
        }

        Ok(true)
    }

    async fn logging(
        &self,
        session: &mut Session,
        e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);

        if let Some(error) = e {
            tracing::error!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                error = %error,
                "Request failed"
            );
        }

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status = status,
            bytes = ctx.bytes_sent(),
            duration_ms = ctx.elapsed_ms() as u64,
            "Request completed"
        );
    }
}
