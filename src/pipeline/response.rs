// Response produced by the dispatcher

use bytes::Bytes;

use crate::format::sniff_content_type;

/// Status, body and content type for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResponse {
    pub status: u16,
    pub body: Bytes,
    /// Sniffed from the body; `None` when the bytes are not a known image
    pub content_type: Option<&'static str>,
}

impl ImageResponse {
    pub fn new(status: u16, body: Bytes) -> Self {
        let content_type = sniff_content_type(&body);
        Self {
            status,
            body,
            content_type,
        }
    }

    pub fn ok(body: Bytes) -> Self {
        Self::new(200, body)
    }

    /// Fallback image (possibly empty) served with 404
    pub fn not_found(body: Bytes) -> Self {
        Self::new(404, body)
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}
