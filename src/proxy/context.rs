// Per-request context carried through the Pingora phases

use std::time::Instant;
use uuid::Uuid;

#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    started: Instant,
    method: String,
    path: String,
    bytes_sent: usize,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            started: Instant::now(),
            method: String::new(),
            path: String::new(),
            bytes_sent: 0,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    pub fn set_request(&mut self, method: &str, path: &str) {
        self.method = method.to_string();
        self.path = path.to_string();
    }

    pub fn set_bytes_sent(&mut self, bytes: usize) {
        self.bytes_sent = bytes;
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
