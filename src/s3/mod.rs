// S3 client module

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::S3Config;
use crate::constants::S3_PUBLIC_READ_ACL;
use crate::error::PipelineError;

type HmacSha256 = Hmac<Sha256>;

/// Access/secret key pair used to sign origin requests
#[derive(Clone, Default)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// One object to retrieve, with everything needed to address and sign it
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub bucket: String,
    pub key: String,
    pub region: String,
    /// Custom S3-compatible endpoint, addressed path-style
    pub endpoint: Option<String>,
    pub credentials: Credentials,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(config: &S3Config, key: impl Into<String>) -> Self {
        Self {
            bucket: config.bucket.clone(),
            key: key.into(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone().filter(|e| !e.is_empty()),
            credentials: Credentials {
                access_key: config.access_key.clone(),
                secret_key: config.secret_key.clone(),
            },
            timeout: Duration::from_secs(config.timeout),
        }
    }

    /// Full object URL: virtual-hosted AWS style, or path style for custom endpoints
    pub fn url(&self) -> String {
        let key = encode_key(&self.key);
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}

/// Source of original image bytes
#[async_trait]
pub trait Origin: Send + Sync {
    /// Fetch the full object. Anything but a complete 200 response is an error.
    async fn fetch(&self, request: &FetchRequest) -> Result<Bytes, PipelineError>;
}

/// Origin backed by S3 (or an S3-compatible store) over HTTP
#[derive(Debug, Clone)]
pub struct S3Origin {
    client: reqwest::Client,
}

impl S3Origin {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Origin for S3Origin {
    async fn fetch(&self, request: &FetchRequest) -> Result<Bytes, PipelineError> {
        let url = request.url();
        let parsed = reqwest::Url::parse(&url)
            .map_err(|e| PipelineError::fetch_transport(format!("invalid origin URL {}: {}", url, e)))?;

        let headers = signed_get_headers(&parsed, request, Utc::now());

        let mut builder = self.client.get(parsed).timeout(request.timeout);
        for (name, value) in &headers {
            // reqwest derives Host from the URL; the signed value is identical
            if name != "host" {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        let response = builder.send().await.map_err(|e| {
            PipelineError::fetch_transport(format!("request to {} failed: {}", url, e))
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            tracing::debug!(url = %url, status = status, "Origin returned non-200 status");
            return Err(PipelineError::fetch_status(status));
        }

        response.bytes().await.map_err(|e| {
            PipelineError::fetch_transport(format!("reading body from {} failed: {}", url, e))
        })
    }
}

/// Headers for a signed GET, including `authorization`
fn signed_get_headers(
    url: &reqwest::Url,
    request: &FetchRequest,
    now: DateTime<Utc>,
) -> HashMap<String, String> {
    let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    };

    let mut headers = HashMap::new();
    headers.insert("host".to_string(), host);
    headers.insert("x-amz-date".to_string(), datetime.clone());
    headers.insert("x-amz-content-sha256".to_string(), sha256_hex(b""));
    headers.insert(
        "date".to_string(),
        now.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
    );
    headers.insert("x-amz-acl".to_string(), S3_PUBLIC_READ_ACL.to_string());

    let params = SigningParams {
        method: "GET",
        uri: url.path(),
        query_string: "",
        headers: &headers,
        payload: b"",
        access_key: &request.credentials.access_key,
        secret_key: &request.credentials.secret_key,
        region: &request.region,
        service: "s3",
        date: &date,
        datetime: &datetime,
    };

    let authorization = sign_request(&params);
    headers.insert("authorization".to_string(), authorization);
    headers
}

/// Percent-encode each key segment, keeping `/` separators
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// AWS Signature v4 implementation
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub struct SigningParams<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub query_string: &'a str,
    pub headers: &'a HashMap<String, String>,
    pub payload: &'a [u8],
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub date: &'a str,     // Format: YYYYMMDD
    pub datetime: &'a str, // Format: YYYYMMDDTHHMMSSZ
}

fn sorted_header_names(headers: &HashMap<String, String>) -> Vec<(String, &str)> {
    let mut sorted: Vec<(String, &str)> = headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.as_str()))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
}

fn create_canonical_request(params: &SigningParams) -> String {
    let payload_hash = sha256_hex(params.payload);
    let sorted_headers = sorted_header_names(params.headers);

    let canonical_headers = sorted_headers
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    let signed_headers = sorted_headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    format!(
        "{}\n{}\n{}\n{}\n\n{}\n{}",
        params.method,
        params.uri,
        params.query_string,
        canonical_headers,
        signed_headers,
        payload_hash
    )
}

fn create_string_to_sign(params: &SigningParams) -> String {
    let canonical_request = create_canonical_request(params);
    let canonical_request_hash = sha256_hex(canonical_request.as_bytes());

    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        params.date, params.region, params.service
    );

    format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        params.datetime, credential_scope, canonical_request_hash
    )
}

fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Build the `Authorization` header value for a request
pub fn sign_request(params: &SigningParams) -> String {
    let string_to_sign = create_string_to_sign(params);

    let signed_headers = sorted_header_names(params.headers)
        .into_iter()
        .map(|(k, _)| k)
        .collect::<Vec<_>>()
        .join(";");

    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        params.date, params.region, params.service
    );

    let k_signing = derive_signing_key(
        params.secret_key,
        params.date,
        params.region,
        params.service,
    );
    let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()));

    format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        params.access_key, credential_scope, signed_headers, signature
    )
}
