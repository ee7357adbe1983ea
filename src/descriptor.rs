//! Request descriptor builder
//!
//! Turns the query string and file segment of an inbound request into a
//! validated [`TransformSpec`]. Parsing of the transform itself never fails:
//! bad numbers become 0, unknown formats keep the handler default. Only the
//! file name and bucket are validated.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::cache::CacheTtl;
use crate::config::HandlerConfig;
use crate::constants::MAX_DIMENSION;
use crate::error::PipelineError;
use crate::format::OutputFormat;

/// Query parameter names
const PARAM_WIDTH: &str = "w";
const PARAM_HEIGHT: &str = "h";
const PARAM_CROP: &str = "c";
const PARAM_FORMAT: &str = "f";

/// Requested output geometry and encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformParams {
    /// Target width, 0 = derive from height/source
    pub width: u32,
    /// Target height, 0 = derive from width/source
    pub height: u32,
    pub crop: bool,
    pub format: OutputFormat,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            crop: true,
            format: OutputFormat::default(),
        }
    }
}

impl TransformParams {
    pub fn from_query(query: &HashMap<String, String>, default_format: OutputFormat) -> Self {
        let get = |name: &str| query.get(name).map(String::as_str);

        let crop = match get(PARAM_CROP) {
            None | Some("") => true,
            Some(value) => parse_bool(value),
        };

        let format = get(PARAM_FORMAT)
            .filter(|f| !f.is_empty())
            .and_then(|f| OutputFormat::from_extension(&format!(".{}", f)))
            .unwrap_or(default_format);

        Self {
            width: parse_dimension(get(PARAM_WIDTH)),
            height: parse_dimension(get(PARAM_HEIGHT)),
            crop,
            format,
        }
    }
}

/// Everything the pipeline needs to produce one artifact
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSpec {
    pub route_prefix: String,
    pub bucket: String,
    /// Object key in the bucket: configured path prefix + file name
    pub object_key: String,
    pub file_name: String,
    pub params: TransformParams,
    pub cache_ttl: CacheTtl,
    pub cache_root: PathBuf,
    pub fallback_image: Option<PathBuf>,
    pub fallback_resize: bool,
}

impl TransformSpec {
    /// Validate the file name against the handler and assemble the spec
    pub fn build(
        handler: &HandlerConfig,
        params: TransformParams,
        file_name: &str,
    ) -> Result<Self, PipelineError> {
        let accepted = accept_file_name(file_name, &handler.allowed_extensions());

        // A missing bucket is reported even when the file name is also bad
        let file_name = match accepted {
            _ if handler.s3.bucket.is_empty() => {
                return Err(PipelineError::validation("Bucket cannot be an empty string"))
            }
            None => {
                return Err(PipelineError::validation(
                    "File name cannot be an empty string",
                ))
            }
            Some(name) => name.to_string(),
        };

        Ok(Self {
            route_prefix: handler.route_prefix().to_string(),
            bucket: handler.s3.bucket.clone(),
            object_key: format!("{}{}", handler.s3.path, file_name),
            file_name,
            params,
            cache_ttl: handler.cache_ttl(),
            cache_root: handler.cache_path.clone(),
            fallback_image: handler.error_image.clone(),
            fallback_resize: handler.error_resize_crop,
        })
    }
}

/// Parse a query string into a map. The first occurrence of a key wins.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let Some(query) = query else {
        return params;
    };

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        if !params.contains_key(&key) {
            params.insert(key, decode_component(value));
        }
    }
    params
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .unwrap_or(raw)
}

/// Numeric parse with truncation; anything unusable is 0, large values clamp
fn parse_dimension(value: Option<&str>) -> u32 {
    let parsed = value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(0.0);

    if parsed >= MAX_DIMENSION as f64 {
        MAX_DIMENSION
    } else {
        parsed as u32
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "t" | "true" | "y" | "yes" | "on"
    )
}

/// Returns the file name when it is a single path segment whose extension
/// is in the allow-list
fn accept_file_name<'a>(file_name: &'a str, allowed: &[String]) -> Option<&'a str> {
    if file_name.is_empty() || file_name.contains('/') || file_name.contains('\\') {
        return None;
    }

    let ext = file_name.rfind('.').map(|idx| &file_name[idx..])?;
    allowed.iter().any(|a| a == ext).then_some(file_name)
}
