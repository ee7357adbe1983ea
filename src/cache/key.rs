//! Cache key derivation
//!
//! Cached variants are addressed by a file name built from the route prefix,
//! the transform and the source base name:
//!
//! ```text
//! {prefix}_w{width}_h{height}_c{crop}_{basename}{ext}
//! ```
//!
//! The shape is shared by every deployment writing into the same cache
//! directory and must not change.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::descriptor::{TransformParams, TransformSpec};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub route_prefix: String,
    pub width: u32,
    pub height: u32,
    pub crop: bool,
    /// Source file name without its last extension
    pub basename: String,
    /// Extension of the output format, with leading dot
    pub extension: &'static str,
}

impl CacheKey {
    pub fn new(route_prefix: &str, params: &TransformParams, file_name: &str) -> Self {
        Self {
            route_prefix: route_prefix.to_string(),
            width: params.width,
            height: params.height,
            crop: params.crop,
            basename: strip_extension(file_name).to_string(),
            extension: params.format.extension(),
        }
    }

    pub fn for_spec(spec: &TransformSpec) -> Self {
        Self::new(&spec.route_prefix, &spec.params, &spec.file_name)
    }

    /// Location of the entry under a cache root
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(self.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_w{}_h{}_c{}_{}{}",
            self.route_prefix, self.width, self.height, self.crop, self.basename, self.extension
        )
    }
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) => &file_name[..idx],
        None => file_name,
    }
}
