//! Output image formats and their file extensions
//!
//! The format ↔ extension mapping is a fixed table. Extensions carry their
//! leading dot because they are appended verbatim to cache file names.

use std::fmt;
use std::str::FromStr;

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    WebP,
    Jpeg,
    Png,
}

/// Every supported output format paired with its cache file extension
const FORMAT_EXTENSIONS: [(OutputFormat, &str); 3] = [
    (OutputFormat::WebP, ".webp"),
    (OutputFormat::Jpeg, ".jpg"),
    (OutputFormat::Png, ".png"),
];

impl OutputFormat {
    /// All supported formats, in table order
    pub fn all() -> impl Iterator<Item = OutputFormat> {
        FORMAT_EXTENSIONS.iter().map(|(format, _)| *format)
    }

    /// File extension including the leading dot (e.g. `.webp`)
    pub fn extension(&self) -> &'static str {
        FORMAT_EXTENSIONS
            .iter()
            .find(|(format, _)| format == self)
            .map(|(_, ext)| *ext)
            .unwrap_or(".webp")
    }

    /// Reverse lookup from a dotted extension. Exact match only.
    pub fn from_extension(ext: &str) -> Option<OutputFormat> {
        FORMAT_EXTENSIONS
            .iter()
            .find(|(_, known)| *known == ext)
            .map(|(format, _)| *format)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for format names that are not in the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat(pub String);

impl fmt::Display for UnknownFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown output format: {}", self.0)
    }
}

impl std::error::Error for UnknownFormat {}

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    /// Parses configuration names (`webp`, `jpeg`/`jpg`, `png`, dot optional)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match name.as_str() {
            "webp" => Ok(OutputFormat::WebP),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Best-effort content type for a response body, from its magic bytes
pub fn sniff_content_type(data: &[u8]) -> Option<&'static str> {
    match image::guess_format(data).ok()? {
        image::ImageFormat::WebP => Some("image/webp"),
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}
