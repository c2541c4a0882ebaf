//! Image payload: an opaque asset reference, decoded lazily by the asset
//! cache and never inline in the drawing path.

use serde::{Deserialize, Serialize};

/// Image format detected from the asset bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        None
    }
}

/// An image operation's payload. `source` is a data URL
/// (`data:image/png;base64,...`) or bare base64 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOp {
    pub source: String,
}

impl ImageOp {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Raw asset bytes, stripping a data-URL prefix when present.
    pub fn data(&self) -> Option<Vec<u8>> {
        use base64::{engine::general_purpose::STANDARD, Engine};
        let encoded = match self.source.split_once(";base64,") {
            Some((_, rest)) => rest,
            None => self.source.as_str(),
        };
        STANDARD.decode(encoded).ok()
    }
}
