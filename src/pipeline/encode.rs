//! Binary payload encoding: base64 for JSON transport and `data:` URIs for
//! self-contained HTML previews.
//!
//! ODT bytes and `bindata/` assets cross two text-only boundaries: the worker
//! protocol (JSON lines over a pipe) and the HTTP response body. Both use
//! standard-alphabet base64 with padding so any client library can decode it.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

/// Encode raw bytes as standard base64.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64.
pub fn from_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(s)
}

/// MIME type for an asset file name, by extension.
///
/// `hwp5html` extracts embedded images under their original extension, so
/// the common raster and vector types cover practically every document.
pub fn mime_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("webp") => "image/webp",
        Some("wmf") => "image/wmf",
        Some("emf") => "image/emf",
        _ => "application/octet-stream",
    }
}

/// `data:<mime>;base64,<payload>` for an asset.
pub fn data_uri(name: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_for(name), to_base64(bytes))
}

/// `#[serde(with = "...")]` adapter: `Vec<u8>` as a base64 string.
pub mod serde_base64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::to_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        super::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with = "...")]` adapter: asset map with base64 values.
pub mod serde_base64_map {
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<u8>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let mut out = s.serialize_map(Some(map.len()))?;
        for (name, bytes) in map {
            out.serialize_entry(name, &super::to_base64(bytes))?;
        }
        out.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(d)?;
        raw.into_iter()
            .map(|(name, b64)| {
                super::from_base64(&b64)
                    .map(|bytes| (name, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
