//! `data:` URI parsing and image MIME sniffing.

use base64::Engine;

use crate::error::{QueryError, Result};

/// Decoded contents of a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    /// MIME type from the header, if one was given.
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

pub fn is_data_uri(s: &str) -> bool {
    s.get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
}

/// Parse `data:[<mime>][;param]*[;base64],<payload>`.
pub fn parse(uri: &str) -> Result<DataUri> {
    if !is_data_uri(uri) {
        return Err(QueryError::InvalidArgument("not a data URI".into()));
    }
    let (header, payload) = uri[5..]
        .split_once(',')
        .ok_or_else(|| QueryError::InvalidArgument("data URI has no payload separator".into()))?;

    let mut segments = header.split(';');
    let mime_type = segments
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_ascii_lowercase);
    let is_base64 = segments.any(|s| s.trim().eq_ignore_ascii_case("base64"));

    let data = if is_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| QueryError::InvalidArgument(format!("invalid base64 in data URI: {e}")))?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok(DataUri { mime_type, data })
}

/// Guess an image MIME type from its leading bytes.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'B', b'M', ..] => Some("image/bmp"),
        _ => None,
    }
}

/// Encode bytes as a base64 `data:` URI.
pub fn encode(mime_type: &str, data: &[u8]) -> String {
    format!(
        "data:{mime_type};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}
