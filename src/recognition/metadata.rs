//! Decoding of compressed response metadata
//!
//! The recognizer returns its session state, interpretations and transcript
//! as header values: base64 text wrapping a gzip stream wrapping JSON (or
//! plain UTF-8 for the transcript).

use std::io::Read;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Decode a base64 + gzip header value to raw bytes
///
/// # Errors
///
/// Returns error if the value is not valid base64 or not a gzip stream
pub fn decode_bytes(header: &str) -> Result<Vec<u8>> {
    let compressed = STANDARD
        .decode(header.trim())
        .map_err(|e| Error::Metadata(format!("invalid base64: {e}")))?;

    let mut decoded = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Metadata(format!("invalid gzip stream: {e}")))?;

    Ok(decoded)
}

/// Decode a header value carrying UTF-8 text
///
/// # Errors
///
/// Returns error if decoding fails or the payload is not UTF-8
pub fn decode_text(header: &str) -> Result<String> {
    String::from_utf8(decode_bytes(header)?)
        .map_err(|e| Error::Metadata(format!("invalid utf-8: {e}")))
}

/// Decode a header value carrying JSON
///
/// # Errors
///
/// Returns error if decoding fails or the JSON does not match `T`
pub fn decode_json<T: DeserializeOwned>(header: &str) -> Result<T> {
    let bytes = decode_bytes(header)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Metadata(format!("invalid json: {e}")))
}

/// Encode bytes the way the service does (used by fakes and tests)
#[must_use]
pub fn encode_bytes(payload: &[u8]) -> String {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    // Writes into a Vec cannot fail
    let _ = encoder.write_all(payload);
    let compressed = encoder.finish().unwrap_or_default();
    STANDARD.encode(compressed)
}
