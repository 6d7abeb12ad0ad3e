//! Transport encoding for published fee values.
//!
//! Values are escaped to UTF-8 percent sequences, collapsed back to raw bytes
//! and base64 encoded; the content store receives the base64 text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded bytes are not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub fn to_transport(value: &str) -> String {
    let escaped = utf8_percent_encode(value, NON_ALPHANUMERIC).to_string();
    let bytes: Vec<u8> = percent_decode_str(&escaped).collect();
    STANDARD.encode(bytes)
}

pub fn from_transport(encoded: &str) -> Result<String, DecodeError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(String::from_utf8(bytes)?)
}
