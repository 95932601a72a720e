//! Base64 transport encoding for synthesized audio
//!
//! Audio buffers can be several megabytes. Encoding folds the buffer through a
//! single streaming encoder in fixed-size windows, so no conversion step ever
//! handles more than one window at a time, and the output is identical to a
//! one-shot standard (padded) encoding.

use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderStringWriter;

use crate::{Error, Result};

/// Default window size for chunked encoding (32 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Encode a buffer as standard base64 using the default window size
///
/// # Errors
///
/// Returns `Io` if the encoder rejects a window
pub fn encode_chunked(bytes: &[u8]) -> Result<String> {
    fold_windows(bytes, DEFAULT_CHUNK_SIZE)
}

/// Encode a buffer as standard base64, feeding the encoder `chunk_size` bytes at a time
///
/// # Errors
///
/// Returns `InvalidInput` if `chunk_size` is zero, or `Io` if the encoder
/// rejects a window
pub fn encode_chunked_with(bytes: &[u8], chunk_size: usize) -> Result<String> {
    if chunk_size == 0 {
        return Err(Error::InvalidInput(
            "chunk size must be greater than zero".to_string(),
        ));
    }
    fold_windows(bytes, chunk_size)
}

fn fold_windows(bytes: &[u8], chunk_size: usize) -> Result<String> {
    let mut writer = EncoderStringWriter::new(&STANDARD);
    for window in bytes.chunks(chunk_size) {
        writer.write_all(window)?;
    }
    Ok(writer.into_inner())
}

/// Decode standard base64, accepting either a bare payload or a browser data URL
/// (`data:audio/webm;base64,...`)
///
/// # Errors
///
/// Returns `InvalidInput` if the payload is not valid base64 or the data URL is
/// not base64-encoded
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let payload = strip_data_url(text.trim())?;
    STANDARD
        .decode(payload)
        .map_err(|e| Error::InvalidInput(format!("invalid base64 payload: {e}")))
}

/// Return the MIME type declared by a data URL, if `text` is one
#[must_use]
pub fn data_url_mime(text: &str) -> Option<&str> {
    let header = text.trim().strip_prefix("data:")?.split_once(',')?.0;
    let mime = header.split(';').next().unwrap_or_default();
    (!mime.is_empty()).then_some(mime)
}

fn strip_data_url(text: &str) -> Result<&str> {
    let Some(rest) = text.strip_prefix("data:") else {
        return Ok(text);
    };

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidInput("data URL has no payload".to_string()))?;

    if !header.split(';').any(|param| param == "base64") {
        return Err(Error::InvalidInput(
            "data URL is not base64-encoded".to_string(),
        ));
    }

    Ok(payload)
}
