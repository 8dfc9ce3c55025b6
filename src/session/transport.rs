//! Frame-level transport helpers: raw-DEFLATE decompression for
//! OKEx-family exchanges, which compress every WebSocket frame with no
//! zlib header.

use std::io::Read;

use flate2::read::DeflateDecoder;

use crate::error::AggregatorError;

/// Inflates a raw-DEFLATE compressed frame into UTF-8 text.
pub fn inflate_raw(exchange: &str, bytes: &[u8]) -> Result<String, AggregatorError> {
    let mut decoder = DeflateDecoder::new(bytes);
    let mut out = String::new();
    decoder.read_to_string(&mut out).map_err(|e| AggregatorError::ProtocolDecode {
        exchange: exchange.to_string(),
        reason: format!("raw-deflate decompression failed: {e}"),
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn round_trips_raw_deflate() {
        let original = r#"{"event":"ping"}"#;
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let inflated = inflate_raw("okx", &compressed).unwrap();
        assert_eq!(inflated, original);
    }

    #[test]
    fn garbage_input_is_protocol_decode_error() {
        let err = inflate_raw("okx", b"not deflate data").unwrap_err();
        assert!(matches!(err, AggregatorError::ProtocolDecode { .. }));
    }
}
