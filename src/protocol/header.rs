//! Request/response envelope headers (spec §6).
//!
//! Outgoing: `int16 apiKey, int16 apiVersion, int32 correlationId,
//! nullable_string clientId, <body>`. Incoming: `int32 correlationId,
//! <body>` — this crate reads only the correlation id off an incoming
//! frame; the rest belongs to the response body codec.

use bytes::Bytes;

use crate::error::ClientError;
use crate::protocol::codec::{ByteReader, ByteWriter};
use crate::protocol::messages::ApiKey;

/// Encodes the outbound header plus body into one contiguous buffer using
/// the size-first, write-second pattern: the body is encoded first so its
/// length is known, then the header is written ahead of it.
pub fn encode_request(
    api_key: ApiKey,
    api_version: i16,
    correlation_id: i32,
    client_id: &str,
    body: &Bytes,
) -> Bytes {
    let mut w = ByteWriter::new();
    w.write_i16(api_key.code())
        .write_i16(api_version)
        .write_i32(correlation_id)
        .write_string(client_id);
    let mut encoded = w.into_bytes().to_vec();
    encoded.extend_from_slice(body);
    Bytes::from(encoded)
}

/// Strips the 4-byte correlation id off an inbound frame, returning it
/// along with the remaining response body bytes.
pub fn decode_response_prefix(frame: &[u8]) -> Result<(i32, Bytes), ClientError> {
    let mut r = ByteReader::new(frame);
    let correlation_id = r.read_i32()?;
    let remaining = r.remaining();
    let body = Bytes::copy_from_slice(&frame[frame.len() - remaining..]);
    Ok((correlation_id, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_header_precedes_body() {
        let body = Bytes::from_static(b"hello");
        let encoded = encode_request(ApiKey::Metadata, 0, 7, "my-client", &body);

        let api_key = i16::from_be_bytes(encoded[0..2].try_into().unwrap());
        let api_version = i16::from_be_bytes(encoded[2..4].try_into().unwrap());
        let correlation_id = i32::from_be_bytes(encoded[4..8].try_into().unwrap());
        assert_eq!(api_key, ApiKey::Metadata.code());
        assert_eq!(api_version, 0);
        assert_eq!(correlation_id, 7);
        assert!(encoded.ends_with(b"hello"));
    }

    #[test]
    fn response_prefix_strips_correlation_id() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&99i32.to_be_bytes());
        frame.extend_from_slice(b"payload");

        let (correlation_id, body) = decode_response_prefix(&frame).unwrap();
        assert_eq!(correlation_id, 99);
        assert_eq!(&body[..], b"payload");
    }
}
