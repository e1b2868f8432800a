//! Length-prefixed framing over a byte stream (spec §4.1).
//!
//! Wire format: a 4-byte big-endian unsigned length `N`, followed by
//! exactly `N` payload bytes, excluded from the length itself. There is no
//! maximum frame length enforced here — upper layers (the Session's
//! decoder, or a future request-size guard) supply bounds if they need
//! them.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed, LengthDelimitedCodec};

use crate::error::{ClientError, ClientResult};

/// A framed duplex transport: reading yields complete frame payloads,
/// writing a `Bytes` payload emits one frame.
pub type FramedTransport<T> = Framed<T, LengthDelimitedCodec>;

/// Wraps a byte stream in the length-prefixed frame codec described above.
pub fn framed<T: AsyncRead + AsyncWrite>(io: T) -> FramedTransport<T> {
    Framed::new(io, codec())
}

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .big_endian()
        .length_field_length(4)
        .max_frame_length(usize::MAX)
        .new_codec()
}

/// Encodes `payload` as one frame: a 4-byte big-endian length prefix
/// followed by the payload, emitted as a single contiguous buffer.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    codec()
        .encode(Bytes::copy_from_slice(payload), &mut buf)
        .expect("encoding into an in-memory buffer cannot fail");
    buf.to_vec()
}

/// Decodes every complete frame out of `bytes`, treating the buffer as a
/// closed stream: a trailing partial frame is an `UnexpectedEof`
/// [`ClientError::DecodeError`], not a short read to retry later. A length
/// of zero is a valid empty frame.
pub fn unframe(bytes: &[u8]) -> ClientResult<Vec<Vec<u8>>> {
    let mut buf = BytesMut::from(bytes);
    let mut codec = codec();
    let mut frames = Vec::new();

    loop {
        match codec.decode_eof(&mut buf) {
            Ok(Some(payload)) => frames.push(payload.to_vec()),
            Ok(None) => break,
            Err(e) => return Err(ClientError::DecodeError(e.to_string())),
        }
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_a_payload() {
        let payload = [0x01, 0x02, 0x03];
        let framed = frame(&payload);
        assert_eq!(framed, vec![0x00, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03]);
        assert_eq!(unframe(&framed).unwrap(), vec![payload.to_vec()]);
    }

    #[test]
    fn empty_frame_is_valid() {
        let framed = frame(&[]);
        assert_eq!(framed, vec![0x00, 0x00, 0x00, 0x00]);
        assert_eq!(unframe(&framed).unwrap(), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn multiple_frames_decode_in_order() {
        let mut bytes = frame(b"one");
        bytes.extend(frame(b"two"));
        let decoded = unframe(&bytes).unwrap();
        assert_eq!(decoded, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn truncated_stream_is_unexpected_eof() {
        let mut bytes = frame(b"hello");
        bytes.truncate(bytes.len() - 1);
        let err = unframe(&bytes).unwrap_err();
        assert!(matches!(err, ClientError::DecodeError(_)));
    }
}
