use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::kind::MessageKind;

/// Kind (`u16`) plus payload length (`u32`), both big-endian.
pub const HEADER_LEN: usize = 6;
pub const MAX_PAYLOAD_LEN: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: MessageKind,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(kind: MessageKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unknown message kind {0}")]
    UnknownKind(u16),
    #[error("payload too large: {len} bytes exceeds {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("frame io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_payload: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            max_payload: MAX_PAYLOAD_LEN,
        }
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let raw_kind = u16::from_be_bytes([src[0], src[1]]);
        let kind = MessageKind::from_u16(raw_kind).ok_or(FrameError::UnknownKind(raw_kind))?;
        let len = u32::from_be_bytes([src[2], src[3], src[4], src[5]]) as usize;
        if len > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                len,
                max: self.max_payload,
            });
        }
        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }
        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        Ok(Some(Frame { kind, payload }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        let len = frame.payload.len();
        if len > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                len,
                max: self.max_payload,
            });
        }
        dst.reserve(HEADER_LEN + len);
        dst.put_u16(frame.kind.as_u16());
        dst.put_u32(len as u32);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::timeout]
    fn header_is_kind_then_length_big_endian() {
        let mut buf = BytesMut::new();
        FrameCodec::new()
            .encode(Frame::new(MessageKind::Ping, vec![1, 2, 3]), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], &[0, 3, 0, 0, 0, 3, 1, 2, 3]);
    }

    #[test_timeout::timeout]
    fn partial_frames_wait_for_more_input() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0u8, 5, 0, 0, 0, 4, 9, 9][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&[9, 9, 0, 7]);
        let frame = codec.decode(&mut buf).unwrap().expect("complete frame");
        assert_eq!(frame.kind, MessageKind::ServerSync);
        assert_eq!(&frame.payload[..], &[9, 9, 9, 9]);
        // the trailing bytes start the next header
        assert_eq!(&buf[..], &[0, 7]);
    }

    #[test_timeout::timeout]
    fn unknown_kind_is_fatal() {
        let mut buf = BytesMut::from(&[0u8, 99, 0, 0, 0, 0][..]);
        let err = FrameCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::UnknownKind(99)));
    }

    #[test_timeout::timeout]
    fn oversized_payload_is_rejected_before_buffering() {
        let mut codec = FrameCodec::with_max_payload(16);
        let mut buf = BytesMut::from(&[0u8, 11, 0, 0, 1, 0][..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { len: 256, max: 16 }
        ));
    }
}
