//! WebSocket frame parsing and serialization
//!
//! Frames are encoded in one pass into a [`BytesMut`] and decoded
//! incrementally: [`FrameParser`] keeps the bytes of a frame that arrived
//! across several reads until the whole declared payload is present.

use crate::{
    error::{Error, FrameError, Result},
    protocol::{constants::MAX_CONTROL_PAYLOAD, frame::*, Opcode},
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Which side of the connection produced the frames being decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskPolicy {
    /// Client to server: every frame must carry a masking key
    Required,
    /// Server to client: no frame may carry a masking key
    Forbidden,
    /// Accept either form
    Any,
}

/// Represents a WebSocket frame according to RFC 6455
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Indicates if this is the final frame in a message
    pub fin: bool,
    /// Frame opcode
    pub opcode: Opcode,
    /// Masking key applied on the wire (if any)
    pub mask: Option<[u8; 4]>,
    /// Unmasked payload data
    pub payload: Bytes,
}

impl Frame {
    /// Create a new final, unmasked frame with the given opcode and payload
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Create a text frame
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Text, payload)
    }

    /// Create a binary frame
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Binary, payload)
    }

    /// Create a close frame with optional code and reason
    pub fn close(code: Option<u16>, reason: Option<&str>) -> Self {
        let mut payload = BytesMut::new();

        if let Some(code) = code {
            payload.put_u16(code);
            if let Some(reason) = reason {
                payload.put_slice(reason.as_bytes());
            }
        }

        Self::new(Opcode::Close, payload.freeze())
    }

    /// Create a ping frame
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Ping, payload)
    }

    /// Create a pong frame
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(Opcode::Pong, payload)
    }

    /// Set the FIN bit
    pub fn fin(mut self, fin: bool) -> Self {
        self.fin = fin;
        self
    }

    /// Mask the frame with a random key (client side)
    pub fn masked(self) -> Self {
        self.masked_with(rand::random::<[u8; 4]>())
    }

    /// Mask the frame with the given key
    pub fn masked_with(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }

    /// Serialize the frame to bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Number of bytes [`Frame::write_to`] will produce
    pub fn encoded_len(&self) -> usize {
        let len = self.payload.len();
        let length_field = if len <= PAYLOAD_LEN_INLINE_MAX {
            0
        } else if len <= u16::MAX as usize {
            2
        } else {
            8
        };
        let mask = if self.mask.is_some() { MASKING_KEY_LEN } else { 0 };
        2 + length_field + mask + len
    }

    /// Write the frame to a buffer
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u8(((self.fin as u8) << 7) | self.opcode.value());

        let payload_len = self.payload.len();
        let mask_bit = if self.mask.is_some() { MASK_BIT } else { 0 };

        if payload_len <= PAYLOAD_LEN_INLINE_MAX {
            buf.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= u16::MAX as usize {
            buf.put_u8(mask_bit | PAYLOAD_LEN_16);
            buf.put_u16(payload_len as u16);
        } else {
            buf.put_u8(mask_bit | PAYLOAD_LEN_64);
            buf.put_u64(payload_len as u64);
        }

        match self.mask {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(&self.payload);
                apply_mask(&mut buf[start..], key);
            }
            None => buf.put_slice(&self.payload),
        }
    }

    /// Parse one frame from the head of `buf`
    ///
    /// On success the frame's bytes are consumed from `buf`. When `buf` does
    /// not hold the complete frame yet, `FrameError::InsufficientData` is
    /// returned and `buf` is left untouched.
    pub fn parse(buf: &mut BytesMut, policy: MaskPolicy, max_payload: usize) -> Result<Self> {
        let have = buf.len();
        if have < 2 {
            return Err(FrameError::InsufficientData { needed: 2, have }.into());
        }

        let first_byte = buf[0];
        let fin = (first_byte & FIN_BIT) != 0;
        if first_byte & (RSV1_BIT | RSV2_BIT | RSV3_BIT) != 0 {
            return Err(FrameError::ReservedBitsSet.into());
        }
        let opcode = Opcode::from(first_byte & OPCODE_MASK)
            .ok_or(FrameError::InvalidOpcode(first_byte & OPCODE_MASK))?;

        let second_byte = buf[1];
        let masked = (second_byte & MASK_BIT) != 0;
        match (policy, masked) {
            (MaskPolicy::Required, false) => return Err(FrameError::Unmasked.into()),
            (MaskPolicy::Forbidden, true) => return Err(FrameError::UnexpectedMask.into()),
            _ => {}
        }

        let (payload_len, mut offset) = match second_byte & PAYLOAD_LEN_MASK {
            PAYLOAD_LEN_16 => {
                ensure_available(have, 4)?;
                (u16::from_be_bytes([buf[2], buf[3]]) as u64, 4)
            }
            PAYLOAD_LEN_64 => {
                ensure_available(have, 10)?;
                let mut len = [0u8; 8];
                len.copy_from_slice(&buf[2..10]);
                (u64::from_be_bytes(len), 10)
            }
            len => (len as u64, 2),
        };

        if opcode.is_control() {
            if !fin {
                return Err(FrameError::FragmentedControlFrame.into());
            }
            if payload_len > MAX_CONTROL_PAYLOAD {
                return Err(FrameError::ControlFrameTooLarge(payload_len).into());
            }
        }
        if payload_len > max_payload as u64 {
            return Err(FrameError::TooLarge {
                size: payload_len,
                max: max_payload,
            }
            .into());
        }
        let payload_len = payload_len as usize;

        let mask = if masked {
            ensure_available(have, offset + MASKING_KEY_LEN)?;
            let mut key = [0u8; 4];
            key.copy_from_slice(&buf[offset..offset + MASKING_KEY_LEN]);
            offset += MASKING_KEY_LEN;
            Some(key)
        } else {
            None
        };

        ensure_available(have, offset + payload_len)?;

        buf.advance(offset);
        let mut payload = buf.split_to(payload_len);
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        Ok(Frame {
            fin,
            opcode,
            mask,
            payload: payload.freeze(),
        })
    }

    /// Get the payload length
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if this is a control frame
    pub fn is_control(&self) -> bool {
        self.opcode.is_control()
    }

    /// Check if this is the final frame
    pub fn is_final(&self) -> bool {
        self.fin
    }
}

fn ensure_available(have: usize, needed: usize) -> Result<()> {
    if have < needed {
        return Err(FrameError::InsufficientData { needed, have }.into());
    }
    Ok(())
}

/// XOR `data` in place with the 4-byte masking key
///
/// Masking is an involution: applying the same key twice restores the input.
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Incremental frame decoder
///
/// Owns the reassembly buffer of one connection. Bytes are appended as they
/// arrive; complete frames are cut from the head of the buffer and the
/// remainder is kept for the next call.
#[derive(Debug)]
pub struct FrameParser {
    /// Buffer for partial frame data
    buffer: BytesMut,
    /// Masking rule for the peer that produces the frames
    policy: MaskPolicy,
    /// Largest payload accepted
    max_payload: usize,
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new(policy: MaskPolicy, max_payload: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            policy,
            max_payload,
        }
    }

    /// Parser for frames sent by a client
    pub fn for_client_frames(max_payload: usize) -> Self {
        Self::new(MaskPolicy::Required, max_payload)
    }

    /// Append raw bytes to the reassembly buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Cut the next complete frame from the buffer
    ///
    /// Returns `Ok(None)` while the buffered bytes do not yet form a complete
    /// frame. A decode error leaves the buffer cleared: the stream cannot be
    /// resynchronised after a malformed header.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match Frame::parse(&mut self.buffer, self.policy, self.max_payload) {
            Ok(frame) => Ok(Some(frame)),
            Err(Error::Frame(FrameError::InsufficientData { .. })) => Ok(None),
            Err(e) => {
                self.buffer.clear();
                Err(e)
            }
        }
    }

    /// Feed data to the parser and try to extract one frame
    pub fn feed(&mut self, data: &[u8]) -> Result<Option<Frame>> {
        self.extend(data);
        self.next_frame()
    }

    /// Get the number of bytes currently buffered
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAX: usize = 16 * 1024 * 1024;

    #[test]
    fn test_text_frame_serialization() {
        let bytes = Frame::text("hello").to_bytes();

        assert_eq!(bytes[0], 0x81); // FIN=1, RSV=000, Opcode=0001
        assert_eq!(bytes[1], 0x05); // MASK=0, Length=5
        assert_eq!(&bytes[2..], b"hello");
    }

    #[test]
    fn test_length_field_boundaries() {
        let cases: [(usize, u8, usize); 6] = [
            (0, 0, 2),
            (10, 10, 2),
            (125, 125, 2),
            (126, PAYLOAD_LEN_16, 4),
            (65535, PAYLOAD_LEN_16, 4),
            (65536, PAYLOAD_LEN_64, 10),
        ];

        for (len, marker, header) in cases {
            let bytes = Frame::binary(vec![7u8; len]).to_bytes();
            assert_eq!(bytes[1], marker, "length {}", len);
            assert_eq!(bytes.len(), header + len, "length {}", len);
        }

        let bytes = Frame::binary(vec![0u8; 65536]).to_bytes();
        assert_eq!(bytes[2..10], (65536u64).to_be_bytes());
    }

    #[test]
    fn test_masked_frame_layout() {
        let key = [0x37, 0xfa, 0x21, 0x3d];
        let bytes = Frame::text("Hello").masked_with(key).to_bytes();

        // RFC 6455 section 5.7 sample
        assert_eq!(
            &bytes[..],
            &[0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]
        );
    }

    #[test]
    fn test_parse_masked_client_frame() {
        let wire = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let mut buf = BytesMut::from(&wire[..]);

        let frame = Frame::parse(&mut buf, MaskPolicy::Required, MAX).unwrap();
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.payload, "Hello");
        assert!(frame.fin);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unmasked_client_frame_rejected() {
        let mut buf = BytesMut::from(&Frame::text("hi").to_bytes()[..]);
        let err = Frame::parse(&mut buf, MaskPolicy::Required, MAX).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::Unmasked)));
    }

    #[test]
    fn test_masked_server_frame_rejected() {
        let mut buf = BytesMut::from(&Frame::text("hi").masked().to_bytes()[..]);
        let err = Frame::parse(&mut buf, MaskPolicy::Forbidden, MAX).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::UnexpectedMask)));
    }

    #[test]
    fn test_lenient_policy_accepts_both() {
        let mut parser = FrameParser::new(MaskPolicy::Any, MAX);
        parser.extend(&Frame::pong("a").to_bytes());
        parser.extend(&Frame::pong("b").masked().to_bytes());

        let plain = parser.next_frame().unwrap().unwrap();
        let masked = parser.next_frame().unwrap().unwrap();
        assert_eq!((plain.opcode, plain.payload.clone()), (Opcode::Pong, Bytes::from("a")));
        assert!(plain.is_final() && plain.mask.is_none());
        assert_eq!(masked.payload, "b");
        assert!(masked.mask.is_some());
    }

    #[test]
    fn test_reserved_opcode_rejected() {
        let mut buf = BytesMut::from(&[0x83u8, 0x80, 0, 0, 0, 0][..]);
        let err = Frame::parse(&mut buf, MaskPolicy::Required, MAX).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::InvalidOpcode(0x3))));
    }

    #[test]
    fn test_reserved_bits_rejected() {
        let mut buf = BytesMut::from(&[0xC1u8, 0x80, 0, 0, 0, 0][..]);
        let err = Frame::parse(&mut buf, MaskPolicy::Required, MAX).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::ReservedBitsSet)));
    }

    #[test]
    fn test_control_frame_rules() {
        let fragmented = Frame::ping("x").fin(false).masked().to_bytes();
        let mut buf = BytesMut::from(&fragmented[..]);
        let err = Frame::parse(&mut buf, MaskPolicy::Required, MAX).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::FragmentedControlFrame)));

        let oversized = Frame::ping(vec![0u8; 126]).masked().to_bytes();
        let mut buf = BytesMut::from(&oversized[..]);
        let err = Frame::parse(&mut buf, MaskPolicy::Required, MAX).unwrap_err();
        assert!(matches!(err, Error::Frame(FrameError::ControlFrameTooLarge(126))));
    }

    #[test]
    fn test_payload_limit() {
        let bytes = Frame::binary(vec![0u8; 200]).masked().to_bytes();
        let mut buf = BytesMut::from(&bytes[..]);
        let err = Frame::parse(&mut buf, MaskPolicy::Required, 100).unwrap_err();
        assert!(matches!(
            err,
            Error::Frame(FrameError::TooLarge { size: 200, max: 100 })
        ));
    }

    #[test]
    fn test_close_frame() {
        let bytes = Frame::close(Some(1000), Some("Goodbye")).to_bytes();

        assert_eq!(bytes[0], 0x88); // FIN=1, Opcode=8
        assert_eq!(bytes[1], 0x09); // 2 bytes code + 7 bytes reason
        assert_eq!(&bytes[2..4], 1000u16.to_be_bytes());
        assert_eq!(&bytes[4..], b"Goodbye");
    }

    #[test]
    fn test_parser_partial_delivery() {
        let mut parser = FrameParser::for_client_frames(MAX);
        let bytes = Frame::text("frame1").masked().to_bytes();

        assert_eq!(parser.feed(&bytes[..5]).unwrap(), None);
        assert_eq!(parser.buffered_bytes(), 5);

        let frame = parser.feed(&bytes[5..]).unwrap().unwrap();
        assert_eq!(frame.payload, "frame1");
        assert_eq!(parser.buffered_bytes(), 0);
    }

    #[test]
    fn test_parser_keeps_trailing_frame() {
        let mut parser = FrameParser::for_client_frames(MAX);
        let mut wire = BytesMut::new();
        Frame::text("one").masked().write_to(&mut wire);
        Frame::ping("two").masked().write_to(&mut wire);

        let first = parser.feed(&wire).unwrap().unwrap();
        assert_eq!(first.payload, "one");
        let second = parser.next_frame().unwrap().unwrap();
        assert_eq!(second.opcode, Opcode::Ping);
        assert_eq!(second.payload, "two");
        assert_eq!(parser.next_frame().unwrap(), None);
    }

    #[test]
    fn test_parser_clears_after_error() {
        let mut parser = FrameParser::for_client_frames(MAX);
        assert!(parser.feed(&Frame::text("plain").to_bytes()).is_err());
        assert_eq!(parser.buffered_bytes(), 0);
    }

    proptest! {
        #[test]
        fn prop_masking_is_an_involution(payload in proptest::collection::vec(any::<u8>(), 0..512), key in any::<[u8; 4]>()) {
            let mut data = payload.clone();
            apply_mask(&mut data, key);
            apply_mask(&mut data, key);
            prop_assert_eq!(data, payload);
        }

        #[test]
        fn prop_masked_frame_decodes_to_payload(payload in proptest::collection::vec(any::<u8>(), 0..70_000), key in any::<[u8; 4]>()) {
            let wire = Frame::binary(payload.clone()).masked_with(key).to_bytes();
            let mut buf = BytesMut::from(&wire[..]);
            let frame = Frame::parse(&mut buf, MaskPolicy::Required, MAX).unwrap();
            prop_assert_eq!(&frame.payload[..], &payload[..]);
            prop_assert_eq!(frame.mask, Some(key));
            prop_assert!(buf.is_empty());
        }

        #[test]
        fn prop_any_split_point_yields_one_frame(payload in proptest::collection::vec(any::<u8>(), 0..300), split in 0usize..400) {
            let wire = Frame::binary(payload.clone()).masked().to_bytes();
            let split = split.min(wire.len() - 1);
            let mut parser = FrameParser::for_client_frames(MAX);

            prop_assert_eq!(parser.feed(&wire[..split]).unwrap(), None);
            let frame = parser.feed(&wire[split..]).unwrap().unwrap();
            prop_assert_eq!(&frame.payload[..], &payload[..]);
        }
    }
}
