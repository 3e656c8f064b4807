use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::crc::crc16_parts;
use crate::error::{DecodeError, FrameError, Result};
use crate::flags::{ACK, BROADCAST, NO_ACK_NEEDED};

/// Byte repeated in the preamble (alternating bits for clock recovery).
pub const PREAMBLE_BYTE: u8 = 0xAA;

/// Default preamble length in bytes (8 nibbles).
pub const DEFAULT_PREAMBLE_LEN: usize = 4;

/// Default network sync word.
pub const DEFAULT_SYNC_WORD: [u8; 2] = [0x2D, 0xD4];

/// Longest preamble the codec emits or searches.
pub const MAX_PREAMBLE_LEN: usize = 255;

/// Sync word size.
pub const SYNC_SIZE: usize = 2;

/// Header: to (1) + from (1) + id (1) + flags (1) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Payload length byte.
pub const LENGTH_SIZE: usize = 1;

/// CRC-16 trailer size.
pub const CRC_SIZE: usize = 2;

/// Largest payload a frame may carry by default.
pub const MAX_PAYLOAD: usize = 251;

/// Bytes following the sync word that are not payload.
const ENVELOPE_SIZE: usize = HEADER_SIZE + LENGTH_SIZE + CRC_SIZE;

/// The four addressing and control bytes at the front of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    /// Destination address, [`BROADCAST`] for all nodes.
    pub to: u8,
    /// Sender address.
    pub from: u8,
    /// Sender-chosen sequence number.
    pub id: u8,
    /// Flag bits, see [`crate::flags`].
    pub flags: u8,
}

impl Header {
    pub fn new(to: u8, from: u8, id: u8, flags: u8) -> Self {
        Self {
            to,
            from,
            id,
            flags,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.flags & ACK != 0
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST
    }

    /// True when the sender waits for an acknowledgment of this frame.
    pub fn wants_ack(&self) -> bool {
        !self.is_ack() && !self.is_broadcast() && self.flags & NO_ACK_NEEDED == 0
    }

    fn to_bytes(self) -> [u8; HEADER_SIZE] {
        [self.to, self.from, self.id, self.flags]
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(header: Header, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// The acknowledgment a node at `local` sends for the data frame `data`.
    pub fn ack_for(data: &Header, local: u8) -> Self {
        Self {
            header: Header::new(data.from, local, data.id, ACK),
            payload: Bytes::new(),
        }
    }

    /// Total bytes on the air for this frame, preamble included.
    pub fn wire_size(&self, config: &FrameConfig) -> usize {
        config
            .preamble_len
            .saturating_add(SYNC_SIZE + ENVELOPE_SIZE + self.payload.len())
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self, config: &FrameConfig) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        encode_frame(&self.header, &self.payload, config, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────────┬────┬──────┬────┬───────┬────────┬──────────┬──────────┐
/// │ Preamble  │ Sync     │ To │ From │ Id │ Flags │ Length │ Payload  │ CRC16    │
/// │ N x 0xAA  │ (2B)     │ 1B │ 1B   │ 1B │ 1B    │ 1B     │ (Length) │ (2B LE)  │
/// └───────────┴──────────┴────┴──────┴────┴───────┴────────┴──────────┴──────────┘
/// ```
/// The CRC covers To through Payload.
pub fn encode_frame(
    header: &Header,
    payload: &[u8],
    config: &FrameConfig,
    dst: &mut BytesMut,
) -> Result<()> {
    config.check_preamble()?;
    let max = config.effective_max_payload();
    if payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }

    let header = header.to_bytes();
    let length = [payload.len() as u8];
    let crc = crc16_parts(&[&header, &length, payload]);

    dst.reserve(config.preamble_len + SYNC_SIZE + ENVELOPE_SIZE + payload.len());
    dst.put_bytes(PREAMBLE_BYTE, config.preamble_len);
    dst.put_slice(&config.sync_word);
    dst.put_slice(&header);
    dst.put_slice(&length);
    dst.put_slice(payload);
    dst.put_u16_le(crc);
    Ok(())
}

/// Decode one received frame.
///
/// Checks run cheapest first: sync word, then declared length against the
/// buffer, then the CRC. The sync word may sit anywhere inside the preamble
/// window, so receivers that strip the preamble and receivers that keep it
/// both decode.
pub fn decode_frame(src: &[u8], config: &FrameConfig) -> std::result::Result<Frame, DecodeError> {
    let start = find_sync(src, config).ok_or(DecodeError::InvalidSync)?;
    let body = &src[start + SYNC_SIZE..];

    if body.len() < ENVELOPE_SIZE {
        return Err(DecodeError::LengthMismatch {
            declared: ENVELOPE_SIZE,
            available: body.len(),
        });
    }

    let payload_len = body[HEADER_SIZE] as usize;
    let declared = ENVELOPE_SIZE + payload_len;
    if payload_len > config.effective_max_payload() || body.len() != declared {
        trace!(declared, available = body.len(), "frame length mismatch");
        return Err(DecodeError::LengthMismatch {
            declared,
            available: body.len(),
        });
    }

    let covered = &body[..HEADER_SIZE + LENGTH_SIZE + payload_len];
    let trailer = &body[covered.len()..];
    let received = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = crc16_parts(&[covered]);
    if received != computed {
        trace!(received, computed, "frame crc mismatch");
        return Err(DecodeError::CrcMismatch { received, computed });
    }

    let header = Header::new(body[0], body[1], body[2], body[3]);
    let payload = Bytes::copy_from_slice(&covered[HEADER_SIZE + LENGTH_SIZE..]);
    Ok(Frame { header, payload })
}

fn find_sync(src: &[u8], config: &FrameConfig) -> Option<usize> {
    let last = config
        .preamble_len
        .min(src.len().saturating_sub(SYNC_SIZE));
    (0..=last).find(|&offset| {
        src.get(offset..offset + SYNC_SIZE)
            .is_some_and(|candidate| candidate == config.sync_word)
    })
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Network-identifying sync word. Nodes with different sync words never
    /// decode each other's frames.
    pub sync_word: [u8; 2],
    /// Preamble bytes emitted before the sync word, and the window searched
    /// for it on receive.
    pub preamble_len: usize,
    /// Maximum payload size in bytes. Default: 251.
    pub max_payload: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            sync_word: DEFAULT_SYNC_WORD,
            preamble_len: DEFAULT_PREAMBLE_LEN,
            max_payload: MAX_PAYLOAD,
        }
    }
}

impl FrameConfig {
    /// Sync word `[0x2D, group]`, the usual way to split one frequency into
    /// separate networks.
    pub fn with_group(mut self, group: u8) -> Self {
        self.sync_word = [DEFAULT_SYNC_WORD[0], group];
        self
    }

    /// Reject configurations that cannot round-trip.
    pub fn validate(&self) -> Result<()> {
        if self.max_payload > u8::MAX as usize {
            return Err(FrameError::InvalidConfig(format!(
                "max_payload {} exceeds length field (max {})",
                self.max_payload,
                u8::MAX
            )));
        }
        self.check_preamble()?;
        if self.sync_word[0] == PREAMBLE_BYTE {
            return Err(FrameError::InvalidConfig(format!(
                "sync word must not start with preamble byte 0x{PREAMBLE_BYTE:02X}"
            )));
        }
        Ok(())
    }

    fn check_preamble(&self) -> Result<()> {
        if self.preamble_len > MAX_PREAMBLE_LEN {
            return Err(FrameError::InvalidConfig(format!(
                "preamble_len {} exceeds {MAX_PREAMBLE_LEN}",
                self.preamble_len
            )));
        }
        Ok(())
    }

    fn effective_max_payload(&self) -> usize {
        self.max_payload.min(u8::MAX as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{RETRY, RESERVED};

    fn sample() -> Frame {
        Frame::new(Header::new(2, 1, 7, 0), Bytes::from_static(b"Hi, I'm a Raspi!"))
    }

    #[test]
    fn test_encode_layout() {
        let cfg = FrameConfig::default();
        let wire = sample().encode(&cfg).unwrap();

        assert_eq!(&wire[..4], &[0xAA; 4]);
        assert_eq!(&wire[4..6], &DEFAULT_SYNC_WORD);
        assert_eq!(&wire[6..10], &[2, 1, 7, 0]);
        assert_eq!(wire[10], 16);
        assert_eq!(&wire[11..27], b"Hi, I'm a Raspi!");

        let crc = crc16_parts(&[&wire[6..27]]);
        assert_eq!(&wire[27..], &crc.to_le_bytes());
        assert_eq!(wire.len(), sample().wire_size(&cfg));
    }

    #[test]
    fn test_roundtrip_every_payload_length() {
        let cfg = FrameConfig::default();
        for len in 0..=MAX_PAYLOAD {
            let header = Header::new(len as u8, 0xFE - len as u8, len as u8, (len as u8) & 0x07);
            let payload: Vec<u8> = (0..len).map(|i| (i * 31 + 7) as u8).collect();
            let frame = Frame::new(header, payload);

            let decoded = decode_frame(&frame.encode(&cfg).unwrap(), &cfg).unwrap();
            assert_eq!(decoded, frame, "length {len}");
        }
    }

    #[test]
    fn test_roundtrip_without_preamble() {
        let cfg = FrameConfig::default();
        let wire = sample().encode(&cfg).unwrap();
        let stripped = &wire[cfg.preamble_len..];
        assert_eq!(decode_frame(stripped, &cfg).unwrap(), sample());
    }

    #[test]
    fn test_reserved_flags_survive() {
        let cfg = FrameConfig::default();
        let frame = Frame::new(Header::new(BROADCAST, 3, 0, RESERVED | RETRY), Bytes::new());
        let decoded = decode_frame(&frame.encode(&cfg).unwrap(), &cfg).unwrap();
        assert_eq!(decoded.header.flags, RESERVED | RETRY);
    }

    #[test]
    fn test_payload_too_large() {
        let cfg = FrameConfig::default();
        let mut buf = BytesMut::new();
        let err = encode_frame(&Header::new(1, 2, 3, 0), &[0u8; 252], &cfg, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 252,
                max: 251
            }
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_single_bit_flip_never_yields_a_different_frame() {
        let cfg = FrameConfig::default();
        let original = sample();
        let wire = original.encode(&cfg).unwrap().to_vec();
        let sync_at = cfg.preamble_len;
        let header_at = sync_at + SYNC_SIZE;
        let length_at = header_at + HEADER_SIZE;

        for byte in 0..wire.len() {
            for bit in 0..8 {
                let mut corrupted = wire.clone();
                corrupted[byte] ^= 1 << bit;
                let result = decode_frame(&corrupted, &cfg);

                if byte < sync_at {
                    assert_eq!(result.as_ref(), Ok(&original), "preamble byte {byte}");
                } else if byte < header_at {
                    assert_eq!(result, Err(DecodeError::InvalidSync), "sync byte {byte}");
                } else if byte == length_at {
                    assert!(
                        matches!(result, Err(DecodeError::LengthMismatch { .. })),
                        "length bit {bit}"
                    );
                } else {
                    assert!(
                        matches!(result, Err(DecodeError::CrcMismatch { .. })),
                        "byte {byte} bit {bit}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_decode_noise_is_invalid_sync() {
        let cfg = FrameConfig::default();
        assert_eq!(decode_frame(&[], &cfg), Err(DecodeError::InvalidSync));
        assert_eq!(
            decode_frame(&[0x13, 0x37, 0x00, 0x42, 0x99, 0x01, 0x02], &cfg),
            Err(DecodeError::InvalidSync)
        );
    }

    #[test]
    fn test_decode_foreign_sync_word_rejected() {
        let ours = FrameConfig::default().with_group(22);
        let theirs = FrameConfig::default();
        let wire = sample().encode(&theirs).unwrap();
        assert_eq!(decode_frame(&wire, &ours), Err(DecodeError::InvalidSync));
    }

    #[test]
    fn test_decode_truncated_is_length_mismatch() {
        let cfg = FrameConfig::default();
        let wire = sample().encode(&cfg).unwrap();

        let truncated = &wire[..wire.len() - 1];
        assert!(matches!(
            decode_frame(truncated, &cfg),
            Err(DecodeError::LengthMismatch { .. })
        ));

        let header_only = &wire[..cfg.preamble_len + SYNC_SIZE + 3];
        assert_eq!(
            decode_frame(header_only, &cfg),
            Err(DecodeError::LengthMismatch {
                declared: ENVELOPE_SIZE,
                available: 3
            })
        );
    }

    #[test]
    fn test_decode_trailing_bytes_is_length_mismatch() {
        let cfg = FrameConfig::default();
        let mut wire = sample().encode(&cfg).unwrap().to_vec();
        wire.push(0x00);
        assert!(matches!(
            decode_frame(&wire, &cfg),
            Err(DecodeError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_respects_configured_max() {
        let wide = FrameConfig::default();
        let narrow = FrameConfig {
            max_payload: 8,
            ..FrameConfig::default()
        };
        let wire = sample().encode(&wide).unwrap();
        assert!(matches!(
            decode_frame(&wire, &narrow),
            Err(DecodeError::LengthMismatch { declared, .. }) if declared == ENVELOPE_SIZE + 16
        ));
    }

    #[test]
    fn test_ack_for_echoes_id() {
        let data = Header::new(10, 5, 7, RETRY);
        let ack = Frame::ack_for(&data, 10);
        assert_eq!(ack.header, Header::new(5, 10, 7, ACK));
        assert!(ack.payload.is_empty());
        assert!(!ack.header.wants_ack());
    }

    #[test]
    fn test_wants_ack() {
        assert!(Header::new(1, 2, 3, 0).wants_ack());
        assert!(Header::new(1, 2, 3, RETRY).wants_ack());
        assert!(!Header::new(1, 2, 3, NO_ACK_NEEDED).wants_ack());
        assert!(!Header::new(BROADCAST, 2, 3, 0).wants_ack());
        assert!(!Header::new(1, 2, 3, ACK).wants_ack());
    }

    #[test]
    fn test_config_validation() {
        assert!(FrameConfig::default().validate().is_ok());

        let too_big = FrameConfig {
            max_payload: 300,
            ..FrameConfig::default()
        };
        assert!(matches!(too_big.validate(), Err(FrameError::InvalidConfig(_))));

        let bad_sync = FrameConfig {
            sync_word: [PREAMBLE_BYTE, 0x01],
            ..FrameConfig::default()
        };
        assert!(matches!(bad_sync.validate(), Err(FrameError::InvalidConfig(_))));

        let longest = FrameConfig {
            preamble_len: MAX_PREAMBLE_LEN,
            ..FrameConfig::default()
        };
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn test_oversized_preamble_rejected() {
        let cfg = FrameConfig {
            preamble_len: usize::MAX,
            ..FrameConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(FrameError::InvalidConfig(_))));
        assert!(matches!(sample().encode(&cfg), Err(FrameError::InvalidConfig(_))));
        assert_eq!(sample().wire_size(&cfg), usize::MAX);
    }

    #[test]
    fn test_sync_search_stays_inside_buffer() {
        let wide = FrameConfig {
            preamble_len: usize::MAX,
            ..FrameConfig::default()
        };
        let wire = sample().encode(&FrameConfig::default()).unwrap();
        assert_eq!(decode_frame(&wire, &wide).unwrap(), sample());
        assert_eq!(decode_frame(&[0x13; 64], &wide), Err(DecodeError::InvalidSync));
        assert_eq!(decode_frame(&[0x2D], &wide), Err(DecodeError::InvalidSync));
    }
}
