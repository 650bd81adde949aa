//! Datagram layout carrying a send timestamp and a sequence number.
//!
//! # Packet Format
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────┐
//! │  Timestamp   │  Sequence    │      Padding        │
//! │  (8 bytes)   │  (8 bytes)   │  (zero-filled)      │
//! └──────────────┴──────────────┴─────────────────────┘
//! ```
//!
//! - **Timestamp**: send time in microseconds since the UNIX epoch (little-endian)
//! - **Sequence**: 64-bit counter starting at 0, one per datagram (little-endian)
//! - **Padding**: fills the payload up to the configured size
//!
//! Both fields are optional: a payload shorter than 8 bytes carries neither,
//! one shorter than 16 bytes carries only the timestamp. The configured packet
//! size also accounts for [`PROTOCOL_OVERHEAD`] bytes of link, IP and UDP
//! headers which are not part of the payload.
//!
//! # Examples
//!
//! ```
//! use udp_perf::udp_packet::{PacketHeader, PROTOCOL_OVERHEAD};
//!
//! let mut payload = vec![0u8; 1500 - PROTOCOL_OVERHEAD];
//! PacketHeader::new(1_700_000_000_000_000, 42).write_to(&mut payload);
//!
//! let header = PacketHeader::decode(&payload);
//! assert_eq!(header.sequence, Some(42));
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

/// Ethernet (14) + IPv4 (20) + UDP (8) header bytes accounted per packet.
pub const PROTOCOL_OVERHEAD: usize = 14 + 20 + 8;

const TIMESTAMP_RANGE: std::ops::Range<usize> = 0..8;
const SEQUENCE_RANGE: std::ops::Range<usize> = 8..16;

/// Fields embedded at the start of a datagram payload.
///
/// `None` means the payload was too short to carry the field. A zero timestamp
/// is reserved and decodes as `None` as well; senders never emit it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketHeader {
    /// Send timestamp in microseconds since UNIX epoch
    pub timestamp_us: Option<u64>,
    /// Packet sequence number
    pub sequence: Option<u64>,
}

impl PacketHeader {
    /// Size of the full header in bytes
    pub const SIZE: usize = 16;

    /// Creates a header carrying both fields.
    pub fn new(timestamp_us: u64, sequence: u64) -> Self {
        Self {
            timestamp_us: Some(timestamp_us),
            sequence: Some(sequence),
        }
    }

    /// Writes the fields that fit into `payload` and leaves the rest untouched.
    pub fn write_to(&self, payload: &mut [u8]) {
        if let (Some(ts), Some(dst)) = (self.timestamp_us, payload.get_mut(TIMESTAMP_RANGE)) {
            dst.copy_from_slice(&ts.to_le_bytes());
        }
        if let (Some(seq), Some(dst)) = (self.sequence, payload.get_mut(SEQUENCE_RANGE)) {
            dst.copy_from_slice(&seq.to_le_bytes());
        }
    }

    /// Reads whichever fields the payload is long enough to hold.
    pub fn decode(payload: &[u8]) -> Self {
        Self {
            timestamp_us: read_u64(payload, TIMESTAMP_RANGE).filter(|&ts| ts != 0),
            sequence: read_u64(payload, SEQUENCE_RANGE),
        }
    }
}

fn read_u64(payload: &[u8], range: std::ops::Range<usize>) -> Option<u64> {
    let bytes = payload.get(range)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

/// Current wall-clock time in microseconds since the UNIX epoch.
///
/// Both roles stamp and compare with this clock; it is only meaningful as a
/// delta between two hosts whose clocks stay roughly aligned.
pub fn timestamp_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}
