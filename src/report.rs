//! Final aggregate report printed by the server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregates of one test run.
///
/// Delay figures are `None` when no timestamped packet was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Accepted bytes, protocol overhead included
    pub bytes_received: u64,
    /// Accepted packets, warm-up excluded
    pub packets_received: u64,
    /// Packet size including protocol overhead
    pub packet_size: u64,
    /// Payload bytes per datagram
    pub payload_size: u64,
    /// Size and ordering errors
    pub errors: u64,
    pub min_delay_us: Option<u64>,
    pub avg_delay_us: Option<u64>,
    pub max_delay_us: Option<u64>,
    /// Smoothed jitter in microseconds
    pub jitter_us: f64,
    /// Time between the warm-up packet and the last packet
    pub elapsed_us: u64,
    /// Packets whose timestamp was ahead of the receiver clock
    pub clock_skew: u64,
}

impl Report {
    /// Throughput in bits per second over the elapsed time, `None` if no time
    /// has elapsed.
    pub fn bits_per_second(&self) -> Option<u64> {
        if self.elapsed_us == 0 {
            return None;
        }
        let bps = u128::from(self.bytes_received) * 8_000_000 / u128::from(self.elapsed_us);
        Some(bps as u64)
    }

    /// Single-line `key:value` form.
    pub fn concise(&self) -> Concise<'_> {
        Concise(self)
    }

    /// Multi-line human-readable form with the derived bandwidth.
    pub fn verbose(&self) -> Verbose<'_> {
        Verbose(self)
    }

    /// Pretty-printed JSON form.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Prints a missing value as `-`.
struct Value(Option<u64>);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{}", v),
            None => f.write_str("-"),
        }
    }
}

pub struct Concise<'a>(&'a Report);

impl fmt::Display for Concise<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        write!(
            f,
            "brx:{} prx:{} pksz:{} plsz:{} err:{} ",
            r.bytes_received, r.packets_received, r.packet_size, r.payload_size, r.errors
        )?;
        write!(
            f,
            "mind:{} avgd:{} maxd:{} jit:{:.6} time:{}",
            Value(r.min_delay_us),
            Value(r.avg_delay_us),
            Value(r.max_delay_us),
            r.jitter_us,
            r.elapsed_us
        )
    }
}

pub struct Verbose<'a>(&'a Report);

impl fmt::Display for Verbose<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        writeln!(
            f,
            "Received: {} bytes {} packets (size {}/{}) {} errors.",
            r.bytes_received, r.packets_received, r.packet_size, r.payload_size, r.errors
        )?;
        writeln!(
            f,
            "Delay: {}/{}/{} (min/avg/max). Jitter: {:.6}. Time: {} us",
            Value(r.min_delay_us),
            Value(r.avg_delay_us),
            Value(r.max_delay_us),
            r.jitter_us,
            r.elapsed_us
        )?;
        if r.clock_skew > 0 {
            writeln!(
                f,
                "Clock skew: {} packets stamped ahead of the local clock.",
                r.clock_skew
            )?;
        }
        write!(f, "Bandwidth: {} bit/s.", Value(r.bits_per_second()))
    }
}
