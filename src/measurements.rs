//! Receiver-side statistics: delay, jitter, ordering and stop conditions.
//!
//! Everything here is pure computation over observations handed in by the
//! receive loop, so it can be exercised without sockets.

use crate::config::{Config, DEFAULT_MAX_TIME};
use crate::report::Report;
use crate::udp_packet::{PacketHeader, PROTOCOL_OVERHEAD};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Weight denominator of the jitter moving average (RFC 3550).
pub const JITTER_SMOOTHING: f64 = 16.0;

/// One-way delay in microseconds between an embedded send timestamp and the
/// local arrival time.
///
/// Returns `None` when the timestamp lies in the receiver's future, which
/// happens when the two clocks are skewed or the payload is garbage.
///
/// # Examples
///
/// ```
/// use udp_perf::measurements::one_way_delay;
///
/// assert_eq!(one_way_delay(1_000_250, 1_000_000), Some(250));
/// assert_eq!(one_way_delay(1_000_000, 1_000_250), None);
/// ```
pub fn one_way_delay(now_us: u64, sent_us: u64) -> Option<u64> {
    now_us.checked_sub(sent_us)
}

/// Running delay aggregates and smoothed jitter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelayStats {
    min: Option<u64>,
    max: Option<u64>,
    total: u128,
    samples: u64,
    last: Option<u64>,
    jitter: f64,
}

impl DelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one delay sample.
    ///
    /// The jitter is only updated once a previous sample exists:
    /// `J += (|D(n) - D(n-1)| - J) / 16`.
    pub fn record(&mut self, delay_us: u64) {
        if let Some(last) = self.last {
            let delta = last.abs_diff(delay_us) as f64;
            self.jitter += (delta - self.jitter) / JITTER_SMOOTHING;
        }
        self.last = Some(delay_us);

        self.total += u128::from(delay_us);
        self.samples += 1;
        self.min = Some(self.min.map_or(delay_us, |m| m.min(delay_us)));
        self.max = Some(self.max.map_or(delay_us, |m| m.max(delay_us)));
    }

    pub fn min(&self) -> Option<u64> {
        self.min
    }

    pub fn max(&self) -> Option<u64> {
        self.max
    }

    /// Mean delay, `None` until a sample has been recorded.
    pub fn average(&self) -> Option<u64> {
        if self.samples == 0 {
            return None;
        }
        Some((self.total / u128::from(self.samples)) as u64)
    }

    /// Smoothed jitter in microseconds.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// How the receive loop classified a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First datagram of the session, used only as a baseline
    WarmUp,
    /// Counted in the statistics
    Accepted,
    /// Counted in the statistics and as an ordering error
    OutOfOrder,
    /// Wrong length; only the error counter moved
    SizeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    expected_size: usize,
    clock_start: u64,
}

/// Receive-side session state.
///
/// Owned by the receive loop for the duration of one test run.
///
/// # Examples
///
/// ```
/// use udp_perf::measurements::{Observation, Session};
/// use udp_perf::udp_packet::PacketHeader;
///
/// let mut session = Session::new();
/// assert_eq!(session.observe(100, PacketHeader::new(1_000, 0), 1_100), Observation::WarmUp);
/// assert_eq!(session.observe(100, PacketHeader::new(1_010, 1), 1_115), Observation::Accepted);
/// assert_eq!(session.delay().min(), Some(105));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Session {
    baseline: Option<Baseline>,
    last_timestamp: Option<u64>,
    last_sequence: Option<u64>,
    last_arrival: u64,
    delay: DelayStats,
    packets: u64,
    bytes: u64,
    errors: u64,
    size_errors: u64,
    clock_skew: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies one datagram of `len` bytes that arrived at `now_us` and
    /// updates the session accordingly.
    pub fn observe(&mut self, len: usize, header: PacketHeader, now_us: u64) -> Observation {
        self.last_arrival = now_us;

        let Some(baseline) = self.baseline else {
            self.baseline = Some(Baseline {
                expected_size: len,
                clock_start: now_us,
            });
            self.last_timestamp = header.timestamp_us;
            self.last_sequence = header.sequence;
            return Observation::WarmUp;
        };

        if len != baseline.expected_size {
            self.errors += 1;
            self.size_errors += 1;
            return Observation::SizeMismatch {
                expected: baseline.expected_size,
                actual: len,
            };
        }

        self.packets += 1;
        self.bytes += (len + PROTOCOL_OVERHEAD) as u64;

        if let Some(sent_us) = header.timestamp_us {
            match one_way_delay(now_us, sent_us) {
                Some(delay) => self.delay.record(delay),
                None => self.clock_skew += 1,
            }
        }

        let stale_timestamp = matches!(
            (header.timestamp_us, self.last_timestamp),
            (Some(ts), Some(last)) if ts <= last
        );
        let stale_sequence = matches!(
            (header.sequence, self.last_sequence),
            (Some(seq), Some(last)) if seq <= last
        );

        if header.timestamp_us.is_some() {
            self.last_timestamp = header.timestamp_us;
        }
        if header.sequence.is_some() {
            self.last_sequence = header.sequence;
        }

        if stale_timestamp || stale_sequence {
            self.errors += 1;
            Observation::OutOfOrder
        } else {
            Observation::Accepted
        }
    }

    /// Whether the warm-up packet has been seen.
    pub fn is_started(&self) -> bool {
        self.baseline.is_some()
    }

    /// Length every datagram must have, once known.
    pub fn expected_size(&self) -> Option<usize> {
        self.baseline.map(|b| b.expected_size)
    }

    /// Microseconds between the warm-up packet and the latest datagram.
    pub fn elapsed_us(&self) -> u64 {
        self.baseline
            .map_or(0, |b| self.last_arrival.saturating_sub(b.clock_start))
    }

    /// Accepted packets.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Datagrams seen after the warm-up, accepted or rejected for their size.
    pub fn packets_seen(&self) -> u64 {
        self.packets + self.size_errors
    }

    /// Accepted bytes, protocol overhead included.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Size and ordering errors.
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Timestamped packets whose timestamp was ahead of the local clock.
    pub fn clock_skew(&self) -> u64 {
        self.clock_skew
    }

    pub fn delay(&self) -> &DelayStats {
        &self.delay
    }

    /// Snapshot of the aggregates for reporting.
    pub fn report(&self) -> Report {
        let payload_size = self.expected_size().unwrap_or(0) as u64;
        Report {
            bytes_received: self.bytes,
            packets_received: self.packets,
            packet_size: payload_size + PROTOCOL_OVERHEAD as u64,
            payload_size,
            errors: self.errors,
            min_delay_us: self.delay.min(),
            avg_delay_us: self.delay.average(),
            max_delay_us: self.delay.max(),
            jitter_us: self.delay.jitter(),
            elapsed_us: self.elapsed_us(),
            clock_skew: self.clock_skew,
        }
    }
}

/// Which stop condition ended a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Time,
    Packets,
    Bytes,
}

/// Limits after which the server ends the test. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopConditions {
    pub max_time: Option<Duration>,
    pub max_packets: Option<u64>,
    pub max_bytes: Option<u64>,
}

impl StopConditions {
    /// Builds the limits from a config, falling back to [`DEFAULT_MAX_TIME`]
    /// when none is set.
    ///
    /// # Examples
    ///
    /// ```
    /// use udp_perf::Config;
    /// use udp_perf::measurements::StopConditions;
    /// use std::time::Duration;
    ///
    /// let stop = StopConditions::from_config(&Config::server(5000));
    /// assert_eq!(stop.max_time, Some(Duration::from_secs(10)));
    /// ```
    pub fn from_config(config: &Config) -> Self {
        let mut stop = Self {
            max_time: config.max_time.filter(|t| !t.is_zero()),
            max_packets: config.max_packets.filter(|&n| n > 0),
            max_bytes: config.max_bytes.filter(|&n| n > 0),
        };
        if stop.max_time.is_none() && stop.max_packets.is_none() && stop.max_bytes.is_none() {
            stop.max_time = Some(DEFAULT_MAX_TIME);
        }
        stop
    }

    /// Checks the limits in order time, packets, bytes.
    pub fn reached(&self, session: &Session) -> Option<StopReason> {
        if !session.is_started() {
            return None;
        }
        if let Some(max_time) = self.max_time {
            if u128::from(session.elapsed_us()) >= max_time.as_micros() {
                return Some(StopReason::Time);
            }
        }
        if let Some(max_packets) = self.max_packets {
            if session.packets_seen() >= max_packets {
                return Some(StopReason::Packets);
            }
        }
        if let Some(max_bytes) = self.max_bytes {
            if session.bytes() >= max_bytes {
                return Some(StopReason::Bytes);
            }
        }
        None
    }
}
