use crate::udp_packet::PROTOCOL_OVERHEAD;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Port used by both roles when none is given.
pub const DEFAULT_PORT: u16 = 5000;

/// Destination used by the client when no host is given.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Configured packet size in bytes, protocol overhead included.
pub const DEFAULT_PACKET_SIZE: usize = 1500;

/// Time limit applied by the server when no stop condition is configured.
pub const DEFAULT_MAX_TIME: Duration = Duration::from_secs(10);

/// Test mode: client or server.
///
/// The client transmits the datagram stream, the server receives and measures it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Server mode - receives datagrams and reports statistics
    Server,
    /// Client mode - sends datagrams until told to stop
    Client,
}

/// Configuration for a udp-perf run.
///
/// One structure covers both roles; fields that only matter to the other role
/// are ignored. Use the builder methods to customize it.
///
/// # Examples
///
/// ## Client
///
/// ```
/// use udp_perf::Config;
///
/// let config = Config::client("192.168.1.100".to_string(), 5000)
///     .with_packet_size(512);
/// assert_eq!(config.payload_size(), Some(512 - 42));
/// ```
///
/// ## Server stopping after 1000 packets
///
/// ```
/// use udp_perf::Config;
///
/// let config = Config::server(5000)
///     .with_max_packets(1000)
///     .with_verbose(true);
/// assert_eq!(config.max_packets, Some(1000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server mode or client mode
    pub mode: Mode,

    /// Port number, shared by the datagram socket and the control connection
    pub port: u16,

    /// Server address (for client mode)
    pub server_addr: Option<String>,

    /// Bind address (for server mode), all interfaces when unset
    pub bind_addr: Option<IpAddr>,

    /// Packet size in bytes including the accounted protocol overhead (client)
    pub packet_size: usize,

    /// Stop after this much time since the warm-up packet (server)
    pub max_time: Option<Duration>,

    /// Stop after this many packets following the warm-up packet (server)
    pub max_packets: Option<u64>,

    /// Stop after this many accepted bytes (server)
    pub max_bytes: Option<u64>,

    /// Verbose report format (server)
    pub verbose: bool,

    /// JSON report format (server)
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Client,
            port: DEFAULT_PORT,
            server_addr: None,
            bind_addr: None,
            packet_size: DEFAULT_PACKET_SIZE,
            max_time: None,
            max_packets: None,
            max_bytes: None,
            verbose: false,
            json: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values (client mode, no host).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new server configuration listening on `port`.
    ///
    /// # Examples
    ///
    /// ```
    /// use udp_perf::config::{Config, Mode};
    ///
    /// let config = Config::server(5000);
    /// assert_eq!(config.mode, Mode::Server);
    /// ```
    pub fn server(port: u16) -> Self {
        Self {
            mode: Mode::Server,
            port,
            ..Default::default()
        }
    }

    /// Creates a new client configuration sending to `server_addr:port`.
    pub fn client(server_addr: String, port: u16) -> Self {
        Self {
            mode: Mode::Client,
            server_addr: Some(server_addr),
            port,
            ..Default::default()
        }
    }

    /// Sets the address the server binds to.
    pub fn with_bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Sets the packet size, protocol overhead included.
    ///
    /// Values below [`PROTOCOL_OVERHEAD`] are rejected by [`Config::validate`].
    pub fn with_packet_size(mut self, size: usize) -> Self {
        self.packet_size = size;
        self
    }

    /// Sets the elapsed-time stop condition. A zero duration means unlimited.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time).filter(|t| !t.is_zero());
        self
    }

    /// Sets the packet-count stop condition. Zero means unlimited.
    pub fn with_max_packets(mut self, max_packets: u64) -> Self {
        self.max_packets = Some(max_packets).filter(|&n| n > 0);
        self
    }

    /// Sets the byte-count stop condition. Zero means unlimited.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes).filter(|&n| n > 0);
        self
    }

    /// Selects the verbose report format.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Selects the JSON report format.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Payload bytes actually put on the wire, or `None` if the packet size
    /// does not cover the protocol overhead.
    pub fn payload_size(&self) -> Option<usize> {
        self.packet_size.checked_sub(PROTOCOL_OVERHEAD)
    }

    /// Checks the configuration for the role it describes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a client has no server address or a packet
    /// size smaller than the protocol overhead.
    ///
    /// # Examples
    ///
    /// ```
    /// use udp_perf::Config;
    ///
    /// let config = Config::client("127.0.0.1".to_string(), 5000).with_packet_size(20);
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.mode == Mode::Client {
            if self.server_addr.is_none() {
                return Err(Error::Config(
                    "Server address is required for client mode".to_string(),
                ));
            }
            if self.payload_size().is_none() {
                return Err(Error::Config(format!(
                    "Cannot send packets that small: {} bytes (minimum {})",
                    self.packet_size, PROTOCOL_OVERHEAD
                )));
            }
        }
        Ok(())
    }
}
