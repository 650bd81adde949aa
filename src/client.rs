use crate::config::Config;
use crate::protocol::poll_termination;
use crate::udp_packet::{timestamp_micros, PacketHeader};
use crate::{Error, Result};
use log::info;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{lookup_host, TcpStream, UdpSocket};

/// Datagram stream transmitter.
///
/// The `Client` connects the control channel to the server, then sends
/// datagrams of the configured size as fast as the socket accepts them, each
/// stamped with the send time and a sequence number. Before every datagram it
/// checks the control channel; the server's termination message ends the run.
///
/// There is no rate limiting and no timeout: if the server never sends the
/// termination message the client keeps sending.
///
/// # Examples
///
/// ```no_run
/// use udp_perf::{Client, Config};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::client("192.168.1.100".to_string(), 5000)
///     .with_packet_size(1500);
///
/// let sent = Client::new(config)?.run().await?;
/// println!("{} datagrams sent", sent);
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: Config,
    payload_size: usize,
}

impl Client {
    /// Creates a new client with the given configuration.
    ///
    /// No socket is opened here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration has no server address or
    /// a packet size below the protocol overhead.
    ///
    /// # Examples
    ///
    /// ```
    /// use udp_perf::{Client, Config};
    ///
    /// let config = Config::client("127.0.0.1".to_string(), 5000).with_packet_size(10);
    /// assert!(Client::new(config).is_err());
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let payload_size = config.payload_size().ok_or_else(|| {
            Error::Config(format!("Packet size {} is too small", config.packet_size))
        })?;

        Ok(Self {
            config,
            payload_size,
        })
    }

    /// Payload bytes per datagram.
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// Runs the transmitter until the server signals termination.
    ///
    /// Returns the number of datagrams handed to the socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Socket`] for any socket failure, and [`Error::Protocol`] for an invalid control
    /// message or a control connection closed by the server.
    pub async fn run(&self) -> Result<u64> {
        let target = self.resolve().await?;

        let mut control = TcpStream::connect(target)
            .await
            .map_err(Error::socket("connect"))?;
        info!("Control connection established to {}", target);

        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await.map_err(Error::socket("bind"))?;
        info!(
            "Sending {}-byte payloads from {} to {}",
            self.payload_size,
            socket.local_addr().map_err(Error::socket("bind"))?,
            target
        );

        let mut payload = vec![0u8; self.payload_size];
        let mut sequence = 0u64;
        let mut last_timestamp = 0u64;
        let mut sent = 0u64;

        loop {
            if poll_termination(&mut control).await? {
                info!("Termination requested by server after {} datagrams", sent);
                break;
            }

            // Strictly increasing so that equal clock readings never look reordered.
            let timestamp = timestamp_micros().max(last_timestamp + 1);
            last_timestamp = timestamp;
            PacketHeader::new(timestamp, sequence).write_to(&mut payload);

            // tokio waits out a full send buffer itself; any error here is fatal.
            socket
                .send_to(&payload, target)
                .await
                .map_err(Error::socket("sendto"))?;
            sent += 1;

            sequence += 1;
        }

        drop(control);
        drop(socket);
        Ok(sent)
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        let host = self
            .config
            .server_addr
            .as_deref()
            .ok_or_else(|| Error::Config("Server address not set".to_string()))?;

        lookup_host((host, self.config.port))
            .await
            .map_err(Error::socket("lookup"))?
            .next()
            .ok_or_else(|| Error::Config(format!("No address found for {}", host)))
    }
}
