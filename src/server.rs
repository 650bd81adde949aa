use crate::config::Config;
use crate::measurements::{Observation, Session, StopConditions};
use crate::protocol::send_termination;
use crate::report::Report;
use crate::udp_packet::{timestamp_micros, PacketHeader};
use crate::{Error, Result};
use log::{debug, info, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpSocket, UdpSocket};

/// Receive buffer size, larger than any datagram the client can produce.
const RECV_BUFFER_SIZE: usize = 1 << 17;

/// Datagram stream receiver and measurement endpoint.
///
/// The `Server` binds a UDP socket and a TCP listener on the same port,
/// accepts a single control connection, and measures the datagram stream
/// until one of its stop conditions is met. It then tells the client to stop
/// and returns the aggregate [`Report`].
///
/// Only one client is served per run, and the accept has no timeout.
///
/// # Examples
///
/// ```no_run
/// use udp_perf::{Config, Server};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::server(5000).with_max_packets(10_000);
/// let server = Server::bind(config).await?;
///
/// let report = server.run().await?;
/// println!("{}", report.concise());
/// # Ok(())
/// # }
/// ```
pub struct Server {
    listener: TcpListener,
    socket: UdpSocket,
    stop: StopConditions,
}

impl Server {
    /// Binds the control listener and the datagram socket.
    ///
    /// With port 0 the datagram socket takes the port the listener obtained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Socket`] if either socket cannot be bound.
    pub async fn bind(config: Config) -> Result<Self> {
        config.validate()?;
        let stop = StopConditions::from_config(&config);
        let ip = config
            .bind_addr
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let addr = SocketAddr::new(ip, config.port);

        let tcp = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(Error::socket("socket"))?;
        tcp.set_reuseaddr(true)
            .map_err(Error::socket("setsockopt"))?;
        tcp.bind(addr).map_err(Error::socket("bind"))?;
        let listener = tcp.listen(1).map_err(Error::socket("listen"))?;

        let port = listener
            .local_addr()
            .map_err(Error::socket("bind"))?
            .port();
        let socket = UdpSocket::bind(SocketAddr::new(ip, port))
            .await
            .map_err(Error::socket("bind"))?;

        info!("Listening on {}:{} (udp + tcp), stopping on {:?}", ip, port, stop);

        Ok(Self {
            listener,
            socket,
            stop,
        })
    }

    /// Address shared by the listener and the datagram socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Error::socket("bind"))
    }

    /// Accepts the control connection and measures until a stop condition fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Socket`] on accept, receive or control send failure.
    /// Size mismatches and reordering are not errors; they are counted in the
    /// report.
    pub async fn run(self) -> Result<Report> {
        let Server {
            listener,
            socket,
            stop,
        } = self;

        let (mut control, peer) = listener.accept().await.map_err(Error::socket("accept"))?;
        info!("Control connection from {}", peer);

        let mut session = Session::new();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        let reason = loop {
            let (len, from) = socket
                .recv_from(&mut buf)
                .await
                .map_err(Error::socket("recvfrom"))?;
            let now = timestamp_micros();
            let header = PacketHeader::decode(&buf[..len]);

            match session.observe(len, header, now) {
                Observation::WarmUp => {
                    info!("Warm-up packet of {} bytes from {}", len, from);
                    continue;
                }
                Observation::Accepted => {}
                Observation::OutOfOrder => {
                    warn!(
                        "Packet received out of order (timestamp {:?}, sequence {:?})",
                        header.timestamp_us, header.sequence
                    );
                }
                Observation::SizeMismatch { expected, actual } => {
                    warn!(
                        "Received packet of invalid size {} (expected {})",
                        actual, expected
                    );
                }
            }

            if let Some(reason) = stop.reached(&session) {
                break reason;
            }
        };

        info!(
            "Stop condition {:?} reached after {} packets in {} us",
            reason,
            session.packets_seen(),
            session.elapsed_us()
        );
        if session.clock_skew() > 0 {
            warn!(
                "{} packets carried a timestamp ahead of the local clock",
                session.clock_skew()
            );
        }

        send_termination(&mut control).await?;
        if let Err(e) = control.shutdown().await {
            debug!("Control shutdown failed: {}", e);
        }
        drop(control);
        drop(listener);
        drop(socket);
        debug!("Sockets closed");

        Ok(session.report())
    }
}
