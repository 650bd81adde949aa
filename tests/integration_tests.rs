use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use udp_perf::protocol::TERMINATION_MAGIC;
use udp_perf::udp_packet::{timestamp_micros, PacketHeader, PROTOCOL_OVERHEAD};
use udp_perf::{Client, Config, Server};

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

async fn bind_server(config: Config) -> (Server, SocketAddr) {
    let server = Server::bind(config.with_bind_addr(LOOPBACK)).await.unwrap();
    let addr = server.local_addr().unwrap();
    (server, addr)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_packet_limit() {
    let (server, addr) = bind_server(Config::server(0).with_max_packets(100)).await;
    let server = tokio::spawn(server.run());

    let config = Config::client("127.0.0.1".to_string(), addr.port()).with_packet_size(1500);
    let client = Client::new(config).unwrap();
    let sent = timeout(Duration::from_secs(10), client.run())
        .await
        .expect("client did not stop")
        .expect("client failed");

    let report = timeout(Duration::from_secs(10), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(sent >= 101);
    assert_eq!(report.packets_received, 100);
    assert_eq!(report.errors, 0);
    assert_eq!(report.packet_size, 1500);
    assert_eq!(report.payload_size, (1500 - PROTOCOL_OVERHEAD) as u64);
    assert_eq!(report.bytes_received, 100 * 1500);
    assert!(report.min_delay_us.is_some());
    assert!(report.min_delay_us <= report.avg_delay_us);
    assert!(report.avg_delay_us <= report.max_delay_us);

    let line = report.concise().to_string();
    assert!(line.contains("prx:100 "));
    assert!(line.contains("err:0 "));
}

#[tokio::test]
async fn test_server_stops_after_packet_limit() {
    let (server, addr) = bind_server(Config::server(0).with_max_packets(5)).await;
    let server = tokio::spawn(server.run());

    let mut control = TcpStream::connect(addr).await.unwrap();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // warm-up + 5 measured + 2 that must be ignored
    let base = timestamp_micros() - 1_000;
    let mut payload = vec![0u8; 64];
    for seq in 0..8u64 {
        PacketHeader::new(base + seq, seq).write_to(&mut payload);
        socket.send_to(&payload, addr).await.unwrap();
    }

    let report = timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(report.packets_received, 5);
    assert_eq!(report.errors, 0);
    assert_eq!(report.payload_size, 64);

    let mut received = Vec::new();
    timeout(Duration::from_secs(5), control.read_to_end(&mut received))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, TERMINATION_MAGIC.to_le_bytes());
}

#[tokio::test]
async fn test_server_counts_data_quality_errors() {
    let (server, addr) = bind_server(Config::server(0).with_max_packets(4)).await;
    let server = tokio::spawn(server.run());

    let _control = TcpStream::connect(addr).await.unwrap();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let base = timestamp_micros() - 1_000;

    let packet = |len: usize, ts: u64, seq: u64| {
        let mut payload = vec![0u8; len];
        PacketHeader::new(ts, seq).write_to(&mut payload);
        payload
    };

    for payload in [
        packet(32, base, 0),
        packet(32, base + 10, 1),
        packet(48, base + 20, 2),
        packet(32, base + 5, 3),
        packet(32, base + 30, 4),
    ] {
        socket.send_to(&payload, addr).await.unwrap();
    }

    let report = timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // one size mismatch, one timestamp regression
    assert_eq!(report.errors, 2);
    assert_eq!(report.packets_received, 3);
    assert_eq!(report.bytes_received, 3 * (32 + PROTOCOL_OVERHEAD) as u64);
}

#[tokio::test]
async fn test_client_rejects_small_packets_without_network() {
    // Nothing listens on this port; a socket attempt would surface as an I/O error.
    let config = Config::client("127.0.0.1".to_string(), 9).with_packet_size(PROTOCOL_OVERHEAD - 1);
    let result = Client::new(config);

    assert!(matches!(result, Err(udp_perf::Error::Config(_))));
}
