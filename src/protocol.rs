//! Control channel between the server and the client.
//!
//! The control channel is a single TCP connection opened by the client to the
//! server's port. Exactly one message ever crosses it, from server to client:
//! the 8-byte termination value, sent once after the server's stop condition
//! fires. The client checks for it before every datagram it sends.
//!
//! No timeouts are applied to the connection; a peer that never connects or
//! never signals leaves the other side waiting.

use crate::{Error, Result};
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Value the server sends to stop the client.
pub const TERMINATION_MAGIC: u64 = 0xdead_beef;

/// Length in bytes of a control message.
pub const CONTROL_MESSAGE_SIZE: usize = 8;

/// Serializes the termination message.
///
/// # Examples
///
/// ```
/// use udp_perf::protocol::{decode_control_message, encode_termination};
///
/// let bytes = encode_termination();
/// assert!(decode_control_message(bytes).is_ok());
/// ```
pub fn encode_termination() -> [u8; CONTROL_MESSAGE_SIZE] {
    TERMINATION_MAGIC.to_le_bytes()
}

/// Validates a received control message.
///
/// # Errors
///
/// Returns [`Error::Protocol`] for anything other than the termination value.
pub fn decode_control_message(bytes: [u8; CONTROL_MESSAGE_SIZE]) -> Result<()> {
    let value = u64::from_le_bytes(bytes);
    if value == TERMINATION_MAGIC {
        Ok(())
    } else {
        Err(Error::Protocol(format!(
            "Received invalid control message {:#x}",
            value
        )))
    }
}

/// Sends the termination message and flushes it.
pub async fn send_termination(stream: &mut TcpStream) -> Result<()> {
    stream
        .write_all(&encode_termination())
        .await
        .map_err(Error::socket("send"))?;
    stream.flush().await.map_err(Error::socket("send"))?;
    debug!("Termination message sent");
    Ok(())
}

/// Checks the control stream for the termination message without waiting.
///
/// Returns `Ok(false)` when nothing has arrived yet. Once data is pending the
/// full 8-byte message is read (waiting for the rest of a partial message) and
/// validated, returning `Ok(true)` on the termination value.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the message is not the termination value or
/// the server closed the connection, and [`Error::Socket`] on read failure.
pub async fn poll_termination(stream: &mut TcpStream) -> Result<bool> {
    let mut buf = [0u8; CONTROL_MESSAGE_SIZE];

    let n = match stream.try_read(&mut buf) {
        Ok(n) => n,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(false),
        Err(e) => return Err(Error::socket("recv")(e)),
    };

    if n == 0 {
        return Err(Error::Protocol(
            "Control connection closed without termination message".to_string(),
        ));
    }

    if n < CONTROL_MESSAGE_SIZE {
        stream.read_exact(&mut buf[n..]).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Protocol("Truncated control message".to_string())
            } else {
                Error::socket("recv")(e)
            }
        })?;
    }

    decode_control_message(buf)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (server, client)
    }

    /// Retries until the reactor has observed readability.
    async fn poll_until_ready(stream: &mut TcpStream) -> Result<bool> {
        loop {
            stream.readable().await.unwrap();
            match poll_termination(stream).await {
                Ok(false) => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn test_magic_wire_bytes() {
        assert_eq!(encode_termination(), [0xef, 0xbe, 0xad, 0xde, 0, 0, 0, 0]);
    }

    #[test]
    fn test_reject_other_values() {
        let result = decode_control_message(42u64.to_le_bytes());
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_poll_without_data() {
        let (_server, mut client) = connected_pair().await;
        assert!(!poll_termination(&mut client).await.unwrap());
    }

    #[tokio::test]
    async fn test_poll_receives_termination() {
        let (mut server, mut client) = connected_pair().await;
        send_termination(&mut server).await.unwrap();

        assert!(poll_until_ready(&mut client).await.unwrap());
    }

    #[tokio::test]
    async fn test_poll_completes_partial_message() {
        let (mut server, mut client) = connected_pair().await;
        let bytes = encode_termination();

        server.write_all(&bytes[..3]).await.unwrap();
        server.flush().await.unwrap();
        let rest = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            server.write_all(&bytes[3..]).await.unwrap();
            server
        });

        assert!(poll_until_ready(&mut client).await.unwrap());
        rest.await.unwrap();
    }

    #[tokio::test]
    async fn test_poll_rejects_garbage() {
        let (mut server, mut client) = connected_pair().await;
        server.write_all(&7u64.to_le_bytes()).await.unwrap();

        let result = poll_until_ready(&mut client).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_poll_rejects_closed_connection() {
        let (server, mut client) = connected_pair().await;
        drop(server);

        let result = poll_until_ready(&mut client).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }
}
