//! UDP datagram transport
//!
//! Datagrams already delimit packets, so connectors over UDP normally run
//! with SLIP disabled.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};

use crate::error::NetworkError;
use crate::network::transport::ByteTransport;

/// Create a non-blocking UDP socket bound to `bind_addr`
pub fn create_socket(bind_addr: SocketAddr) -> Result<UdpSocket, NetworkError> {
    let domain = if bind_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::BindFailed(format!("socket: {}", e)))?;

    socket
        .set_reuse_address(true)
        .map_err(|e| NetworkError::BindFailed(format!("SO_REUSEADDR: {}", e)))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| NetworkError::BindFailed(format!("non-blocking: {}", e)))?;
    socket
        .bind(&bind_addr.into())
        .map_err(|e| NetworkError::BindFailed(format!("{}: {}", bind_addr, e)))?;

    Ok(socket.into())
}

/// UDP transport.
///
/// With a fixed peer, everything is sent there. Without one, replies go to
/// whoever sent the most recent datagram (nothing is sent before the first
/// datagram arrives).
pub struct UdpTransport {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    follow_sender: bool,
    send_errors: u64,
}

impl UdpTransport {
    pub fn bind(bind_addr: SocketAddr, peer: Option<SocketAddr>) -> Result<Self, NetworkError> {
        let socket = create_socket(bind_addr)?;
        tracing::info!(bind = %bind_addr, peer = ?peer, "UDP transport bound");
        Ok(Self {
            socket,
            follow_sender: peer.is_none(),
            peer,
            send_errors: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn send_errors(&self) -> u64 {
        self.send_errors
    }
}

impl ByteTransport for UdpTransport {
    fn write(&mut self, data: &[u8]) {
        let Some(peer) = self.peer else {
            tracing::trace!("No UDP peer yet, dropping {} bytes", data.len());
            return;
        };
        if let Err(e) = self.socket.send_to(data, peer) {
            self.send_errors += 1;
            if e.kind() != io::ErrorKind::WouldBlock {
                tracing::warn!(peer = %peer, "UDP send failed: {}", e);
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        match self.socket.recv_from(buf) {
            Ok((n, from)) => {
                if self.follow_sender && self.peer != Some(from) {
                    tracing::info!(peer = %from, "UDP peer changed");
                    self.peer = Some(from);
                }
                n
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
            Err(e) => {
                tracing::debug!("UDP receive failed: {}", e);
                0
            }
        }
    }

    fn describe(&self) -> String {
        match (self.socket.local_addr(), self.peer) {
            (Ok(local), Some(peer)) => format!("udp {} -> {}", local, peer),
            (Ok(local), None) => format!("udp {}", local),
            _ => "udp".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn read_with_timeout(transport: &mut UdpTransport, buf: &mut [u8]) -> usize {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            let n = transport.read(buf);
            if n > 0 {
                return n;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        0
    }

    #[test]
    fn test_datagram_exchange_and_reply_to_sender() {
        let mut server = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), None).unwrap();
        let server_addr = server.local_addr().unwrap();
        let mut client =
            UdpTransport::bind("127.0.0.1:0".parse().unwrap(), Some(server_addr)).unwrap();

        // Server has no peer yet: writes are dropped, not errors
        server.write(b"lost");

        client.write(b"ping");
        let mut buf = [0u8; 64];
        let n = read_with_timeout(&mut server, &mut buf);
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(server.peer(), Some(client.local_addr().unwrap()));

        server.write(b"pong");
        let n = read_with_timeout(&mut client, &mut buf);
        assert_eq!(&buf[..n], b"pong");
    }

    #[test]
    fn test_read_without_data_returns_zero() {
        let mut transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), None).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(transport.read(&mut buf), 0);
    }
}
