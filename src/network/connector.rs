//! OSC connectors
//!
//! A connector turns a [`ByteTransport`] into a stream of OSC packets. On
//! stream links it runs SLIP framing; on links with native message
//! boundaries every received chunk is taken as one packet.

use bytes::Bytes;

use crate::constants::MAX_PACKET_SIZE;
use crate::network::slip::{self, SlipDecoder, SlipStats};
use crate::network::transport::ByteTransport;

/// Handle identifying a connector registered with a root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectorId(pub u32);

/// Packet-level view of a link, as seen by the root
pub trait Connector {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Send one complete OSC packet
    fn send_osc_message(&mut self, packet: &[u8]);

    /// Read whatever the transport has buffered and hand every complete
    /// packet to `on_packet`. Never blocks.
    fn poll_packets(&mut self, on_packet: &mut dyn FnMut(Bytes));
}

/// Connector statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectorStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub frames_discarded: u64,
}

/// Connector over any byte transport
pub struct OscConnector<T: ByteTransport> {
    name: String,
    transport: T,
    use_slip: bool,
    decoder: SlipDecoder,
    /// SLIP output buffer (reused to avoid allocations)
    output_buffer: Vec<u8>,
    /// Transport read buffer
    read_buffer: Box<[u8]>,
    packets_sent: u64,
    bytes_sent: u64,
    packets_received: u64,
    bytes_received: u64,
}

impl<T: ByteTransport> OscConnector<T> {
    pub fn new(name: impl Into<String>, transport: T, use_slip: bool) -> Self {
        let name = name.into();
        tracing::debug!(connector = %name, transport = %transport.describe(), use_slip, "Connector created");
        Self {
            name,
            transport,
            use_slip,
            decoder: SlipDecoder::new(MAX_PACKET_SIZE),
            output_buffer: Vec::with_capacity(MAX_PACKET_SIZE),
            read_buffer: vec![0u8; MAX_PACKET_SIZE].into_boxed_slice(),
            packets_sent: 0,
            bytes_sent: 0,
            packets_received: 0,
            bytes_received: 0,
        }
    }

    /// Connector over a byte stream, with SLIP framing
    pub fn stream(name: impl Into<String>, transport: T) -> Self {
        Self::new(name, transport, true)
    }

    /// Connector over a datagram link, one packet per received chunk
    pub fn datagram(name: impl Into<String>, transport: T) -> Self {
        Self::new(name, transport, false)
    }

    pub fn uses_slip(&self) -> bool {
        self.use_slip
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn slip_stats(&self) -> SlipStats {
        self.decoder.stats()
    }

    pub fn stats(&self) -> ConnectorStats {
        ConnectorStats {
            packets_sent: self.packets_sent,
            bytes_sent: self.bytes_sent,
            packets_received: self.packets_received,
            bytes_received: self.bytes_received,
            frames_discarded: self.decoder.stats().packets_discarded,
        }
    }
}

impl<T: ByteTransport> Connector for OscConnector<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_osc_message(&mut self, packet: &[u8]) {
        if packet.is_empty() {
            return;
        }
        self.packets_sent += 1;
        if self.use_slip {
            self.output_buffer.clear();
            slip::encode(packet, &mut self.output_buffer);
            self.bytes_sent += self.output_buffer.len() as u64;
            self.transport.write(&self.output_buffer);
        } else {
            self.bytes_sent += packet.len() as u64;
            self.transport.write(packet);
        }
    }

    fn poll_packets(&mut self, on_packet: &mut dyn FnMut(Bytes)) {
        loop {
            let n = self.transport.read(&mut self.read_buffer);
            if n == 0 {
                break;
            }
            self.bytes_received += n as u64;

            let chunk = &self.read_buffer[..n];
            if self.use_slip {
                let received = &mut self.packets_received;
                self.decoder.decode(chunk, |packet| {
                    *received += 1;
                    on_packet(packet);
                });
            } else {
                self.packets_received += 1;
                on_packet(Bytes::copy_from_slice(chunk));
            }
        }
    }
}
