//! Links that carry OSC packets: SLIP framing, byte transports and the
//! connectors binding them to a root

pub mod connector;
pub mod slip;
pub mod transport;
#[cfg(feature = "udp")]
pub mod udp;

pub use connector::{Connector, ConnectorId, ConnectorStats, OscConnector};
pub use slip::SlipDecoder;
pub use transport::{ring_pair, ByteRing, ByteTransport, RingTransport};
#[cfg(feature = "udp")]
pub use udp::{create_socket, UdpTransport};
