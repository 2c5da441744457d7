//! # Mixer OSC Control
//!
//! Parameter tree of a mixing console, addressable and mirrored over OSC.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         CONTROL PROCESS                              │
//! │                                                                      │
//! │   ┌──────────────────────── OscRoot (root) ───────────────────────┐  │
//! │   │                                                               │  │
//! │   │   Tree (tree)                       BroadcastPolicy           │  │
//! │   │   /                                 authority / mirror        │  │
//! │   │   ├── ch1/                                                    │  │
//! │   │   │   ├── eq/0/{enable,type,f0,gain,Q}   ◄── Mixer (mixer)    │  │
//! │   │   │   └── reverb/{enable,delay,gain,reverberators/…}         │  │
//! │   │   └── …                                                       │  │
//! │   │                                                               │  │
//! │   │   pending node config ◄── nodes.json (config, serde_json)     │  │
//! │   └───────────────┬──────────────────────────────▲────────────────┘  │
//! │                   │ encode (codec)               │ decode (codec)    │
//! │                   ▼                              │                   │
//! │   ┌──────────────────────────────────────────────┴────────────────┐  │
//! │   │  OscConnector (network::connector)  SLIP framing (slip)       │  │
//! │   └───────────────┬──────────────────────────────▲────────────────┘  │
//! │                   ▼                              │                   │
//! │   ┌───────────────────────────────────────────────────────────────┐  │
//! │   │  ByteTransport: UdpTransport (udp) / RingTransport (loopback) │  │
//! │   └───────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────┬───────────────────────────────────┘
//!                                    │ OSC over UDP / serial bridge
//!                                    ▼
//!                     peers: control surface, DSP board, other roots
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod mixer;
pub mod network;
pub mod root;
pub mod tree;

pub use error::{Error, Result};
pub use root::{NodeConfig, OscRoot};

/// Application-wide constants
pub mod constants {
    /// Largest OSC packet a connector reassembles or reads in one go
    pub const MAX_PACKET_SIZE: usize = 2048;
}
