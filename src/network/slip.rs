//! SLIP framing (RFC 1055) for byte-stream links
//!
//! Wire format: `[escaped packet bytes][END]`. Inside a packet `END` is sent
//! as `ESC ESC_END` and `ESC` as `ESC ESC_ESC`.

use bytes::Bytes;

pub const END: u8 = 0xC0;
pub const ESC: u8 = 0xDB;
pub const ESC_END: u8 = 0xDC;
pub const ESC_ESC: u8 = 0xDD;

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlipState {
    Idle,
    Escaped,
}

/// Streaming SLIP decoder.
///
/// Accepts arbitrarily chunked input and hands out complete packets. A bad
/// escape sequence taints the packet in progress, which is then dropped at
/// the next `END` instead of being delivered or merged with its neighbour.
pub struct SlipDecoder {
    state: SlipState,
    buffer: Vec<u8>,
    discard: bool,
    max_packet_size: usize,
    /// Packets delivered
    packets_decoded: u64,
    /// Packets dropped because of bad escapes or excessive size
    packets_discarded: u64,
}

impl SlipDecoder {
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            state: SlipState::Idle,
            buffer: Vec::with_capacity(max_packet_size.min(4096)),
            discard: false,
            max_packet_size,
            packets_decoded: 0,
            packets_discarded: 0,
        }
    }

    pub fn state(&self) -> SlipState {
        self.state
    }

    /// Feed one byte; returns a packet when this byte completed one
    pub fn push_byte(&mut self, byte: u8) -> Option<Bytes> {
        match self.state {
            SlipState::Escaped => {
                let mapped = match byte {
                    ESC_END => END,
                    ESC_ESC => ESC,
                    other => {
                        self.discard = true;
                        other
                    }
                };
                self.append(mapped);
                self.state = SlipState::Idle;
                None
            }
            SlipState::Idle => match byte {
                END => self.finish_packet(),
                ESC => {
                    self.state = SlipState::Escaped;
                    None
                }
                other => {
                    self.append(other);
                    None
                }
            },
        }
    }

    /// Feed a chunk of bytes, calling `on_packet` for every completed packet
    pub fn decode(&mut self, chunk: &[u8], mut on_packet: impl FnMut(Bytes)) {
        for &byte in chunk {
            if let Some(packet) = self.push_byte(byte) {
                on_packet(packet);
            }
        }
    }

    fn append(&mut self, byte: u8) {
        if self.buffer.len() >= self.max_packet_size {
            self.discard = true;
            return;
        }
        self.buffer.push(byte);
    }

    fn finish_packet(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() && !self.discard {
            return None;
        }
        if self.discard {
            tracing::debug!(len = self.buffer.len(), "Dropping corrupted SLIP packet");
            self.buffer.clear();
            self.discard = false;
            self.packets_discarded += 1;
            return None;
        }
        self.packets_decoded += 1;
        let packet = Bytes::copy_from_slice(&self.buffer);
        self.buffer.clear();
        Some(packet)
    }

    /// Forget any partial packet, e.g. after a link reset
    pub fn reset(&mut self) {
        self.state = SlipState::Idle;
        self.buffer.clear();
        self.discard = false;
    }

    pub fn stats(&self) -> SlipStats {
        SlipStats {
            packets_decoded: self.packets_decoded,
            packets_discarded: self.packets_discarded,
        }
    }
}

/// Decoder statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlipStats {
    pub packets_decoded: u64,
    pub packets_discarded: u64,
}

/// Append the SLIP encoding of `packet` (terminated by `END`) to `out`
pub fn encode(packet: &[u8], out: &mut Vec<u8>) {
    out.reserve(packet.len() + 2);
    for &byte in packet {
        match byte {
            END => out.extend_from_slice(&[ESC, ESC_END]),
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            other => out.push(other),
        }
    }
    out.push(END);
}
