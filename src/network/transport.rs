//! Byte transports underneath a connector
//!
//! A transport moves raw bytes and knows nothing about OSC or SLIP. Both
//! directions are best effort and never block: writes drop what does not
//! fit, reads return whatever is buffered right now.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Raw byte link (serial port, USB CDC, datagram socket...)
pub trait ByteTransport {
    /// Queue bytes for sending. Silently drops what cannot be buffered.
    fn write(&mut self, data: &[u8]);

    /// Copy up to `buf.len()` buffered bytes into `buf`, returning how many
    /// were copied. Returns 0 when nothing is available.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Fixed-size lock-free byte queue with overflow accounting
pub struct ByteRing {
    queue: ArrayQueue<u8>,
    overflow_count: AtomicUsize,
}

impl ByteRing {
    /// Create a new ring with the specified capacity in bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicUsize::new(0),
        }
    }

    /// Push as many bytes as fit. Returns the number accepted; the rest are
    /// counted as overflow.
    pub fn push_slice(&self, data: &[u8]) -> usize {
        for (i, &byte) in data.iter().enumerate() {
            if self.queue.push(byte).is_err() {
                let dropped = data.len() - i;
                self.overflow_count.fetch_add(dropped, Ordering::Relaxed);
                return i;
            }
        }
        data.len()
    }

    /// Pop up to `buf.len()` bytes
    pub fn pop_into(&self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.queue.pop() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Bytes dropped because the ring was full
    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    pub fn reset_stats(&self) {
        self.overflow_count.store(0, Ordering::Relaxed);
    }
}

/// Thread-safe handle to a byte ring
pub type SharedByteRing = Arc<ByteRing>;

/// One end of an in-memory byte link, the software stand-in for a USB CDC
/// endpoint with its fixed circular buffers.
///
/// Ends are `Send`, so a driver thread can own one while the control thread
/// owns the other.
pub struct RingTransport {
    name: String,
    rx: SharedByteRing,
    tx: SharedByteRing,
}

impl RingTransport {
    /// Bytes this end failed to send because the peer's ring was full
    pub fn dropped_bytes(&self) -> usize {
        self.tx.overflow_count()
    }

    /// Bytes waiting to be read by this end
    pub fn pending_bytes(&self) -> usize {
        self.rx.len()
    }
}

/// Create two connected transport ends, each direction buffered by a ring of
/// `capacity` bytes
pub fn ring_pair(capacity: usize) -> (RingTransport, RingTransport) {
    let a_to_b = Arc::new(ByteRing::new(capacity));
    let b_to_a = Arc::new(ByteRing::new(capacity));
    (
        RingTransport {
            name: "ring-a".to_string(),
            rx: b_to_a.clone(),
            tx: a_to_b.clone(),
        },
        RingTransport {
            name: "ring-b".to_string(),
            rx: a_to_b,
            tx: b_to_a,
        },
    )
}

impl ByteTransport for RingTransport {
    fn write(&mut self, data: &[u8]) {
        let accepted = self.tx.push_slice(data);
        if accepted < data.len() {
            tracing::debug!(
                transport = %self.name,
                dropped = data.len() - accepted,
                "Transmit ring full, dropping bytes"
            );
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.rx.pop_into(buf)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_basic() {
        let ring = ByteRing::new(4);
        assert_eq!(ring.push_slice(&[1, 2, 3]), 3);
        assert_eq!(ring.len(), 3);

        let mut buf = [0u8; 8];
        assert_eq!(ring.pop_into(&mut buf), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_overflow_drops_tail() {
        let ring = ByteRing::new(4);
        assert_eq!(ring.push_slice(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(ring.overflow_count(), 2);

        let mut buf = [0u8; 8];
        assert_eq!(ring.pop_into(&mut buf), 4);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_partial_reads() {
        let (mut a, mut b) = ring_pair(16);
        a.write(b"hello");

        let mut buf = [0u8; 2];
        assert_eq!(b.read(&mut buf), 2);
        assert_eq!(&buf, b"he");
        assert_eq!(b.pending_bytes(), 3);

        let mut rest = [0u8; 8];
        assert_eq!(b.read(&mut rest), 3);
        assert_eq!(&rest[..3], b"llo");
        assert_eq!(b.read(&mut rest), 0);
    }

    #[test]
    fn test_pair_is_bidirectional() {
        let (mut a, mut b) = ring_pair(4);
        b.write(&[9, 8, 7, 6, 5]);
        assert_eq!(b.dropped_bytes(), 1);

        let mut buf = [0u8; 8];
        assert_eq!(a.read(&mut buf), 4);
        assert_eq!(b.read(&mut buf), 0);
    }
}
