//! Fixed-capacity byte ring bridging the real-time capture callback to a
//! blocking consumer.
//!
//! The write side never blocks beyond the critical section: a chunk that
//! does not fit is dropped whole. The read side blocks on a condvar until
//! the full requested count is available; partial reads are not offered.
//! Cursors wrap independently and at most `capacity - 1` bytes are stored
//! so that empty and full are never ambiguous.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use voxloop_foundation::AudioError;

struct RingState {
    storage: Box<[u8]>,
    write_pos: usize,
    read_pos: usize,
    closed: bool,
}

impl RingState {
    fn available(&self) -> usize {
        if self.write_pos >= self.read_pos {
            self.write_pos - self.read_pos
        } else {
            self.write_pos + self.storage.len() - self.read_pos
        }
    }

    fn free(&self) -> usize {
        self.storage.len() - 1 - self.available()
    }
}

struct RingShared {
    state: Mutex<RingState>,
    readable: Condvar,
}

impl RingShared {
    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.readable.notify_all();
    }
}

/// Ring buffer constructor; `with_capacity` yields the two halves.
pub struct ByteRing;

impl ByteRing {
    /// Create a ring holding up to `capacity - 1` bytes.
    pub fn with_capacity(capacity: usize) -> (ChunkWriter, BlockingReader) {
        assert!(capacity > 1, "ring capacity must exceed one byte");
        let shared = Arc::new(RingShared {
            state: Mutex::new(RingState {
                storage: vec![0u8; capacity].into_boxed_slice(),
                write_pos: 0,
                read_pos: 0,
                closed: false,
            }),
            readable: Condvar::new(),
        });
        (
            ChunkWriter {
                shared: shared.clone(),
            },
            BlockingReader { shared },
        )
    }
}

/// Producer half, owned by the capture callback.
pub struct ChunkWriter {
    shared: Arc<RingShared>,
}

impl ChunkWriter {
    /// Append a whole chunk, or drop it if it does not fit.
    pub fn write(&self, bytes: &[u8]) -> Result<(), AudioError> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(AudioError::StreamClosed);
        }
        if bytes.len() > state.free() {
            drop(state);
            warn!(len = bytes.len(), "capture ring full, dropping chunk");
            return Err(AudioError::BufferOverflow { count: bytes.len() });
        }

        let capacity = state.storage.len();
        let write_pos = state.write_pos;
        let first = (capacity - write_pos).min(bytes.len());
        state.storage[write_pos..write_pos + first].copy_from_slice(&bytes[..first]);
        if first < bytes.len() {
            let rest = bytes.len() - first;
            state.storage[..rest].copy_from_slice(&bytes[first..]);
        }
        state.write_pos = (write_pos + bytes.len()) % capacity;
        drop(state);

        self.shared.readable.notify_one();
        Ok(())
    }

    /// Mark the stream closed and wake any blocked reader.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl Drop for ChunkWriter {
    fn drop(&mut self) {
        // A dropped producer means no more data will ever arrive; readers
        // must not stay blocked.
        self.shared.close();
    }
}

/// Consumer half; reads block until the full request is satisfied.
pub struct BlockingReader {
    shared: Arc<RingShared>,
}

impl BlockingReader {
    /// Fill `buf` completely, blocking until enough bytes were written.
    ///
    /// After `close()` the remaining buffered bytes can still be drained
    /// in full reads; once fewer than `buf.len()` remain this returns
    /// `AudioError::StreamClosed`.
    pub fn read_exact(&self, buf: &mut [u8]) -> Result<(), AudioError> {
        let mut state = self.shared.state.lock();
        assert!(
            buf.len() < state.storage.len(),
            "read of {} bytes can never be satisfied by a ring holding at most {}",
            buf.len(),
            state.storage.len() - 1
        );
        while state.available() < buf.len() {
            if state.closed {
                return Err(AudioError::StreamClosed);
            }
            self.shared.readable.wait(&mut state);
        }

        let capacity = state.storage.len();
        let read_pos = state.read_pos;
        let first = (capacity - read_pos).min(buf.len());
        buf[..first].copy_from_slice(&state.storage[read_pos..read_pos + first]);
        if first < buf.len() {
            let rest = buf.len() - first;
            buf[first..].copy_from_slice(&state.storage[..rest]);
        }
        state.read_pos = (read_pos + buf.len()) % capacity;
        Ok(())
    }

    /// Bytes currently buffered.
    pub fn available(&self) -> usize {
        self.shared.state.lock().available()
    }

    /// Handle that can close the ring from another owner (teardown path).
    pub fn closer(&self) -> RingCloser {
        RingCloser {
            shared: self.shared.clone(),
        }
    }
}

/// Cloneable close handle; closing wakes blocked readers.
#[derive(Clone)]
pub struct RingCloser {
    shared: Arc<RingShared>,
}

impl RingCloser {
    pub fn close(&self) {
        self.shared.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let (writer, reader) = ByteRing::with_capacity(64);
        writer.write(&[1, 2, 3, 4]).unwrap();
        writer.write(&[5, 6]).unwrap();

        let mut buf = [0u8; 6];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn reads_need_not_align_with_written_chunks() {
        let (writer, reader) = ByteRing::with_capacity(64);
        writer.write(&[10, 11, 12, 13, 14]).unwrap();

        let mut head = [0u8; 2];
        reader.read_exact(&mut head).unwrap();
        assert_eq!(head, [10, 11]);

        let mut tail = [0u8; 3];
        reader.read_exact(&mut tail).unwrap();
        assert_eq!(tail, [12, 13, 14]);
    }

    #[test]
    fn fifo_survives_wraparound() {
        let (writer, reader) = ByteRing::with_capacity(8);
        let mut expected = Vec::new();
        let mut next = 0u8;

        // Push far more than capacity through the ring in small chunks.
        for _ in 0..50 {
            let chunk: Vec<u8> = (0..3).map(|i| next.wrapping_add(i)).collect();
            next = next.wrapping_add(3);
            writer.write(&chunk).unwrap();
            expected.extend_from_slice(&chunk);

            let mut buf = [0u8; 3];
            reader.read_exact(&mut buf).unwrap();
            assert_eq!(&buf[..], &expected[expected.len() - 3..]);
        }
    }

    #[test]
    fn stores_at_most_capacity_minus_one() {
        let (writer, reader) = ByteRing::with_capacity(8);
        writer.write(&[0; 7]).unwrap();
        assert_eq!(reader.available(), 7);
        // One more byte would make full indistinguishable from empty.
        assert!(matches!(
            writer.write(&[9]),
            Err(AudioError::BufferOverflow { count: 1 })
        ));
        assert_eq!(reader.available(), 7);
    }

    #[test]
    fn oversized_chunk_is_dropped_whole() {
        let (writer, reader) = ByteRing::with_capacity(8);
        writer.write(&[1, 2, 3]).unwrap();
        assert!(writer.write(&[0; 6]).is_err());

        // The earlier data is untouched.
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn read_blocks_until_enough_bytes() {
        let (writer, reader) = ByteRing::with_capacity(64);
        writer.write(&[1, 2]).unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf).unwrap();
            buf
        });

        // The reader cannot finish on two bytes; give it a moment to block.
        std::thread::sleep(std::time::Duration::from_millis(50));
        writer.write(&[3, 4]).unwrap();

        assert_eq!(handle.join().unwrap(), [1, 2, 3, 4]);
    }

    #[test]
    fn close_unblocks_a_waiting_reader() {
        let (writer, reader) = ByteRing::with_capacity(64);
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)
        });

        std::thread::sleep(std::time::Duration::from_millis(50));
        writer.close();

        assert!(matches!(
            handle.join().unwrap(),
            Err(AudioError::StreamClosed)
        ));
    }

    #[test]
    fn buffered_bytes_drain_after_close() {
        let (writer, reader) = ByteRing::with_capacity(64);
        writer.write(&[1, 2, 3, 4]).unwrap();
        writer.close();

        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);

        assert!(matches!(
            reader.read_exact(&mut buf),
            Err(AudioError::StreamClosed)
        ));
    }

    #[test]
    #[should_panic(expected = "can never be satisfied")]
    fn oversized_read_panics_instead_of_blocking_forever() {
        let (_writer, reader) = ByteRing::with_capacity(8);
        let mut buf = [0u8; 8];
        let _ = reader.read_exact(&mut buf);
    }

    #[test]
    fn dropping_the_writer_closes_the_ring() {
        let (writer, reader) = ByteRing::with_capacity(64);
        drop(writer);
        let mut buf = [0u8; 1];
        assert!(matches!(
            reader.read_exact(&mut buf),
            Err(AudioError::StreamClosed)
        ));
    }
}
