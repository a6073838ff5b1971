//! Lock-free ring buffer carrying interleaved samples between callbacks
//!
//! Single producer (the capture callback), single consumer (the playback
//! callback). The buffer is split into two owned halves at construction so
//! each side can be moved into its own closure; the SPSC discipline is
//! what makes the unsafe cell accesses sound.
//!
//! Performance characteristics:
//! - Wait-free for both sides
//! - Cache-padded positions to prevent false sharing between cores
//! - No allocations after construction

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct RingInner {
    /// Sample storage; capacity is a power of 2 for mask indexing
    buffer: Box<[UnsafeCell<f32>]>,
    mask: usize,
    write_pos: CachePadded<AtomicUsize>,
    read_pos: CachePadded<AtomicUsize>,
}

// SAFETY: a cell is written only by the single producer at indices the
// consumer has not yet claimed, and read only by the single consumer at
// indices the producer has published with release ordering. The two
// halves below each hold `&mut self` methods, so neither side can be
// used concurrently with itself.
unsafe impl Send for RingInner {}
unsafe impl Sync for RingInner {}

impl RingInner {
    /// Space left for the producer; one slot stays empty to distinguish
    /// full from empty.
    fn available_write(&self, write_pos: usize, read_pos: usize) -> usize {
        self.buffer.len() - write_pos.wrapping_sub(read_pos) - 1
    }

    fn available_read(&self, read_pos: usize, write_pos: usize) -> usize {
        write_pos.wrapping_sub(read_pos)
    }
}

/// Producer half of the ring. Owned by the capture callback.
pub struct RingProducer {
    inner: Arc<RingInner>,
}

/// Consumer half of the ring. Owned by the playback callback.
pub struct RingConsumer {
    inner: Arc<RingInner>,
}

/// Create a ring with at least `min_capacity` samples of storage,
/// rounded up to the next power of 2.
pub fn spsc_ring(min_capacity: usize) -> (RingProducer, RingConsumer) {
    let capacity = min_capacity.max(2).next_power_of_two();

    let inner = Arc::new(RingInner {
        buffer: (0..capacity).map(|_| UnsafeCell::new(0.0)).collect(),
        mask: capacity - 1,
        write_pos: CachePadded::new(AtomicUsize::new(0)),
        read_pos: CachePadded::new(AtomicUsize::new(0)),
    });

    (
        RingProducer { inner: Arc::clone(&inner) },
        RingConsumer { inner },
    )
}

impl RingProducer {
    /// Write samples, returning how many fit. Wait-free.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let write_pos = self.inner.write_pos.load(Ordering::Relaxed);
        let read_pos = self.inner.read_pos.load(Ordering::Acquire);

        let available = self.inner.available_write(write_pos, read_pos);
        let to_write = samples.len().min(available);

        for (i, sample) in samples[..to_write].iter().enumerate() {
            let pos = write_pos.wrapping_add(i) & self.inner.mask;
            // SAFETY: slots in [write_pos, write_pos + available) belong
            // to the producer until published below.
            unsafe { *self.inner.buffer[pos].get() = *sample };
        }

        self.inner
            .write_pos
            .store(write_pos.wrapping_add(to_write), Ordering::Release);

        to_write
    }

    pub fn available(&self) -> usize {
        let write_pos = self.inner.write_pos.load(Ordering::Relaxed);
        let read_pos = self.inner.read_pos.load(Ordering::Acquire);
        self.inner.available_write(write_pos, read_pos)
    }
}

impl RingConsumer {
    /// Read up to `out.len()` samples, returning how many were available.
    /// Wait-free.
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let read_pos = self.inner.read_pos.load(Ordering::Relaxed);
        let write_pos = self.inner.write_pos.load(Ordering::Acquire);

        let available = self.inner.available_read(read_pos, write_pos);
        let to_read = out.len().min(available);

        for (i, slot) in out[..to_read].iter_mut().enumerate() {
            let pos = read_pos.wrapping_add(i) & self.inner.mask;
            // SAFETY: slots in [read_pos, write_pos) were published by the
            // producer's release store and are not rewritten until the
            // store below hands them back.
            *slot = unsafe { *self.inner.buffer[pos].get() };
        }

        self.inner
            .read_pos
            .store(read_pos.wrapping_add(to_read), Ordering::Release);

        to_read
    }

    pub fn available(&self) -> usize {
        let read_pos = self.inner.read_pos.load(Ordering::Relaxed);
        let write_pos = self.inner.write_pos.load(Ordering::Acquire);
        self.inner.available_read(read_pos, write_pos)
    }

    pub fn capacity(&self) -> usize {
        self.inner.buffer.len()
    }
}
