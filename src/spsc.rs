/// Lock-free single-producer single-consumer ring queue
///
/// Bounded hand-off between the ingest thread and the consumer thread.
/// Power-of-2 capacity for mask-based indexing, position counters on
/// separate cache lines, and a cached copy of the opposite side's position
/// in each handle so the common case touches no shared cache line.
///
/// The queue is split at construction into a `Producer` and a `Consumer`
/// handle; the type system enforces the SPSC discipline.

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityError {
    #[error("queue capacity must be a power of two, got {0}")]
    NotPowerOfTwo(usize),

    #[error("queue capacity must be nonzero")]
    Zero,
}

struct Inner<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: u64,
    /// Written only by the producer; read by the consumer with acquire.
    write_pos: CachePadded<AtomicU64>,
    /// Written only by the consumer; read by the producer with acquire.
    read_pos: CachePadded<AtomicU64>,
}

// Slots are only touched by the owning side between the position updates
// that publish them, so sharing Inner across the two handles is sound.
unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Inner<T> {
    #[inline]
    fn capacity(&self) -> u64 {
        self.mask + 1
    }

    fn approx_len(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.saturating_sub(read) as usize
    }
}

/// Producer end. Exactly one thread may own this.
pub struct Producer<T> {
    inner: Arc<Inner<T>>,
    cached_read_pos: u64,
}

/// Consumer end. Exactly one thread may own this.
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
    cached_write_pos: u64,
}

/// Create a bounded SPSC queue and split it into its two ends.
pub fn ring<T: Copy>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), CapacityError> {
    if capacity == 0 {
        return Err(CapacityError::Zero);
    }
    if !capacity.is_power_of_two() {
        return Err(CapacityError::NotPowerOfTwo(capacity));
    }

    let buffer: Box<[UnsafeCell<MaybeUninit<T>>]> = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();

    let inner = Arc::new(Inner {
        buffer,
        mask: capacity as u64 - 1,
        write_pos: CachePadded::new(AtomicU64::new(0)),
        read_pos: CachePadded::new(AtomicU64::new(0)),
    });

    Ok((
        Producer {
            inner: Arc::clone(&inner),
            cached_read_pos: 0,
        },
        Consumer {
            inner,
            cached_write_pos: 0,
        },
    ))
}

impl<T: Copy> Producer<T> {
    /// Push one item; `false` means the queue holds `capacity` unread items.
    ///
    /// Consults the cached read position first and reloads the shared
    /// counter only when the cache says "full". The slot write is published
    /// by the release store of `write_pos`.
    #[inline]
    pub fn try_push(&mut self, item: T) -> bool {
        let inner = &*self.inner;
        let write = inner.write_pos.load(Ordering::Relaxed);
        let next = write + 1;

        if next - self.cached_read_pos > inner.capacity() {
            self.cached_read_pos = inner.read_pos.load(Ordering::Acquire);
            if next - self.cached_read_pos > inner.capacity() {
                return false;
            }
        }

        let idx = (write & inner.mask) as usize;
        unsafe {
            (*inner.buffer[idx].get()).write(item);
        }
        inner.write_pos.store(next, Ordering::Release);
        true
    }

    /// Approximate number of unread items; may be stale.
    pub fn len(&self) -> usize {
        self.inner.approx_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity() as usize
    }
}

impl<T: Copy> Consumer<T> {
    /// Pop one item; `None` means the queue is empty.
    ///
    /// The acquire load of `write_pos` makes the producer's slot write
    /// visible before the slot is read.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        let inner = &*self.inner;
        let read = inner.read_pos.load(Ordering::Relaxed);

        if read >= self.cached_write_pos {
            self.cached_write_pos = inner.write_pos.load(Ordering::Acquire);
            if read >= self.cached_write_pos {
                return None;
            }
        }

        let idx = (read & inner.mask) as usize;
        let item = unsafe { inner.buffer[idx].get().read().assume_init() };
        inner.read_pos.store(read + 1, Ordering::Release);
        Some(item)
    }

    /// Approximate number of unread items; may be stale.
    pub fn len(&self) -> usize {
        self.inner.approx_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity() as usize
    }
}
