// src/acquisition/sample_buffer.rs
//! Bounded, thread-safe sample ring shared by the producer and consumers
//!
//! One producer (the device listener) appends; any number of consumers take
//! snapshots, query occupancy or clear between trials. Each call holds a
//! single mutex for at most one O(capacity) copy, so no caller ever sees a
//! half-written slot. Overrun evicts the oldest sample and is counted, not
//! reported.

use crate::hal::types::Sample;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Buffer construction errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BufferError {
    /// Capacity was zero or above the configured maximum
    #[error("Invalid buffer capacity {0} (must be at least 1)")]
    InvalidCapacity(usize),
}

/// Buffer utilisation counters
#[derive(Debug, Clone, PartialEq)]
pub struct BufferMetrics {
    /// Fixed capacity in samples
    pub capacity: usize,
    /// Samples currently held
    pub len: usize,
    /// `len / capacity`, in `[0, 1]`
    pub utilization: f32,
    /// Samples appended since construction
    pub appended: u64,
    /// Oldest samples dropped to make room
    pub evicted: u64,
    /// Calls to `clear`
    pub clears: u64,
}

/// Fixed arena with a moving head; `head` indexes the oldest sample
struct Ring {
    slots: Vec<Sample>,
    head: usize,
    len: usize,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when the write evicted the oldest sample
    fn push(&mut self, sample: Sample) -> bool {
        let capacity = self.capacity();
        if self.len < capacity {
            let index = (self.head + self.len) % capacity;
            self.slots[index] = sample;
            self.len += 1;
            false
        } else {
            self.slots[self.head] = sample;
            self.head = (self.head + 1) % capacity;
            true
        }
    }

    /// Newest `count` samples in arrival order
    fn copy_tail(&self, count: usize) -> Vec<Sample> {
        let count = count.min(self.len);
        let capacity = self.capacity();
        let start = self.head + (self.len - count);
        (0..count)
            .map(|offset| self.slots[(start + offset) % capacity])
            .collect()
    }

    fn newest(&self) -> Option<Sample> {
        if self.len == 0 {
            None
        } else {
            Some(self.slots[(self.head + self.len - 1) % self.capacity()])
        }
    }

    fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

/// Fixed-capacity FIFO of timestamped samples
pub struct SampleBuffer {
    ring: Mutex<Ring>,
    capacity: usize,
    appended: AtomicU64,
    evicted: AtomicU64,
    clears: AtomicU64,
}

impl SampleBuffer {
    /// Create a buffer holding at most `capacity` samples
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity(capacity));
        }

        let empty = Sample::new(0, Default::default());
        Ok(Self {
            ring: Mutex::new(Ring {
                slots: vec![empty; capacity],
                head: 0,
                len: 0,
            }),
            capacity,
            appended: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            clears: AtomicU64::new(0),
        })
    }

    /// Append one sample, dropping the oldest when full. Never fails.
    pub fn append(&self, sample: Sample) {
        let evicted = self.ring.lock().push(sample);
        self.appended.fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Consistent copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        let ring = self.ring.lock();
        ring.copy_tail(ring.len)
    }

    /// Copy of the newest `count` samples (fewer if not yet available)
    pub fn tail(&self, count: usize) -> Vec<Sample> {
        self.ring.lock().copy_tail(count)
    }

    /// Newest sample, if any
    pub fn latest(&self) -> Option<Sample> {
        self.ring.lock().newest()
    }

    /// Discard everything, e.g. between recording trials
    pub fn clear(&self) {
        self.ring.lock().clear();
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.ring.lock().len
    }

    /// True when no sample is held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the next append will evict
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Capacity fixed at construction
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current counters
    pub fn metrics(&self) -> BufferMetrics {
        let len = self.len();
        BufferMetrics {
            capacity: self.capacity,
            len,
            utilization: len as f32 / self.capacity as f32,
            appended: self.appended.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
