//! Fixed-capacity ring buffer backing the moving-window filters (§4.8).
//!
//! Capacity is set at construction and never changes; `write` fails
//! (loudly, per §7's per-sample assertion policy) rather than growing.
//! The reference also has a pointer/owning variant used by an FFT tool;
//! that tool has no counterpart in this crate, so only the scalar
//! variant is implemented here.

use std::collections::VecDeque;

use crate::error::RuntimeError;

/// A fixed-capacity FIFO of `T`.
#[derive(Debug, Clone)]
pub struct Fifo<T> {
    capacity: usize,
    items: VecDeque<T>,
    label: String,
}

impl<T> Fifo<T> {
    /// Create an empty FIFO with the given capacity, tagged with `label`
    /// for error messages.
    pub fn new(capacity: usize, label: impl Into<String>) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
            label: label.into(),
        }
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the FIFO holds no samples.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the FIFO is at capacity.
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// The fixed capacity this FIFO was constructed with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push `item` to the back. Fails if the FIFO is already full.
    pub fn write(&mut self, item: T) -> Result<(), RuntimeError> {
        if self.is_full() {
            return Err(RuntimeError::FifoOverflow {
                label: self.label.clone(),
                capacity: self.capacity,
            });
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Pop the oldest item. Fails if the FIFO is empty.
    pub fn read(&mut self) -> Result<T, RuntimeError> {
        self.items.pop_front().ok_or_else(|| RuntimeError::FifoUnderflow {
            label: self.label.clone(),
        })
    }

    /// Peek an item counting back from the newest (`0` is the newest).
    pub fn peek_back(&self, index: usize) -> Option<&T> {
        let len = self.items.len();
        if index >= len {
            return None;
        }
        self.items.get(len - 1 - index)
    }
}
