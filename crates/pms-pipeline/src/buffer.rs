//! One of a stage's two tagged input queues.

use std::collections::VecDeque;

/// FIFO of received elements plus the number taken from it during the
/// current output run.
#[derive(Debug, Clone)]
pub struct Buffer<T> {
    queue: VecDeque<T>,
    taken: usize,
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            taken: 0,
        }
    }
}

impl<T> Buffer<T> {
    pub fn push(&mut self, value: T) {
        self.queue.push_back(value);
    }

    pub fn front(&self) -> Option<&T> {
        self.queue.front()
    }

    /// Pop the front element and count it against the current run.
    pub fn take_front(&mut self) -> Option<T> {
        let value = self.queue.pop_front()?;
        self.taken += 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn taken(&self) -> usize {
        self.taken
    }

    pub fn reset_taken(&mut self) {
        self.taken = 0;
    }

    /// True once this side has nothing more to give to the current run:
    /// either `run_length` elements were taken or the queue is empty.
    pub fn is_exhausted(&self, run_length: usize) -> bool {
        self.taken >= run_length || self.queue.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
