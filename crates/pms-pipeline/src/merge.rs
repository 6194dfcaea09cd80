//! Merge core shared by Merge and Sink stages.
//!
//! Holds a stage's two input buffers, the start latch and the per-emission
//! merge decision. The core never talks to a link: the drive loop in
//! [`crate::executor`] feeds it received messages and hands the elements it
//! produces to an [`crate::emit::Emit`] strategy.

use pms_types::{Element, Message, Rank, StageSpec, Tag};
use tracing::debug;

use crate::buffer::Buffer;
use crate::error::{PipelineError, Result};

#[derive(Debug)]
pub struct MergeCore<T> {
    rank: Rank,
    run_length: usize,
    buffers: [Buffer<T>; 2],
    started_at: Option<usize>,
    peak_occupancy: usize,
}

impl<T: Element> MergeCore<T> {
    pub fn new(spec: &StageSpec) -> Self {
        let run_length = spec.input_run_length();
        Self {
            rank: spec.rank,
            run_length,
            buffers: [Buffer::default(), Buffer::default()],
            started_at: None,
            peak_occupancy: 0,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn buffer(&self, tag: Tag) -> &Buffer<T> {
        &self.buffers[tag.index()]
    }

    /// Elements currently held across both buffers.
    pub fn occupancy(&self) -> usize {
        self.buffers.iter().map(Buffer::len).sum()
    }

    pub fn peak_occupancy(&self) -> usize {
        self.peak_occupancy
    }

    /// Iteration at which merging started, if it has.
    pub fn started_at(&self) -> Option<usize> {
        self.started_at
    }

    pub fn is_merging(&self) -> bool {
        self.started_at.is_some()
    }

    // ── Buffering ────────────────────────────────────────────────────────

    /// Append a received message to the buffer named by its tag.
    pub fn save(&mut self, msg: Message<T>) {
        self.buffers[msg.tag.index()].push(msg.value);
        self.peak_occupancy = self.peak_occupancy.max(self.occupancy());
    }

    /// `len(Upper) >= run_length && len(Lower) >= 1`.
    pub fn can_start(&self) -> bool {
        self.buffer(Tag::Upper).len() >= self.run_length && !self.buffer(Tag::Lower).is_empty()
    }

    /// Latch merging on the first time the start condition holds. Once
    /// latched it stays on. Returns whether merging is active.
    pub fn poll_start(&mut self, iteration: usize) -> bool {
        if self.started_at.is_none() && self.can_start() {
            debug!(rank = self.rank, iteration, "merge started");
            self.started_at = Some(iteration);
        }
        self.is_merging()
    }

    // ── Merge decision ───────────────────────────────────────────────────

    /// Produce the next merged element.
    ///
    /// A side that has given `run_length` elements to the current run, or
    /// holds nothing, forces a take from the other side. Otherwise the
    /// smaller front wins and ties go to `Upper`.
    pub fn next_element(&mut self) -> Result<T> {
        for tag in Tag::ALL {
            if self.buffer(tag).is_exhausted(self.run_length) {
                return self.take(tag.toggled());
            }
        }

        let winner = match (self.buffer(Tag::Upper).front(), self.buffer(Tag::Lower).front()) {
            (Some(upper), Some(lower)) if upper > lower => Tag::Lower,
            (Some(_), Some(_)) => Tag::Upper,
            _ => return Err(PipelineError::Underrun { rank: self.rank }),
        };
        self.take(winner)
    }

    /// Start a new output run: both `taken` counters go back to zero.
    pub fn reset_taken(&mut self) {
        for buffer in &mut self.buffers {
            buffer.reset_taken();
        }
    }

    fn take(&mut self, tag: Tag) -> Result<T> {
        self.buffers[tag.index()]
            .take_front()
            .ok_or(PipelineError::Underrun { rank: self.rank })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
