//! What a stage does with each element it produces.
//!
//! [`Forward`] tags elements and sends them downstream (Source, Merge);
//! [`Collect`] appends them to the final output (Sink).

use async_trait::async_trait;
use pms_types::{Element, Message, Rank, Tag};
use tracing::trace;

use crate::error::Result;
use crate::transport::Outbound;

#[async_trait]
pub trait Emit<T: Element>: Send {
    /// Hand one produced element on. Returns `true` when it completed an
    /// output run, i.e. the outgoing tag has just toggled.
    async fn emit(&mut self, value: T) -> Result<bool>;

    /// Elements emitted so far.
    fn emitted(&self) -> usize;
}

// ── Tag Cursor ───────────────────────────────────────────────────────────────

/// A stage's own outgoing tag, toggled every `run_length` sends.
#[derive(Debug, Clone)]
pub struct TagCursor {
    tag: Tag,
    run_length: usize,
    sent_under_tag: usize,
}

impl TagCursor {
    pub fn new(run_length: usize) -> Self {
        Self {
            tag: Tag::Upper,
            run_length,
            sent_under_tag: 0,
        }
    }

    pub fn current(&self) -> Tag {
        self.tag
    }

    /// Count one send under the current tag. Returns `true` if the tag
    /// toggled as a result.
    pub fn advance(&mut self) -> bool {
        self.sent_under_tag += 1;
        if self.sent_under_tag < self.run_length {
            return false;
        }
        self.tag = self.tag.toggled();
        self.sent_under_tag = 0;
        true
    }
}

// ── Forward ──────────────────────────────────────────────────────────────────

pub struct Forward<O> {
    rank: Rank,
    outbound: O,
    cursor: TagCursor,
    emitted: usize,
}

impl<O> Forward<O> {
    pub fn new(rank: Rank, outbound: O, run_length: usize) -> Self {
        Self {
            rank,
            outbound,
            cursor: TagCursor::new(run_length),
            emitted: 0,
        }
    }

    pub fn into_inner(self) -> O {
        self.outbound
    }
}

#[async_trait]
impl<T, O> Emit<T> for Forward<O>
where
    T: Element,
    O: Outbound<T>,
{
    async fn emit(&mut self, value: T) -> Result<bool> {
        self.outbound
            .send(Message::new(value, self.cursor.current()))
            .await?;
        self.emitted += 1;

        let toggled = self.cursor.advance();
        if toggled {
            trace!(rank = self.rank, tag = %self.cursor.current(), "outgoing tag toggled");
        }
        Ok(toggled)
    }

    fn emitted(&self) -> usize {
        self.emitted
    }
}

// ── Collect ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Collect<T> {
    output: Vec<T>,
}

impl<T> Default for Collect<T> {
    fn default() -> Self {
        Self { output: Vec::new() }
    }
}

impl<T> Collect<T> {
    pub fn into_output(self) -> Vec<T> {
        self.output
    }
}

#[async_trait]
impl<T: Element> Emit<T> for Collect<T> {
    async fn emit(&mut self, value: T) -> Result<bool> {
        self.output.push(value);
        Ok(false)
    }

    fn emitted(&self) -> usize {
        self.output.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
