//! Point-to-point links between adjacent stages.
//!
//! A link is a bounded tokio mpsc channel with exactly one sender (rank `r`)
//! and one receiver (rank `r + 1`), so messages arrive once each and in send
//! order. `receive` suspends until a message is available; `send` suspends
//! while the link is full.

use async_trait::async_trait;
use pms_types::{Element, Message, Rank};
use tokio::sync::mpsc;

use crate::error::{PipelineError, Result};

#[async_trait]
pub trait Inbound<T: Element>: Send {
    /// Wait for the next message from the upstream stage.
    async fn receive(&mut self) -> Result<Message<T>>;
}

#[async_trait]
pub trait Outbound<T: Element>: Send {
    /// Deliver a message to the downstream stage.
    async fn send(&mut self, msg: Message<T>) -> Result<()>;
}

/// Open the link from `from` to `from + 1`.
pub fn link<T: Element>(from: Rank, capacity: usize) -> (ChannelOutbound<T>, ChannelInbound<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    let outbound = ChannelOutbound {
        rank: from,
        peer: from + 1,
        tx,
    };
    let inbound = ChannelInbound {
        rank: from + 1,
        peer: from,
        rx,
    };
    (outbound, inbound)
}

// ── Channel ends ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ChannelOutbound<T> {
    rank: Rank,
    peer: Rank,
    tx: mpsc::Sender<Message<T>>,
}

#[derive(Debug)]
pub struct ChannelInbound<T> {
    rank: Rank,
    peer: Rank,
    rx: mpsc::Receiver<Message<T>>,
}

#[async_trait]
impl<T: Element> Outbound<T> for ChannelOutbound<T> {
    async fn send(&mut self, msg: Message<T>) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| PipelineError::Disconnected {
                rank: self.rank,
                peer: self.peer,
            })
    }
}

#[async_trait]
impl<T: Element> Inbound<T> for ChannelInbound<T> {
    async fn receive(&mut self) -> Result<Message<T>> {
        self.rx.recv().await.ok_or(PipelineError::Disconnected {
            rank: self.rank,
            peer: self.peer,
        })
    }
}

// ── Recording outbound ───────────────────────────────────────────────────────

/// Keeps every sent message in order. Lets a single stage run without a
/// downstream neighbour.
#[async_trait]
impl<T: Element> Outbound<T> for Vec<Message<T>> {
    async fn send(&mut self, msg: Message<T>) -> Result<()> {
        self.push(msg);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
