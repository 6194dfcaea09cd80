// Inter-stage vocabulary.
//
// Shared across pms-pipeline and pms-node.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Element ──────────────────────────────────────────────────────────────────

/// A value that can flow through the merge network.
///
/// Only ordering matters; two elements comparing equal are interchangeable.
pub trait Element: Ord + Copy + Send + Sync + fmt::Debug + 'static {}

impl<T> Element for T where T: Ord + Copy + Send + Sync + fmt::Debug + 'static {}

// ── Tag ──────────────────────────────────────────────────────────────────────

/// Selects which of the receiving stage's two input buffers a message
/// belongs to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tag {
    #[default]
    Upper = 0,
    Lower = 1,
}

impl Tag {
    pub const ALL: [Tag; 2] = [Tag::Upper, Tag::Lower];

    /// The other tag.
    pub fn toggled(self) -> Self {
        match self {
            Self::Upper => Self::Lower,
            Self::Lower => Self::Upper,
        }
    }

    /// Position of the matching buffer in a stage's buffer pair.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upper => write!(f, "Upper"),
            Self::Lower => write!(f, "Lower"),
        }
    }
}

// ── Message ──────────────────────────────────────────────────────────────────

/// Unit of communication between adjacent stages.
///
/// The tag travels next to the payload rather than being derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message<T> {
    pub value: T,
    pub tag: Tag,
}

impl<T> Message<T> {
    pub fn new(value: T, tag: Tag) -> Self {
        Self { value, tag }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
