pub mod config;
pub mod error;
pub mod message;
pub mod stage;

pub use config::{SortConfig, Topology};
pub use error::ConfigError;
pub use message::{Element, Message, Tag};
pub use stage::{Rank, StageRole, StageSpec};
