pub mod aggregate;
pub mod consumer;
pub mod conversation;

pub use aggregate::{aggregate, TurnAggregator};
pub use consumer::{consume, StreamUpdate};
pub use conversation::Conversation;
