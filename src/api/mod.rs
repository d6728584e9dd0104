pub mod client;
pub mod logging;
#[cfg(test)]
pub mod mock_client;
pub mod normalize;
pub mod stream;

pub use client::{ApiClient, ByteStream};
pub use normalize::{normalize, Normalizer};
pub use stream::{normalized_events, EventStream, SseParser};
