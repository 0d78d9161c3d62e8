// Network layer: streaming chat transport and the realtime change listener.

pub mod chat;
pub mod decoder;
pub mod realtime;

mod error;

pub use chat::{ChatApi, ChatClient, DeltaStream};
pub use decoder::ChunkDecoder;
pub use error::NetError;
pub use realtime::{spawn_realtime, RealtimeCommand, RealtimeConfig};
