// src/io/mod.rs
//
// Packet input pipeline: line sources, the packet decoder and the polling
// publisher that serves the latest decoded record.

// Core modules
pub mod decoder;
mod error;
pub mod publisher;
pub mod record;
pub mod source;

// Real-time drivers
pub mod serial;

pub use decoder::decode_packet;
pub use error::{IoError, PacketError};
pub use publisher::{
    LatestRecord, Publisher, PublisherConfig, PublisherState, PublisherStats, DEFAULT_READ_TIMEOUT,
    DEFAULT_UPDATE_HZ,
};
pub use record::Record;
pub use source::{ChannelSource, LineSender, LineSource, ReplaySource};
