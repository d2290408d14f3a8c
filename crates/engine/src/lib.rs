pub mod answer;
pub mod compile;
pub mod documents;
pub mod drive;
pub mod engine;
pub mod packet;
pub mod phase;
pub mod sse;
pub mod state;
pub mod stats;
pub mod text;
pub mod throttle;
pub mod tree;

// Re-exports for convenience.
pub use drive::{drive_stream, StreamOutcome};
pub use engine::StreamingEngine;
pub use packet::{classify, ClassifiedPacket, PacketKind};
pub use sse::{decode_frames, FrameDecoder};
