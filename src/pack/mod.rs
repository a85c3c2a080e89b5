//! Audio re-packetizing
//!
//! - [`SampleFifo`]: byte-exact buffer of samples awaiting emission
//! - [`TimestampTracker`]: output PTS/duration from the emitted sample count
//! - [`SamplePacker`]: the control loop tying upstream, FIFO and downstream together

pub mod fifo;
pub mod filter;
pub mod timestamp;

pub use fifo::SampleFifo;
pub use filter::{PackState, PackStats, PackStatus, SamplePacker};
pub use timestamp::TimestampTracker;
