//! In-memory transports for testing.
//!
//! - `FakeRealtimeConnector` - channel whose lifecycle the test drives
//! - `ScriptedPollTransport` - poll endpoint returning queued responses

mod fake_realtime;
mod scripted_poll;

pub use fake_realtime::{FakeChannelHandle, FakeRealtimeConnector};
pub use scripted_poll::ScriptedPollTransport;
