//! Realtime client on Redis Pub/Sub.
//!
//! Provides the realtime service the trigger subscribes to: message and
//! presence fan-out, occupancy snapshots, and connection status reporting.

mod backoff;
mod channels;
mod client;

pub use backoff::ReconnectBackoff;
pub use channels::{
    parse_wire_channel, presence_set, wire_channel, PRESENCE_SET_PREFIX, REALTIME_CHANNEL_PREFIX,
};
pub use client::RedisRealtimeClient;
