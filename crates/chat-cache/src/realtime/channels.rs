//! Redis naming for realtime channels.
//!
//! Every chat channel maps to one Redis Pub/Sub channel and one Redis set
//! holding its current occupants.

use chat_core::ChannelName;

/// Prefix of the Redis Pub/Sub channel carrying a chat channel's events
pub const REALTIME_CHANNEL_PREFIX: &str = "rt:";
/// Prefix of the Redis set holding a chat channel's occupants
pub const PRESENCE_SET_PREFIX: &str = "rt_";

/// Redis Pub/Sub channel for a chat channel
#[must_use]
pub fn wire_channel(channel: &ChannelName) -> String {
    format!("{REALTIME_CHANNEL_PREFIX}{channel}")
}

/// Redis set holding the occupants of a chat channel
#[must_use]
pub fn presence_set(channel: &ChannelName) -> String {
    format!("{PRESENCE_SET_PREFIX}{}", channel.presence_key())
}

/// Parse a Redis Pub/Sub channel name back to a chat channel
#[must_use]
pub fn parse_wire_channel(name: &str) -> Option<ChannelName> {
    name.strip_prefix(REALTIME_CHANNEL_PREFIX)
        .and_then(|rest| ChannelName::parse(rest).ok())
}
