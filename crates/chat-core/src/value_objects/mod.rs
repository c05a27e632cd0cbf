//! Value objects - immutable types that represent domain concepts

mod ids;

pub use ids::{ChannelName, IdParseError, UserId, MAX_CHANNEL_NAME_LEN};
