//! Client session persistence.

mod user_session;

pub use user_session::SessionStore;
