//! Domain entities - core client-side objects

mod presence;
mod session;

pub use presence::PresenceInfo;
pub use session::{
    RememberedCredentials, Session, SessionUser, REMEMBERED_CREDENTIALS_KEY, SESSION_KEY,
};
