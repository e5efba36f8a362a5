//! In-memory session store
//!
//! - `SessionStore` - concurrent index of sessions, one async mutex each
//! - `SessionTurn` - exclusive hold on one session for the length of a turn
//! - `SessionStoreConfig` - idle expiry and capacity limits

mod store;

pub use store::{SessionState, SessionStore, SessionStoreConfig, SessionTurn};
