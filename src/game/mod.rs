//! Session state and synchronization logic.
//!
//! Nothing in here steps physics; the participants simulate locally and the
//! server only stores what they report.

pub mod drift;
pub mod registry;
pub mod session;
pub mod state;
