//! Wire protocol and connection handling.

pub mod client;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod transport;
