//! # Paddle Duel Server
//!
//! Authoritative relay server for two-player paddle duels. Each participant
//! runs its own fixed-rate simulation; the server pairs exactly two
//! connections per session key, holds the shared game record, and lets the
//! participants reconcile timing drift through per-slot sync counters.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PADDLE DUEL SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/            - Session state (no simulation)           │
//! │  ├── state.rs     - Shared record and immutable snapshots   │
//! │  ├── session.rs   - Two-slot session, join and rematch      │
//! │  ├── registry.rs  - Session key directory, idle sweep       │
//! │  └── drift.rs     - Participant-side drift reconciliation   │
//! │                                                              │
//! │  network/         - Wire protocol and connection handling   │
//! │  ├── transport.rs - Length-prefixed JSON frames              │
//! │  ├── protocol.rs  - Request and response vocabulary          │
//! │  ├── handler.rs   - Per-connection state machine             │
//! │  ├── server.rs    - TCP accept loop                          │
//! │  └── client.rs    - Headless participant driver              │
//! │                                                              │
//! │  auth.rs          - Account store (credentials, win counts)  │
//! │  config.rs        - Server configuration                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The server never steps physics. Every `update_state` overwrites the
//! relevant fields of the shared record; `sync` hands back a full snapshot
//! and the counter-relative rule in [`game::drift`] decides which side's
//! ball and score win out.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod game;
pub mod network;

pub use game::registry::SessionRegistry;
pub use game::session::GameSession;
pub use game::state::{Slot, StateSnapshot};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Horizontal display resolution sent in the start notification.
pub const FIELD_WIDTH: u32 = 640;

/// Vertical display resolution sent in the start notification.
pub const FIELD_HEIGHT: u32 = 480;

/// A game is won once a slot's score exceeds this.
pub const WINNING_SCORE: u32 = 4;

/// Participant simulation rate (Hz); informational, the server is reactive.
pub const TICK_RATE: u32 = 60;
