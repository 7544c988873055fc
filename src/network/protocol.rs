//! Protocol messages.
//!
//! Closed vocabulary for both directions, selected by the `"request"` tag
//! field. Parsing happens once at the transport boundary; everything past
//! it sees validated variants, never raw JSON.

use serde::{Deserialize, Serialize};

use crate::game::state::StateSnapshot;

/// Messages sent from a participant to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Credential handshake, the first message on a connection.
    Credentials {
        /// Account name.
        username: String,
        /// SHA-256 hex digest of the password.
        password: String,
        /// Opaque key naming the session to join.
        session_key: String,
    },

    /// Per-tick push of this participant's fields. Fire-and-forget.
    UpdateState {
        /// Own paddle position.
        ypos: i32,
        /// Ball x position.
        ballx: i32,
        /// Ball y position.
        bally: i32,
        /// Ball x velocity.
        ballxvel: i32,
        /// Ball y velocity.
        ballyvel: i32,
        /// Own score.
        score: u32,
        /// Own sync counter.
        sync: u64,
    },

    /// Pull the session's full snapshot.
    Sync,

    /// Vote to restart; scores reset once both slots have voted.
    PlayAgain,
}

/// Messages sent from the server to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Prompt for the credential handshake, sent right after accept.
    Credentials,

    /// Credentials accepted (existing or freshly created account).
    LoginSuccess,

    /// Credentials rejected. The connection closes after this.
    BadPassword,

    /// Both slots are filled; the game is on. Sent to both participants.
    StartGame {
        /// Horizontal display resolution.
        x_res: u32,
        /// Vertical display resolution.
        y_res: u32,
        /// This participant's slot label, `"player1"` or `"player2"`.
        paddle: String,
    },

    /// Full snapshot of the shared record, answering a sync pull.
    GameState(StateSnapshot),

    /// Human-readable failure notice. The connection closes after this.
    Error {
        /// What went wrong.
        message: String,
    },
}
