//! Shared session state.
//!
//! One mutable record per session: paddle positions, ball kinematics,
//! scores, and the per-slot sync counters. Readers only ever see an
//! immutable [`StateSnapshot`] copy.

use serde::{Deserialize, Serialize};

/// A participant's fixed position within a session, assigned at join time
/// and permanent for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// First joiner ("player1").
    First,
    /// Second joiner ("player2").
    Second,
}

impl Slot {
    /// Array index for per-slot fields.
    pub fn index(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }

    /// The other slot.
    pub fn peer(self) -> Slot {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }

    /// Label carried in the start notification.
    pub fn label(self) -> &'static str {
        match self {
            Slot::First => "player1",
            Slot::Second => "player2",
        }
    }

    /// Slot for an array index. Panics on anything but 0 or 1; slot indices
    /// come from `Vec::len() - 1` under the session lock and cannot exceed 1.
    pub fn from_index(index: usize) -> Slot {
        match index {
            0 => Slot::First,
            1 => Slot::Second,
            other => panic!("slot index out of range: {other}"),
        }
    }

    /// Parse a start-notification label.
    pub fn from_label(label: &str) -> Option<Slot> {
        match label {
            "player1" => Some(Slot::First),
            "player2" => Some(Slot::Second),
            _ => None,
        }
    }
}

/// The authoritative mutable record for one session.
///
/// Fields default to zero until both slots have joined; the peer must not
/// trust a slot's fields before the session has started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedState {
    /// Vertical paddle position per slot.
    pub paddle_y: [i32; 2],
    /// Ball x position.
    pub ballx: i32,
    /// Ball y position.
    pub bally: i32,
    /// Ball x velocity.
    pub ballxvel: i32,
    /// Ball y velocity.
    pub ballyvel: i32,
    /// Score per slot; non-decreasing except on rematch reset.
    pub score: [u32; 2],
    /// Monotonic sync counter per slot, advanced once per local tick.
    pub sync: [u64; 2],
}

impl SharedState {
    /// Immutable copy of the record plus the started flag.
    pub fn snapshot(&self, started: bool) -> StateSnapshot {
        StateSnapshot {
            paddle_y: self.paddle_y,
            ballx: self.ballx,
            bally: self.bally,
            ballxvel: self.ballxvel,
            ballyvel: self.ballyvel,
            score: self.score,
            sync: self.sync,
            started,
        }
    }
}

/// Immutable copy of the shared record, returned for every `sync` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Vertical paddle position per slot.
    pub paddle_y: [i32; 2],
    /// Ball x position.
    pub ballx: i32,
    /// Ball y position.
    pub bally: i32,
    /// Ball x velocity.
    pub ballxvel: i32,
    /// Ball y velocity.
    pub ballyvel: i32,
    /// Score per slot.
    pub score: [u32; 2],
    /// Sync counter per slot.
    pub sync: [u64; 2],
    /// Whether both slots have joined.
    pub started: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_roundtrip() {
        for slot in [Slot::First, Slot::Second] {
            assert_eq!(Slot::from_index(slot.index()), slot);
            assert_eq!(Slot::from_label(slot.label()), Some(slot));
            assert_eq!(slot.peer().peer(), slot);
        }
        assert_ne!(Slot::First.index(), Slot::Second.index());
        assert_eq!(Slot::from_label("left"), None);
    }

    #[test]
    fn test_snapshot_copies_fields() {
        let state = SharedState {
            paddle_y: [100, 250],
            ballx: 320,
            bally: 240,
            ballxvel: -5,
            ballyvel: 2,
            score: [3, 1],
            sync: [900, 897],
        };

        let snap = state.snapshot(true);
        assert_eq!(snap.paddle_y, [100, 250]);
        assert_eq!(snap.ballx, 320);
        assert_eq!(snap.score, [3, 1]);
        assert_eq!(snap.sync, [900, 897]);
        assert!(snap.started);
    }

    #[test]
    fn test_defaults_are_zero() {
        let snap = SharedState::default().snapshot(false);
        assert_eq!(snap.paddle_y, [0, 0]);
        assert_eq!(snap.score, [0, 0]);
        assert_eq!(snap.sync, [0, 0]);
        assert!(!snap.started);
    }
}
