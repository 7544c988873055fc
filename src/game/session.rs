//! Game sessions.
//!
//! One session per session key, holding at most two participants. The slot a
//! connection receives at join is its identity for the session's whole
//! lifetime; a disconnect never frees a slot, it only leaves the peer with
//! stale state.
//!
//! One mutex per session keeps contention bounded to that session's two
//! participants and lets unrelated sessions run fully in parallel. The
//! start notification is deliberately sent inside the join critical section
//! so neither participant can act before both have been told the game is on;
//! the per-connection senders are unbounded, so nothing awaits under the
//! lock.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::game::state::{SharedState, Slot, StateSnapshot};
use crate::network::protocol::ServerMessage;
use crate::{FIELD_HEIGHT, FIELD_WIDTH, WINNING_SCORE};

/// Session join errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// Both slots are taken.
    #[error("game is full")]
    Full,
}

/// A joined participant: who they are and how to push messages to them.
/// The sender is dropped on disconnect so the connection's writer task can
/// drain and exit; the slot itself stays assigned.
#[derive(Debug)]
struct ParticipantHandle {
    username: String,
    sender: Option<mpsc::UnboundedSender<ServerMessage>>,
}

#[derive(Debug, Default)]
struct Inner {
    slots: Vec<ParticipantHandle>,
    started: bool,
    state: SharedState,
    rematch_votes: [bool; 2],
    win_recorded: bool,
    offline_since: [Option<Instant>; 2],
}

/// The shared game instance for exactly two participants.
#[derive(Debug)]
pub struct GameSession {
    key: String,
    inner: Mutex<Inner>,
}

impl GameSession {
    /// Create an empty session for a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The session key this instance is registered under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bind a connection to the next free slot.
    ///
    /// Filling the second slot marks the session started and pushes the
    /// start notification to both participants before the lock is released,
    /// so both see it before either reads a gameplay update.
    pub fn join(
        &self,
        username: impl Into<String>,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<Slot, JoinError> {
        let mut inner = self.lock();

        if inner.slots.len() >= 2 {
            return Err(JoinError::Full);
        }

        let slot = Slot::from_index(inner.slots.len());
        inner.offline_since[slot.index()] = None;
        inner.slots.push(ParticipantHandle {
            username: username.into(),
            sender: Some(sender),
        });

        if inner.slots.len() == 2 {
            debug_assert!(!inner.started, "second join on a started session");
            inner.started = true;
            for (index, participant) in inner.slots.iter().enumerate() {
                if let Some(sender) = &participant.sender {
                    let _ = sender.send(ServerMessage::StartGame {
                        x_res: FIELD_WIDTH,
                        y_res: FIELD_HEIGHT,
                        paddle: Slot::from_index(index).label().to_string(),
                    });
                }
            }
        }

        Ok(slot)
    }

    /// Whether both slots have joined.
    pub fn started(&self) -> bool {
        self.lock().started
    }

    /// Username bound to a slot, if that slot has joined.
    pub fn username(&self, slot: Slot) -> Option<String> {
        self.lock()
            .slots
            .get(slot.index())
            .map(|p| p.username.clone())
    }

    /// Set a slot's paddle position.
    pub fn set_paddle_y(&self, slot: Slot, y: i32) {
        self.lock().state.paddle_y[slot.index()] = y;
    }

    /// Set ball position and velocity.
    pub fn set_ball(&self, x: i32, y: i32, xvel: i32, yvel: i32) {
        let mut inner = self.lock();
        inner.state.ballx = x;
        inner.state.bally = y;
        inner.state.ballxvel = xvel;
        inner.state.ballyvel = yvel;
    }

    /// Set a slot's score.
    pub fn set_score(&self, slot: Slot, score: u32) {
        self.lock().state.score[slot.index()] = score;
    }

    /// Set a slot's sync counter.
    pub fn set_sync(&self, slot: Slot, sync: u64) {
        self.lock().state.sync[slot.index()] = sync;
    }

    /// Immutable copy of the shared record.
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.lock();
        inner.state.snapshot(inner.started)
    }

    /// Record a rematch vote for a slot. Once both slots have voted, both
    /// scores reset to zero, the win latch clears, and the vote set empties;
    /// returns true on that transition. Ball, paddle, and sync fields are
    /// left for the next updates to reinitialize.
    pub fn vote_rematch(&self, slot: Slot) -> bool {
        let mut inner = self.lock();
        inner.rematch_votes[slot.index()] = true;

        if inner.rematch_votes == [true, true] {
            inner.rematch_votes = [false, false];
            inner.state.score = [0, 0];
            inner.win_recorded = false;
            true
        } else {
            false
        }
    }

    /// If the slot's score has passed the winning threshold and no win has
    /// been credited for this game yet, latch it and return the username to
    /// credit. At most one win per game until a rematch resets the latch.
    pub fn take_win(&self, slot: Slot) -> Option<String> {
        let mut inner = self.lock();

        if !inner.started || inner.win_recorded {
            return None;
        }
        if inner.state.score[slot.index()] <= WINNING_SCORE {
            return None;
        }

        inner.win_recorded = true;
        inner.slots.get(slot.index()).map(|p| p.username.clone())
    }

    /// Note that a slot's connection is gone. The slot stays assigned; only
    /// the push channel is released.
    pub fn mark_disconnected(&self, slot: Slot) {
        let mut inner = self.lock();
        if let Some(participant) = inner.slots.get_mut(slot.index()) {
            participant.sender = None;
        }
        inner.offline_since[slot.index()] = Some(Instant::now());
    }

    /// How long every joined slot has been offline, measured from the most
    /// recent disconnect. None while any connection is live or before the
    /// first join.
    pub fn idle_for(&self) -> Option<Duration> {
        let inner = self.lock();
        if inner.slots.is_empty() {
            return None;
        }

        let mut latest: Option<Instant> = None;
        for index in 0..inner.slots.len() {
            match inner.offline_since[index] {
                Some(at) => latest = Some(latest.map_or(at, |l| l.max(at))),
                None => return None,
            }
        }
        latest.map(|at| at.elapsed())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("session lock poisoned")
    }
}
