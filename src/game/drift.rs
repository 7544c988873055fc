//! Drift reconciliation.
//!
//! Each participant advances a local sync counter once per simulation tick
//! and reports it on every update. When a participant pulls a snapshot, the
//! counters decide whose ball and score are ground truth: a peer that is
//! behind is ignored, a peer that is ahead (or further away than the
//! threshold) wins. Paddle positions are exempt; the peer's latest reported
//! paddle is always adopted, since paddle input has no staleness beyond one
//! tick. This is a counter-relative last-writer rule, not a merge.

use crate::game::state::{Slot, StateSnapshot};

/// How many local ticks pass between periodic snapshot pulls.
pub const SYNC_INTERVAL_TICKS: u64 = 30;

/// Counter gap beyond which the snapshot is adopted regardless of direction.
pub const DRIFT_THRESHOLD_TICKS: u64 = 30;

/// A participant's local view of the fields the reconciliation rule touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalView {
    /// Ball x position.
    pub ballx: i32,
    /// Ball y position.
    pub bally: i32,
    /// Ball x velocity.
    pub ballxvel: i32,
    /// Ball y velocity.
    pub ballyvel: i32,
    /// Score per slot as this participant sees it.
    pub score: [u32; 2],
    /// The peer's paddle position.
    pub opponent_y: i32,
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Peer was behind; own ball and score kept.
    Kept,
    /// Snapshot adopted as ground truth; `drift` is the counter gap.
    Adopted {
        /// Magnitude of the counter gap at adoption time.
        drift: u64,
    },
}

/// Tracks one participant's sync cadence and applies the reconciliation rule.
#[derive(Debug, Clone)]
pub struct DriftTracker {
    slot: Slot,
    interval: u64,
    threshold: u64,
    last_sync_tick: u64,
    drift: u64,
}

impl DriftTracker {
    /// Tracker for a participant occupying `slot`, with default cadence.
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            interval: SYNC_INTERVAL_TICKS,
            threshold: DRIFT_THRESHOLD_TICKS,
            last_sync_tick: 0,
            drift: 0,
        }
    }

    /// Override the periodic pull interval.
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    /// Override the adoption threshold.
    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Last recorded drift magnitude.
    pub fn drift(&self) -> u64 {
        self.drift
    }

    /// Whether to pull a snapshot this tick: every `interval` ticks, or
    /// immediately once recorded drift has passed the threshold.
    pub fn should_sync(&self, tick: u64) -> bool {
        tick.saturating_sub(self.last_sync_tick) >= self.interval || self.drift > self.threshold
    }

    /// Note that a snapshot was pulled at `tick`.
    pub fn mark_synced(&mut self, tick: u64) {
        self.last_sync_tick = tick;
    }

    /// Apply a snapshot to the local view.
    ///
    /// `tick` is this participant's own counter. The peer's paddle is
    /// always taken from the snapshot; ball and score are overwritten only
    /// when the peer's counter is ahead of ours or the gap exceeds the
    /// threshold. Applying the same snapshot twice with unchanged counters
    /// leaves the view as the first application did.
    pub fn reconcile(
        &mut self,
        tick: u64,
        view: &mut LocalView,
        snapshot: &StateSnapshot,
    ) -> Reconciliation {
        let peer = self.slot.peer();
        view.opponent_y = snapshot.paddle_y[peer.index()];

        let peer_tick = snapshot.sync[peer.index()];
        let gap = peer_tick.abs_diff(tick);

        if peer_tick > tick || gap > self.threshold {
            view.ballx = snapshot.ballx;
            view.bally = snapshot.bally;
            view.ballxvel = snapshot.ballxvel;
            view.ballyvel = snapshot.ballyvel;
            view.score = snapshot.score;
            self.drift = gap;
            Reconciliation::Adopted { drift: gap }
        } else {
            self.drift = gap;
            Reconciliation::Kept
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(peer_sync: u64) -> StateSnapshot {
        StateSnapshot {
            paddle_y: [111, 222],
            ballx: 50,
            bally: 60,
            ballxvel: -3,
            ballyvel: 4,
            score: [2, 1],
            sync: [peer_sync, 0],
            started: true,
        }
    }

    fn local_view() -> LocalView {
        LocalView {
            ballx: 10,
            bally: 20,
            ballxvel: 5,
            ballyvel: -5,
            score: [1, 1],
            opponent_y: 0,
        }
    }

    #[test]
    fn test_peer_behind_keeps_own_ball_and_score() {
        // Participant in slot two at tick 100; slot-one peer reports 90.
        let mut tracker = DriftTracker::new(Slot::Second);
        let mut view = local_view();

        let result = tracker.reconcile(100, &mut view, &snapshot(90));
        assert_eq!(result, Reconciliation::Kept);
        assert_eq!(view.ballx, 10);
        assert_eq!(view.score, [1, 1]);
        // Paddle still comes from the peer.
        assert_eq!(view.opponent_y, 111);
    }

    #[test]
    fn test_peer_ahead_adopts_snapshot() {
        let mut tracker = DriftTracker::new(Slot::Second);
        let mut view = local_view();

        let result = tracker.reconcile(90, &mut view, &snapshot(100));
        assert_eq!(result, Reconciliation::Adopted { drift: 10 });
        assert_eq!((view.ballx, view.bally), (50, 60));
        assert_eq!((view.ballxvel, view.ballyvel), (-3, 4));
        assert_eq!(view.score, [2, 1]);
        assert_eq!(tracker.drift(), 10);
    }

    #[test]
    fn test_gap_beyond_threshold_adopts_even_when_peer_behind() {
        let mut tracker = DriftTracker::new(Slot::Second).with_threshold(30);
        let mut view = local_view();

        let result = tracker.reconcile(200, &mut view, &snapshot(100));
        assert_eq!(result, Reconciliation::Adopted { drift: 100 });
        assert_eq!(view.score, [2, 1]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut tracker = DriftTracker::new(Slot::Second);
        let mut view = local_view();
        let snap = snapshot(150);

        tracker.reconcile(100, &mut view, &snap);
        let once = view.clone();
        let result = tracker.reconcile(100, &mut view, &snap);

        assert_eq!(result, Reconciliation::Adopted { drift: 50 });
        assert_eq!(view, once);
    }

    #[test]
    fn test_sync_cadence() {
        let mut tracker = DriftTracker::new(Slot::First).with_interval(30);

        assert!(!tracker.should_sync(10));
        assert!(tracker.should_sync(30));
        tracker.mark_synced(30);
        assert!(!tracker.should_sync(45));
        assert!(tracker.should_sync(60));
    }

    #[test]
    fn test_excess_drift_forces_immediate_sync() {
        let mut tracker = DriftTracker::new(Slot::First)
            .with_interval(30)
            .with_threshold(30);
        let mut view = local_view();

        tracker.mark_synced(100);
        assert!(!tracker.should_sync(101));

        let mut snap = snapshot(0);
        snap.sync = [0, 200]; // slot-two peer far ahead of our tick 101
        tracker.reconcile(101, &mut view, &snap);
        assert!(tracker.should_sync(101));
    }

    #[test]
    fn test_slot_one_reads_slot_two_counter() {
        let mut tracker = DriftTracker::new(Slot::First);
        let mut view = local_view();

        let mut snap = snapshot(0);
        snap.sync = [0, 120];
        snap.paddle_y = [333, 444];

        let result = tracker.reconcile(110, &mut view, &snap);
        assert_eq!(result, Reconciliation::Adopted { drift: 10 });
        assert_eq!(view.opponent_y, 444);
    }

    proptest! {
        #[test]
        fn prop_adoption_follows_counter_relation(
            tick in 0u64..10_000,
            peer_tick in 0u64..10_000,
        ) {
            let mut tracker = DriftTracker::new(Slot::Second);
            let mut view = local_view();

            let adopted = matches!(
                tracker.reconcile(tick, &mut view, &snapshot(peer_tick)),
                Reconciliation::Adopted { .. }
            );
            let gap = peer_tick.abs_diff(tick);

            prop_assert_eq!(adopted, peer_tick > tick || gap > DRIFT_THRESHOLD_TICKS);
            prop_assert_eq!(tracker.drift(), gap);
            // The peer's paddle is adopted either way.
            prop_assert_eq!(view.opponent_y, 111);
        }
    }
}
