//! Session registry.
//!
//! A pure key → session directory. One lock covers lookup and insert as a
//! single step, so two simultaneous first-joiners can never observe two
//! different sessions for the same key. The registry knows nothing about
//! participants; capacity lives in [`GameSession`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use crate::game::session::GameSession;

/// Maps session keys to live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<GameSession>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure lookup, no side effect.
    pub fn find(&self, key: &str) -> Option<Arc<GameSession>> {
        self.lock().get(key).cloned()
    }

    /// Return the session for a key, creating it atomically on first use.
    pub fn get_or_create(&self, key: &str) -> Arc<GameSession> {
        let mut sessions = self.lock();
        if let Some(session) = sessions.get(key) {
            return Arc::clone(session);
        }

        let session = Arc::new(GameSession::new(key));
        sessions.insert(key.to_string(), Arc::clone(&session));
        info!(session_key = key, "session created");
        session
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop sessions whose every slot has been offline longer than `grace`.
    /// Returns how many were removed.
    pub fn sweep_idle(&self, grace: Duration) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|key, session| {
            let expired = session.idle_for().is_some_and(|idle| idle > grace);
            if expired {
                info!(session_key = key.as_str(), "idle session swept");
            }
            !expired
        });
        before - sessions.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<GameSession>>> {
        self.sessions.lock().expect("registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Slot;
    use tokio::sync::mpsc;

    #[test]
    fn test_find_has_no_side_effect() {
        let registry = SessionRegistry::new();
        assert!(registry.find("g1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_or_create_returns_same_session() {
        let registry = SessionRegistry::new();
        let first = registry.get_or_create("g1");
        let second = registry.get_or_create("g1");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&registry.find("g1").unwrap(), &first));
    }

    #[test]
    fn test_keys_are_exact_match() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create("Game");
        let b = registry.get_or_create("game");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_get_or_create_converges() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();

        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || registry.get_or_create("g1")));
        }

        let sessions: Vec<Arc<GameSession>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sweep_spares_live_and_young_sessions() {
        let registry = SessionRegistry::new();

        let live = registry.get_or_create("live");
        let (tx, _rx) = mpsc::unbounded_channel();
        live.join("alice", tx).unwrap();

        let idle = registry.get_or_create("idle");
        let (tx, _rx) = mpsc::unbounded_channel();
        idle.join("bob", tx).unwrap();
        idle.mark_disconnected(Slot::First);

        // Generous grace: nothing has been idle that long.
        assert_eq!(registry.sweep_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.len(), 2);

        // Zero grace: only the fully-offline session goes.
        assert_eq!(registry.sweep_idle(Duration::ZERO), 1);
        assert!(registry.find("idle").is_none());
        assert!(registry.find("live").is_some());
    }
}
