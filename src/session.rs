// Per-conversation session store
//
// Holds the last submitted URL and the selection state for each conversation.
// Entries expire after a TTL and the map is capped; the `*_at` methods take
// the current instant so tests can drive time explicitly.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::selection::SelectionState;

pub type ConversationId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub url: String,
    pub state: SelectionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Drop entries idle for longer than this
    pub ttl: Duration,
    /// Hard cap on stored conversations
    pub capacity: usize,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            capacity: 10_000,
        }
    }
}

#[derive(Debug)]
struct Entry {
    session: Session,
    touched: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    policy: EvictionPolicy,
    entries: Mutex<HashMap<ConversationId, Entry>>,
}

impl SessionStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store a new URL, replacing whatever the conversation had
    pub fn start(&self, conversation: ConversationId, url: &str) {
        self.start_at(conversation, url, Instant::now())
    }

    pub fn start_at(&self, conversation: ConversationId, url: &str, now: Instant) {
        let mut entries = self.entries.lock();

        if !entries.contains_key(&conversation) && entries.len() >= self.policy.capacity {
            Self::evict_locked(&mut entries, self.policy.ttl, now);
            if entries.len() >= self.policy.capacity {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.touched)
                    .map(|(k, _)| *k)
                {
                    debug!(conversation = oldest, "evicting oldest session");
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            conversation,
            Entry {
                session: Session {
                    url: url.to_string(),
                    state: SelectionState::AwaitingKind,
                },
                touched: now,
            },
        );
    }

    pub fn get(&self, conversation: ConversationId) -> Option<Session> {
        self.get_at(conversation, Instant::now())
    }

    /// Expired entries read as absent and are dropped on the spot
    pub fn get_at(&self, conversation: ConversationId, now: Instant) -> Option<Session> {
        let mut entries = self.entries.lock();
        let expired = entries
            .get(&conversation)
            .map(|e| now.saturating_duration_since(e.touched) > self.policy.ttl)?;
        if expired {
            entries.remove(&conversation);
            return None;
        }
        entries.get(&conversation).map(|e| e.session.clone())
    }

    /// Move to `state` only if the conversation still holds `expected_url`.
    /// Check and write happen under one lock, so a button pressed on an old
    /// menu cannot land on a session started by a newer URL.
    pub fn advance(&self, conversation: ConversationId, expected_url: &str, state: SelectionState) -> bool {
        self.advance_at(conversation, expected_url, state, Instant::now())
    }

    pub fn advance_at(
        &self,
        conversation: ConversationId,
        expected_url: &str,
        state: SelectionState,
        now: Instant,
    ) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(&conversation) {
            Some(entry)
                if entry.session.url == expected_url
                    && now.saturating_duration_since(entry.touched) <= self.policy.ttl =>
            {
                entry.session.state = state;
                entry.touched = now;
                true
            }
            _ => false,
        }
    }

    /// Drop everything past its TTL; returns how many were removed
    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        Self::evict_locked(&mut entries, self.policy.ttl, now)
    }

    fn evict_locked(entries: &mut HashMap<ConversationId, Entry>, ttl: Duration, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.touched) <= ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(EvictionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl_secs: u64, capacity: usize) -> SessionStore {
        SessionStore::new(EvictionPolicy {
            ttl: Duration::from_secs(ttl_secs),
            capacity,
        })
    }

    #[test]
    fn test_new_url_overwrites() {
        let s = store(60, 10);
        let t0 = Instant::now();
        s.start_at(1, "https://a", t0);
        s.advance_at(1, "https://a", SelectionState::AwaitingQuality, t0);
        s.start_at(1, "https://b", t0);

        let session = s.get_at(1, t0).unwrap();
        assert_eq!(session.url, "https://b");
        assert_eq!(session.state, SelectionState::AwaitingKind);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_ttl_expiry() {
        let s = store(60, 10);
        let t0 = Instant::now();
        s.start_at(1, "https://a", t0);

        assert!(s.get_at(1, t0 + Duration::from_secs(59)).is_some());
        assert!(s.get_at(1, t0 + Duration::from_secs(200)).is_none());
        assert!(s.is_empty());
    }

    #[test]
    fn test_advance_touches_entry() {
        let s = store(60, 10);
        let t0 = Instant::now();
        s.start_at(1, "https://a", t0);
        assert!(s.advance_at(1, "https://a", SelectionState::AwaitingQuality, t0 + Duration::from_secs(50)));
        assert!(s.get_at(1, t0 + Duration::from_secs(100)).is_some());
        assert!(!s.advance_at(2, "https://a", SelectionState::AwaitingQuality, t0));
        assert!(!s.advance_at(1, "https://a", SelectionState::Resolved, t0 + Duration::from_secs(500)));
    }

    #[test]
    fn test_advance_refuses_replaced_url() {
        let s = store(60, 10);
        let t0 = Instant::now();
        s.start_at(1, "https://old", t0);
        let snapshot = s.get_at(1, t0).unwrap();

        // A new link arrives between reading the session and writing it back
        s.start_at(1, "https://new", t0);
        assert!(!s.advance_at(1, &snapshot.url, SelectionState::Resolved, t0));

        let current = s.get_at(1, t0).unwrap();
        assert_eq!(current.url, "https://new");
        assert_eq!(current.state, SelectionState::AwaitingKind);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let s = store(3600, 2);
        let t0 = Instant::now();
        s.start_at(1, "https://a", t0);
        s.start_at(2, "https://b", t0 + Duration::from_secs(1));
        s.start_at(3, "https://c", t0 + Duration::from_secs(2));

        let now = t0 + Duration::from_secs(3);
        assert_eq!(s.len(), 2);
        assert!(s.get_at(1, now).is_none());
        assert!(s.get_at(2, now).is_some());
        assert!(s.get_at(3, now).is_some());
    }

    #[test]
    fn test_evict_expired() {
        let s = store(10, 10);
        let t0 = Instant::now();
        s.start_at(1, "https://a", t0);
        s.start_at(2, "https://b", t0 + Duration::from_secs(8));
        assert_eq!(s.evict_expired_at(t0 + Duration::from_secs(15)), 1);
        assert_eq!(s.len(), 1);
    }
}
