//! Rolling per-user conversation history for the community bot.
//!
//! One session per Telegram user. A session's lock is held for the whole
//! reply (history read, completion, history write), so messages from the
//! same user are answered one at a time.

use sentinels_core::context::ContextEntry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One user's recent turns.
pub struct Session {
    entries: VecDeque<ContextEntry>,
    max_entries: usize,
    last_seen: Instant,
}

impl Session {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
            last_seen: Instant::now(),
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<ContextEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn push(&mut self, entry: ContextEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
        self.last_seen = Instant::now();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All community sessions, keyed by Telegram user id.
pub struct ConversationHistory {
    sessions: Mutex<HashMap<i64, Arc<AsyncMutex<Session>>>>,
    max_entries: usize,
    idle_ttl: Duration,
}

impl ConversationHistory {
    pub fn new(max_entries: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_entries,
            idle_ttl,
        }
    }

    /// Lock (creating if needed) the session for `user_id`.
    pub async fn lock(&self, user_id: i64) -> OwnedMutexGuard<Session> {
        let session = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                sessions
                    .entry(user_id)
                    .or_insert_with(|| Arc::new(AsyncMutex::new(Session::new(self.max_entries)))),
            )
        };
        let mut guard = session.lock_owned().await;
        guard.last_seen = Instant::now();
        guard
    }

    /// Drop sessions idle longer than the TTL. Sessions in use are kept.
    pub fn sweep(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(s) => s.last_seen.elapsed() < self.idle_ttl,
            Err(_) => true,
        });
        before - sessions.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cap_evicts_oldest() {
        let history = ConversationHistory::new(20, Duration::from_secs(60));
        {
            let mut s = history.lock(1).await;
            for i in 0..25 {
                s.push(ContextEntry::user(format!("m{i}")));
            }
            assert_eq!(s.len(), 20);
            let entries = s.entries();
            assert_eq!(entries[0].content, "m5");
            assert_eq!(entries[19].content, "m24");
        }
        // Persisted across locks.
        assert_eq!(history.lock(1).await.len(), 20);
        assert_eq!(history.lock(2).await.len(), 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let history = ConversationHistory::new(20, Duration::from_secs(60));
        let mut s = history.lock(1).await;
        s.push(ContextEntry::user("hi"));
        s.clear();
        assert_eq!(s.len(), 0);
    }

    #[tokio::test]
    async fn test_sweep_drops_idle_sessions() {
        let history = ConversationHistory::new(20, Duration::ZERO);
        drop(history.lock(1).await);
        let held = history.lock(2).await;
        assert_eq!(history.sweep(), 1);
        assert_eq!(history.session_count(), 1);
        drop(held);
    }

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let history = Arc::new(ConversationHistory::new(20, Duration::from_secs(60)));
        let guard = history.lock(7).await;
        let h = Arc::clone(&history);
        let waiter = tokio::spawn(async move { h.lock(7).await.len() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        assert_eq!(waiter.await.unwrap(), 0);
    }
}
