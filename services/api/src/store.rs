//! Conversation State Store
//!
//! A process-wide map from conversation id to session state. Each session sits
//! behind its own async mutex: whoever holds the guard owns the session for
//! the duration of a turn, so turns on one conversation run one after another
//! while different conversations proceed independently. Sessions that stay
//! idle longer than the configured time-to-live are removed by a periodic
//! sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};
use tutor_core::conversation::ConversationSession;

/// A stored session plus the time it was last worked on.
#[derive(Debug)]
pub struct SessionEntry {
    pub session: ConversationSession,
    last_active: Instant,
}

impl SessionEntry {
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

type Slot = Arc<Mutex<SessionEntry>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Slot>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Stores a new session, replacing any previous one with the same id.
    pub async fn insert(&self, session: ConversationSession) {
        let id = session.conversation_id.clone();
        let entry = SessionEntry {
            session,
            last_active: Instant::now(),
        };
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(entry)));
    }

    /// Takes exclusive ownership of a session, waiting for any turn in flight.
    ///
    /// The returned guard is the only way to mutate a stored session.
    pub async fn acquire(&self, conversation_id: &str) -> Option<OwnedMutexGuard<SessionEntry>> {
        let slot = self.sessions.read().await.get(conversation_id).cloned()?;
        let mut guard = slot.lock_owned().await;
        guard.touch();
        Some(guard)
    }

    /// A copy of the current session state.
    pub async fn snapshot(&self, conversation_id: &str) -> Option<ConversationSession> {
        let slot = self.sessions.read().await.get(conversation_id).cloned()?;
        let entry = slot.lock().await;
        Some(entry.session.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Removes every session idle for at least the time-to-live as of `now`.
    /// Sessions with a turn in flight are skipped. Returns how many were removed.
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, slot| match slot.try_lock() {
            Ok(entry) => {
                let keep = now.saturating_duration_since(entry.last_active) < self.ttl;
                if !keep {
                    debug!(conversation_id = %id, "Evicting idle session");
                }
                keep
            }
            Err(_) => true,
        });
        before - sessions.len()
    }

    /// Runs the eviction sweep every `every` until the task is dropped.
    pub async fn sweep_forever(self: Arc<Self>, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = self.evict_idle(Instant::now()).await;
            if evicted > 0 {
                let remaining = self.len().await;
                info!(evicted, remaining, "Evicted idle sessions");
            }
        }
    }
}
