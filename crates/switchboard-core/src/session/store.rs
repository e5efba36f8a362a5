//! Session store
//!
//! The outer index is a `DashMap`, so lookups and inserts on different
//! sessions never contend. Each entry carries its own `tokio::sync::Mutex`;
//! holding it is what serializes turns on one session.
//!
//! Evicted sessions are indistinguishable from sessions that never existed:
//! every operation on them fails with `SessionNotFound`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agent::AgentId;
use crate::ai::types::ConversationItem;
use crate::error::{Error, Result};

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Conversation state of one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// The transcript, in order
    pub conversation_items: Vec<ConversationItem>,
    /// Agent responsible for the next turn
    pub last_agent: AgentId,
}

impl SessionState {
    fn new(initial_agent: AgentId) -> Self {
        Self {
            conversation_items: Vec::new(),
            last_agent: initial_agent,
        }
    }
}

/// Eviction policy
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Sessions idle longer than this are removed by `evict_expired`
    pub idle_ttl: Duration,
    /// Least recently active sessions are removed once this is exceeded
    pub max_entries: usize,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            idle_ttl: DEFAULT_IDLE_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

struct SessionEntry {
    state: Arc<Mutex<SessionState>>,
    /// Milliseconds since the store epoch
    last_active: AtomicU64,
}

type SessionIndex = DashMap<String, Arc<SessionEntry>>;

/// Concurrency-safe session index. Cheap to clone; clones share sessions.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<SessionIndex>,
    config: SessionStoreConfig,
    epoch: Instant,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionStoreConfig::default())
    }
}

impl SessionStore {
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            config: SessionStoreConfig {
                max_entries: config.max_entries.max(1),
                ..config
            },
            epoch: Instant::now(),
        }
    }

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn entry(&self, session_id: &str) -> Result<Arc<SessionEntry>> {
        self.sessions
            .get(session_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    fn touch(&self, entry: &SessionEntry) {
        entry.last_active.store(self.now_millis(), Ordering::Relaxed);
    }

    /// Create a session with an empty history owned by `initial_agent`.
    pub fn create(&self, initial_agent: AgentId) -> String {
        let session_id = Uuid::new_v4().to_string();
        let entry = Arc::new(SessionEntry {
            state: Arc::new(Mutex::new(SessionState::new(initial_agent))),
            last_active: AtomicU64::new(self.now_millis()),
        });
        self.sessions.insert(session_id.clone(), entry);
        debug!(session_id = %session_id, "Session created");

        if self.sessions.len() > self.config.max_entries {
            self.evict_over_capacity(&session_id);
        }
        session_id
    }

    /// Snapshot of the committed state. Waits for an in-flight turn to end.
    pub async fn get(&self, session_id: &str) -> Result<SessionState> {
        let entry = self.entry(session_id)?;
        let state = entry.state.lock().await.clone();
        Ok(state)
    }

    /// Replace history and agent together.
    pub async fn update(
        &self,
        session_id: &str,
        conversation_items: Vec<ConversationItem>,
        last_agent: AgentId,
    ) -> Result<()> {
        let turn = self.lock(session_id).await?;
        turn.commit(conversation_items, last_agent)
    }

    /// Take exclusive hold of a session until the returned turn is committed
    /// or dropped. Waits while another turn holds it.
    pub async fn lock(&self, session_id: &str) -> Result<SessionTurn> {
        let entry = self.entry(session_id)?;
        let guard = entry.state.clone().lock_owned().await;
        self.touch(&entry);
        Ok(SessionTurn {
            session_id: session_id.to_string(),
            entry,
            guard,
            sessions: self.sessions.clone(),
            epoch: self.epoch,
        })
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove sessions idle longer than `idle_ttl`. Sessions in use are kept.
    pub fn evict_expired(&self) -> usize {
        let ttl = u64::try_from(self.config.idle_ttl.as_millis()).unwrap_or(u64::MAX);
        let now = self.now_millis();
        let before = self.sessions.len();

        self.sessions.retain(|_, entry| {
            let idle = now.saturating_sub(entry.last_active.load(Ordering::Relaxed));
            idle < ttl || Arc::strong_count(entry) > 1
        });

        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            info!(evicted, remaining = self.sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Drop the least recently active unlocked sessions, never `keep`.
    fn evict_over_capacity(&self, keep: &str) {
        let excess = self.sessions.len().saturating_sub(self.config.max_entries);
        if excess == 0 {
            return;
        }

        let mut idle: Vec<(String, u64)> = self
            .sessions
            .iter()
            .filter(|e| e.key() != keep && Arc::strong_count(e.value()) == 1)
            .map(|e| (e.key().clone(), e.value().last_active.load(Ordering::Relaxed)))
            .collect();
        idle.sort_by_key(|(_, last_active)| *last_active);

        let mut evicted = 0;
        for (session_id, _) in idle.into_iter().take(excess) {
            if self
                .sessions
                .remove_if(&session_id, |_, entry| Arc::strong_count(entry) == 1)
                .is_some()
            {
                evicted += 1;
            }
        }
        info!(evicted, "Session store over capacity");
    }

    /// Run `evict_expired` every `interval` until the handle is aborted.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.evict_expired();
            }
        })
    }
}

/// Exclusive hold on one session for the duration of a turn.
///
/// Dropping it without `commit` leaves the session unchanged.
pub struct SessionTurn {
    session_id: String,
    entry: Arc<SessionEntry>,
    guard: OwnedMutexGuard<SessionState>,
    sessions: Arc<SessionIndex>,
    epoch: Instant,
}

impl SessionTurn {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Committed state at the time the hold was taken
    pub fn state(&self) -> &SessionState {
        &self.guard
    }

    /// Replace history and agent, then release the session. Fails if the
    /// session was removed while held.
    pub fn commit(
        mut self,
        conversation_items: Vec<ConversationItem>,
        last_agent: AgentId,
    ) -> Result<()> {
        let indexed = self
            .sessions
            .get(&self.session_id)
            .is_some_and(|e| Arc::ptr_eq(e.value(), &self.entry));
        if !indexed {
            return Err(Error::SessionNotFound(self.session_id.clone()));
        }

        *self.guard = SessionState {
            conversation_items,
            last_agent,
        };
        self.entry
            .last_active
            .store(self.epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::ModelMessage;

    const TRIAGE: AgentId = AgentId(0);
    const MATH: AgentId = AgentId(1);

    #[tokio::test]
    async fn test_create_starts_empty_with_initial_agent() {
        let store = SessionStore::default();
        let id = store.create(TRIAGE);

        let state = store.get(&id).await.unwrap();
        assert!(state.conversation_items.is_empty());
        assert_eq!(state.last_agent, TRIAGE);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::default();
        let a = store.create(TRIAGE);
        let b = store.create(TRIAGE);
        assert_ne!(a, b);

        store
            .update(&a, vec![ModelMessage::user("hi")], MATH)
            .await
            .unwrap();

        let untouched = store.get(&b).await.unwrap();
        assert!(untouched.conversation_items.is_empty());
        assert_eq!(untouched.last_agent, TRIAGE);

        let updated = store.get(&a).await.unwrap();
        assert_eq!(updated.conversation_items.len(), 1);
        assert_eq!(updated.last_agent, MATH);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let store = SessionStore::default();
        assert!(matches!(
            store.get("missing").await,
            Err(Error::SessionNotFound(id)) if id == "missing"
        ));
        assert!(matches!(
            store.update("missing", Vec::new(), TRIAGE).await,
            Err(Error::SessionNotFound(_))
        ));
        assert!(store.lock("missing").await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_commit_after_removal_fails() {
        let store = SessionStore::default();
        let id = store.create(TRIAGE);

        let turn = store.lock(&id).await.unwrap();
        assert!(store.remove(&id));
        assert!(matches!(
            turn.commit(vec![ModelMessage::user("late")], MATH),
            Err(Error::SessionNotFound(_))
        ));
        assert!(store.get(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_dropped_turn_leaves_state_unchanged() {
        let store = SessionStore::default();
        let id = store.create(TRIAGE);
        {
            let turn = store.lock(&id).await.unwrap();
            assert_eq!(turn.session_id(), id);
            assert_eq!(turn.state().last_agent, TRIAGE);
        }
        assert_eq!(store.get(&id).await.unwrap().last_agent, TRIAGE);
    }

    #[tokio::test]
    async fn test_turns_on_one_session_are_serialized() {
        let store = SessionStore::default();
        let id = store.create(TRIAGE);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let turn = store.lock(&id).await.unwrap();
                let mut items = turn.state().conversation_items.clone();
                tokio::task::yield_now().await;
                items.push(ModelMessage::user(format!("turn {i}")));
                turn.commit(items, TRIAGE).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get(&id).await.unwrap().conversation_items.len(), 16);
    }

    #[tokio::test]
    async fn test_evict_expired_skips_sessions_in_use() {
        let store = SessionStore::new(SessionStoreConfig {
            idle_ttl: Duration::from_millis(20),
            max_entries: 100,
        });
        let idle = store.create(TRIAGE);
        let busy = store.create(TRIAGE);
        let turn = store.lock(&busy).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.evict_expired(), 1);
        assert!(!store.contains(&idle));
        assert!(store.contains(&busy));

        turn.commit(Vec::new(), MATH).unwrap();
        assert_eq!(store.get(&busy).await.unwrap().last_agent, MATH);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_active() {
        let store = SessionStore::new(SessionStoreConfig {
            idle_ttl: Duration::from_secs(3600),
            max_entries: 2,
        });
        let oldest = store.create(TRIAGE);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let middle = store.create(TRIAGE);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newest = store.create(TRIAGE);

        assert_eq!(store.len(), 2);
        assert!(!store.contains(&oldest));
        assert!(store.contains(&middle));
        assert!(store.contains(&newest));
    }

    #[tokio::test]
    async fn test_sweeper_evicts_in_background() {
        let store = SessionStore::new(SessionStoreConfig {
            idle_ttl: Duration::from_millis(10),
            max_entries: 100,
        });
        let id = store.create(TRIAGE);
        let sweeper = store.spawn_sweeper(Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!store.contains(&id));
        sweeper.abort();
    }
}
