//! In-memory conversation sessions
//!
//! Sessions live in a [`DashMap`] keyed by id, each behind its own
//! `parking_lot::Mutex`. The mutex is only taken to append turns, snapshot
//! history or move the phase, and never across an `.await`, so turns on
//! different sessions never contend.
//!
//! Expiry is driven by inactivity (`ttl`). Expired, evicted and explicitly
//! ended ids are tombstoned so a client reusing one gets `SessionExpired`
//! instead of a silently fresh conversation. A tombstone is written before its
//! session is removed. Tombstones are bounded by age and by count, oldest
//! forgotten first.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voice_providers::{Speaker, Turn};

use crate::config::SessionConfig;

/// Longest client-supplied session id accepted
pub const MAX_SESSION_ID_CHARS: usize = 128;

/// Where a conversation is in its listen/think/speak cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Started,
    Listening,
    Thinking,
    Speaking,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session '{0}' has expired")]
    Expired(String),

    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("invalid session id: {0}")]
    InvalidId(String),
}

#[derive(Debug)]
pub struct ConversationSession {
    id: String,
    turns: VecDeque<Turn>,
    phase: TurnPhase,
    created_at: DateTime<Utc>,
    last_activity: Instant,
    max_turns: usize,
    doctor_summary: Option<String>,
}

impl ConversationSession {
    fn new(id: String, max_turns: usize) -> Self {
        Self {
            id,
            turns: VecDeque::new(),
            phase: TurnPhase::Started,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            max_turns,
            doctor_summary: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: TurnPhase) {
        self.phase = phase;
        self.touch();
    }

    /// Append a turn, dropping the oldest beyond the history bound
    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
        self.touch();
    }

    /// The most recent `limit` turns, oldest first
    pub fn recent(&self, limit: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(limit);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn history(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Hand-over summary recorded when the pre-screening closed
    pub fn doctor_summary(&self) -> Option<&str> {
        self.doctor_summary.as_deref()
    }

    pub fn set_doctor_summary(&mut self, summary: String) {
        self.doctor_summary = Some(summary);
    }

    /// Clear history and return how many turns were dropped
    pub fn clear(&mut self) -> usize {
        let cleared = self.turns.len();
        self.turns.clear();
        self.doctor_summary = None;
        self.phase = TurnPhase::Started;
        self.touch();
        cleared
    }

    pub fn message_count(&self) -> usize {
        self.turns.len()
    }

    pub fn count_by(&self, speaker: Speaker) -> usize {
        self.turns.iter().filter(|turn| turn.speaker == speaker).count()
    }

    pub fn idle_for(&self) -> std::time::Duration {
        self.last_activity.elapsed()
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            message_count: self.message_count(),
            user_messages: self.count_by(Speaker::User),
            ai_messages: self.count_by(Speaker::Agent),
            phase: self.phase,
            screening_complete: self.doctor_summary.is_some(),
            created_at: self.created_at,
            idle_seconds: self.idle_for().as_secs(),
        }
    }
}

/// Listing entry for `GET /v1/vaanga-pesalam/sessions`
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: usize,
    pub user_messages: usize,
    pub ai_messages: usize,
    pub phase: TurnPhase,
    pub screening_complete: bool,
    pub created_at: DateTime<Utc>,
    pub idle_seconds: u64,
}

pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// Handle returned by [`SessionStore::get_or_create`]
pub struct SessionHandle {
    pub id: String,
    pub session: SharedSession,
    pub created: bool,
}

pub struct SessionStore {
    sessions: DashMap<String, SharedSession>,
    tombstones: DashMap<String, Instant>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            tombstones: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    /// Look up a live session, creating it when the id is new.
    ///
    /// `None` creates a session under a fresh UUID. A tombstoned or idle-expired
    /// id fails with [`SessionError::Expired`].
    pub fn get_or_create(&self, requested: Option<&str>) -> Result<SessionHandle, SessionError> {
        let id = match requested.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                validate_id(id)?;
                id.to_string()
            }
            None => Uuid::new_v4().to_string(),
        };

        if self.is_tombstoned(&id) {
            return Err(SessionError::Expired(id));
        }

        if let Some(session) = self.live(&id)? {
            return Ok(SessionHandle { id, session, created: false });
        }

        // Tombstones are written while the session's shard is locked, so the
        // vacant check below cannot interleave with an end or an expiry.
        let (session, created) = match self.sessions.entry(id.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                if self.is_tombstoned(&id) {
                    return Err(SessionError::Expired(id));
                }
                let session = Arc::new(Mutex::new(ConversationSession::new(id.clone(), self.config.max_turns)));
                entry.insert(Arc::clone(&session));
                (session, true)
            }
        };

        if created {
            self.enforce_capacity(&id);
            debug!(session_id = %id, active_sessions = self.sessions.len(), "Session created");
        }
        Ok(SessionHandle { id, session, created })
    }

    /// Existing session by id, without creating one
    pub fn get(&self, id: &str) -> Result<SharedSession, SessionError> {
        if self.is_tombstoned(id) {
            return Err(SessionError::Expired(id.to_string()));
        }
        self.live(id)?.ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Clear a session's history
    pub fn reset(&self, id: &str) -> Result<usize, SessionError> {
        let session = self.get(id)?;
        let cleared = session.lock().clear();
        info!(session_id = %id, cleared_turns = cleared, "Session reset");
        Ok(cleared)
    }

    /// End a session explicitly and tombstone its id
    pub fn end(&self, id: &str) -> Result<(), SessionError> {
        if self.is_tombstoned(id) {
            return Err(SessionError::Expired(id.to_string()));
        }
        if !self.retire_if(id, |_| true) {
            return Err(SessionError::NotFound(id.to_string()));
        }
        self.trim_tombstones();
        info!(session_id = %id, "Session ended");
        Ok(())
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|entry| entry.value().lock().summary())
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// Expire idle sessions and forget old tombstones; returns sessions expired
    pub fn sweep(&self) -> usize {
        let ttl = self.config.ttl;
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().lock().idle_for() >= ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let removed = expired
            .iter()
            .filter(|id| self.retire_if(id, |session| session.lock().idle_for() >= ttl))
            .count();

        let tombstone_ttl = self.config.tombstone_ttl;
        self.tombstones.retain(|_, ended_at| ended_at.elapsed() < tombstone_ttl);
        self.trim_tombstones();

        if removed > 0 {
            info!(
                expired_sessions = removed,
                active_sessions = self.sessions.len(),
                tombstones = self.tombstones.len(),
                "Session sweep completed"
            );
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) on the configured interval until the runtime stops
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(store.config.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                store.sweep();
            }
        })
    }

    fn live(&self, id: &str) -> Result<Option<SharedSession>, SessionError> {
        let session = match self.sessions.get(id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };

        let ttl = self.config.ttl;
        if session.lock().idle_for() < ttl {
            return Ok(Some(session));
        }

        if self.retire_if(id, |current| current.lock().idle_for() >= ttl) {
            self.trim_tombstones();
            debug!(session_id = %id, "Session expired on access");
            return Err(SessionError::Expired(id.to_string()));
        }
        // Touched or retired by someone else in the meantime
        if self.is_tombstoned(id) {
            return Err(SessionError::Expired(id.to_string()));
        }
        Ok(self.sessions.get(id).map(|entry| entry.value().clone()))
    }

    /// Remove the session when `condition` holds, tombstoning its id first.
    ///
    /// Both happen under the session's shard lock, so no reader ever sees the
    /// id neither live nor tombstoned.
    fn retire_if(&self, id: &str, condition: impl FnOnce(&SharedSession) -> bool) -> bool {
        self.sessions
            .remove_if(id, |_, session| {
                let retire = condition(session);
                if retire {
                    self.tombstones.insert(id.to_string(), Instant::now());
                }
                retire
            })
            .is_some()
    }

    fn is_tombstoned(&self, id: &str) -> bool {
        match self.tombstones.get(id).map(|ended_at| ended_at.elapsed()) {
            Some(age) if age < self.config.tombstone_ttl => true,
            Some(_) => {
                self.tombstones.remove(id);
                false
            }
            None => false,
        }
    }

    /// Forget the oldest tombstones once over the count bound.
    ///
    /// Trims a tenth below the bound so churn at capacity does not rescan the
    /// map on every eviction.
    fn trim_tombstones(&self) {
        let bound = self.config.max_tombstones;
        if self.tombstones.len() <= bound {
            return;
        }

        let mut by_age: Vec<(String, Instant)> = self
            .tombstones
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        by_age.sort_by_key(|(_, ended_at)| *ended_at);

        let keep = bound.saturating_sub(bound / 10);
        let excess = by_age.len().saturating_sub(keep);
        for (id, _) in by_age.into_iter().take(excess) {
            self.tombstones.remove(&id);
        }
        debug!(forgotten = excess, tombstones = self.tombstones.len(), "Tombstones trimmed");
    }

    /// Evict least recently active sessions until back under `max_sessions`.
    ///
    /// Runs after the insert, so concurrent creators each trim what they
    /// added and the bound holds once they return.
    fn enforce_capacity(&self, keep: &str) {
        if self.sessions.len() <= self.config.max_sessions {
            return;
        }
        self.sweep();

        while self.sessions.len() > self.config.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .filter(|entry| entry.key() != keep)
                .map(|entry| (entry.key().clone(), entry.value().lock().idle_for()))
                .max_by_key(|(_, idle)| *idle)
                .map(|(id, _)| id);

            let Some(id) = oldest else { break };
            if self.retire_if(&id, |_| true) {
                warn!(
                    session_id = %id,
                    max_sessions = self.config.max_sessions,
                    "Session capacity reached, evicted least recently active session"
                );
            }
        }
        self.trim_tombstones();
    }
}

fn validate_id(id: &str) -> Result<(), SessionError> {
    if id.chars().count() > MAX_SESSION_ID_CHARS {
        return Err(SessionError::InvalidId(format!(
            "must be at most {MAX_SESSION_ID_CHARS} characters"
        )));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')) {
        return Err(SessionError::InvalidId(
            "only letters, digits, '-', '_', '.' and ':' are allowed".to_string(),
        ));
    }
    Ok(())
}
