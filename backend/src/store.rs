use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error};
use uuid::Uuid;
use shared::{models::*, validation::validate_options, PollError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Poll {0} not found")]
    NotFound(String),
    #[error("Failed to acquire store lock")]
    LockFailed,
    #[error("Invalid poll: {0}")]
    Invalid(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<StoreError> for PollError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => PollError::poll_not_found(&id),
            StoreError::Invalid(msg) => PollError::Invalid(msg),
            StoreError::LockFailed | StoreError::Database(_) => {
                PollError::StoreUnavailable(err.to_string())
            }
        }
    }
}

/// Persistence for polls. Implementations only store and load whole polls;
/// serializing concurrent edits is the caller's job.
#[rocket::async_trait]
pub trait PollStore: Send + Sync {
    async fn get_poll(&self, id: &str) -> Result<Poll, StoreError>;

    /// Overwrites an existing poll. Fails with `NotFound` rather than inserting.
    async fn save_poll(&self, poll: &Poll) -> Result<(), StoreError>;

    async fn create_poll(&self, options: Vec<PollOption>) -> Result<Poll, StoreError>;

    async fn delete_poll(&self, id: &str) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError>;
}

pub(crate) fn new_poll_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub(crate) fn check_options(options: &[PollOption]) -> Result<(), StoreError> {
    validate_options(options).map_err(|e| StoreError::Invalid(e.to_string()))
}

/// Volatile store backed by a process-local map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    polls: Mutex<HashMap<String, Poll>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given polls, keyed by their ids.
    pub fn with_polls(polls: impl IntoIterator<Item = Poll>) -> Self {
        Self {
            polls: Mutex::new(polls.into_iter().map(|p| (p.id.clone(), p)).collect()),
        }
    }

    fn polls(&self) -> Result<MutexGuard<'_, HashMap<String, Poll>>, StoreError> {
        self.polls.lock().map_err(|e| {
            error!("Memory store lock poisoned: {}", e);
            StoreError::LockFailed
        })
    }
}

#[rocket::async_trait]
impl PollStore for MemoryStore {
    async fn get_poll(&self, id: &str) -> Result<Poll, StoreError> {
        self.polls()?
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        let mut polls = self.polls()?;
        match polls.get_mut(&poll.id) {
            Some(stored) => {
                *stored = poll.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(poll.id.clone())),
        }
    }

    async fn create_poll(&self, options: Vec<PollOption>) -> Result<Poll, StoreError> {
        check_options(&options)?;
        let poll = Poll::new(new_poll_id(), options);
        self.polls()?.insert(poll.id.clone(), poll.clone());
        debug!("Created poll {} in memory", poll.id);
        Ok(poll)
    }

    async fn delete_poll(&self, id: &str) -> Result<(), StoreError> {
        self.polls()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
