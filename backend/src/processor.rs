use std::sync::Arc;
use tracing::{debug, info, warn};
use shared::{
    models::*,
    validation::{validate_option, validate_poll, validate_vote_request, validate_voter},
    PollError, Result,
};
use crate::{hub::HubHandle, locks::LockRegistry, store::PollStore};

/// Serializes edits to a poll and publishes every committed result.
#[derive(Clone)]
pub struct PollProcessor {
    store: Arc<dyn PollStore>,
    locks: LockRegistry,
    hub: HubHandle,
}

impl PollProcessor {
    pub fn new(store: Arc<dyn PollStore>, locks: LockRegistry, hub: HubHandle) -> Self {
        Self { store, locks, hub }
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Lock-free read; may observe the state just before or after a
    /// concurrent mutation.
    pub async fn get_poll(&self, id: &str) -> Result<Poll> {
        Ok(self.store.get_poll(id).await?)
    }

    pub async fn create_poll(&self, options: Vec<PollOption>) -> Result<Poll> {
        let poll = self.store.create_poll(options).await?;
        info!("Created poll {} with {} options", poll.id, poll.options.len());
        Ok(poll)
    }

    /// Applies `edit` to the stored poll while holding the poll's lock.
    ///
    /// Nothing is written if the read or the edit fails. The new state is
    /// handed to the hub before the lock is released, so commits of one poll
    /// reach subscribers in commit order. Publishing problems are logged
    /// rather than returned.
    pub async fn mutate<F>(&self, id: &str, edit: F) -> Result<Poll>
    where
        F: FnOnce(&mut Poll) -> Result<()> + Send,
    {
        let _lock = self.locks.acquire(id).await;
        let mut poll = self.store.get_poll(id).await?;
        edit(&mut poll)?;
        self.store.save_poll(&poll).await?;

        // Only waits for mailbox space; the hub never takes poll locks.
        self.publish(poll.clone()).await;
        Ok(poll)
    }

    async fn publish(&self, poll: Poll) {
        let id = poll.id.clone();
        if let Err(e) = self.hub.broadcast(poll).await {
            warn!(poll_id = %id, "Update not published: {}", e);
        }
    }

    pub async fn add_vote(&self, id: &str, vote: &VoteRequest) -> Result<Poll> {
        validate_vote_request(vote)?;
        let poll = self
            .mutate(id, |poll| poll.add_vote(&vote.option_id, &vote.user))
            .await?;
        info!("Updated poll {} with a vote for {} for user {}", id, vote.option_id, vote.user);
        Ok(poll)
    }

    pub async fn clear_votes_for(&self, id: &str, voter: &str) -> Result<Poll> {
        validate_voter(voter)?;
        let poll = self
            .mutate(id, |poll| {
                poll.clear_votes_for(voter);
                Ok(())
            })
            .await?;
        info!("Cleared votes for user {} in poll {}", voter, id);
        Ok(poll)
    }

    pub async fn add_option(&self, id: &str, option: PollOption) -> Result<Poll> {
        validate_option(&option)?;
        let option_id = option.id.clone();
        let poll = self.mutate(id, |poll| poll.add_option(option)).await?;
        info!("Added option {} to poll {}", option_id, id);
        Ok(poll)
    }

    pub async fn remove_option(&self, id: &str, option_id: &str) -> Result<Poll> {
        let poll = self
            .mutate(id, |poll| {
                poll.remove_option(option_id);
                Ok(())
            })
            .await?;
        info!("Removed option {} from poll {}", option_id, id);
        Ok(poll)
    }

    /// Overwrites a poll wholesale with client-supplied state.
    pub async fn replace_poll(&self, replacement: Poll) -> Result<Poll> {
        validate_poll(&replacement)?;
        let id = replacement.id.clone();
        let poll = self
            .mutate(&id, move |poll| {
                *poll = replacement;
                Ok(())
            })
            .await?;
        info!("Successfully updated poll with id {}", id);
        Ok(poll)
    }

    /// Deletes under the poll's lock so it cannot interleave with an edit.
    /// Subscribers are not notified.
    pub async fn delete_poll(&self, id: &str) -> Result<()> {
        let _lock = self.locks.acquire(id).await;
        self.store.delete_poll(id).await?;
        info!("Deleted poll {}", id);
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        debug!("Closing poll store");
        self.store
            .close()
            .await
            .map_err(|e| PollError::StoreUnavailable(e.to_string()))
    }
}
