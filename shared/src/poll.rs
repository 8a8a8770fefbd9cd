//! In-memory edits applied to a working copy of a [`Poll`].
//!
//! Every method keeps the single-active-vote invariant: a voter name is
//! present in at most one option's vote list.

use crate::error::{PollError, Result};
use crate::models::{Poll, PollOption};

impl Poll {
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    /// Option key the voter currently has a vote under, if any.
    pub fn vote_of(&self, voter: &str) -> Option<&str> {
        self.votes
            .iter()
            .find(|(_, voters)| voters.iter().any(|v| v == voter))
            .map(|(key, _)| key.as_str())
    }

    pub fn total_votes(&self) -> usize {
        self.votes.values().map(Vec::len).sum()
    }

    pub fn add_option(&mut self, option: PollOption) -> Result<()> {
        if self.has_option(&option.id) {
            return Err(PollError::Invalid(format!("duplicate option id {}", option.id)));
        }
        self.options.push(option);
        Ok(())
    }

    /// Moves `voter`'s single vote to `option_id`, dropping any earlier vote.
    pub fn add_vote(&mut self, option_id: &str, voter: &str) -> Result<()> {
        if !self.has_option(option_id) {
            return Err(PollError::option_not_found(option_id));
        }
        self.clear_votes_for(voter);
        self.votes
            .entry(option_id.to_string())
            .or_default()
            .push(voter.to_string());
        Ok(())
    }

    /// Removes every vote cast by `voter`. Emptied lists keep their key.
    pub fn clear_votes_for(&mut self, voter: &str) {
        for voters in self.votes.values_mut() {
            voters.retain(|v| v != voter);
        }
    }

    /// Drops the option and the votes cast for it. Unknown ids are ignored.
    pub fn remove_option(&mut self, option_id: &str) {
        let before = self.options.len();
        self.options.retain(|o| o.id != option_id);
        if self.options.len() != before {
            self.votes.remove(option_id);
        }
    }
}
