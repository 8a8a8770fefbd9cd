use std::collections::HashSet;
use crate::error::PollError;
use crate::models::{Poll, PollOption, VoteRequest};

pub const MAX_OPTIONS: usize = 50;
pub const MAX_OPTION_ID_LENGTH: usize = 64;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_ADDRESS_LENGTH: usize = 200;
pub const MAX_VOTER_LENGTH: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("A poll needs at least one option")]
    NoOptions,
    #[error("Too many options (maximum {MAX_OPTIONS})")]
    TooManyOptions,
    #[error("Empty option id")]
    EmptyOptionId,
    #[error("Option id exceeds maximum length of {MAX_OPTION_ID_LENGTH}")]
    OptionIdTooLong,
    #[error("Option name exceeds maximum length of {MAX_NAME_LENGTH}")]
    NameTooLong,
    #[error("Option address exceeds maximum length of {MAX_ADDRESS_LENGTH}")]
    AddressTooLong,
    #[error("Duplicate option: {0}")]
    DuplicateOption(String),
    #[error("Empty voter name")]
    EmptyVoter,
    #[error("Voter name exceeds maximum length of {MAX_VOTER_LENGTH}")]
    VoterTooLong,
    #[error("Voter {0} has more than one active vote")]
    DuplicateVoter(String),
    #[error("Votes recorded for unknown option: {0}")]
    UnknownOption(String),
}

impl From<ValidationError> for PollError {
    fn from(err: ValidationError) -> Self {
        PollError::Invalid(err.to_string())
    }
}

pub fn validate_option(option: &PollOption) -> Result<(), ValidationError> {
    if option.id.trim().is_empty() { return Err(ValidationError::EmptyOptionId); }
    if option.id.len() > MAX_OPTION_ID_LENGTH { return Err(ValidationError::OptionIdTooLong); }
    if option.name.len() > MAX_NAME_LENGTH { return Err(ValidationError::NameTooLong); }
    if option.address.len() > MAX_ADDRESS_LENGTH { return Err(ValidationError::AddressTooLong); }
    Ok(())
}

pub fn validate_options(options: &[PollOption]) -> Result<(), ValidationError> {
    if options.is_empty() { return Err(ValidationError::NoOptions); }
    if options.len() > MAX_OPTIONS { return Err(ValidationError::TooManyOptions); }

    let mut seen = HashSet::with_capacity(options.len());
    for option in options {
        validate_option(option)?;
        if !seen.insert(option.id.as_str()) {
            return Err(ValidationError::DuplicateOption(option.id.clone()));
        }
    }
    Ok(())
}

pub fn validate_vote_request(request: &VoteRequest) -> Result<(), ValidationError> {
    validate_voter(&request.user)?;
    if request.option_id.trim().is_empty() { return Err(ValidationError::EmptyOptionId); }
    Ok(())
}

pub fn validate_voter(voter: &str) -> Result<(), ValidationError> {
    if voter.trim().is_empty() { return Err(ValidationError::EmptyVoter); }
    if voter.len() > MAX_VOTER_LENGTH { return Err(ValidationError::VoterTooLong); }
    Ok(())
}

/// Checks a client-supplied replacement poll before it overwrites stored state.
pub fn validate_poll(poll: &Poll) -> Result<(), ValidationError> {
    validate_options(&poll.options)?;

    let mut voters = HashSet::new();
    for (key, names) in &poll.votes {
        if !poll.has_option(key) && !names.is_empty() {
            return Err(ValidationError::UnknownOption(key.clone()));
        }
        for name in names {
            if !voters.insert(name.as_str()) {
                return Err(ValidationError::DuplicateVoter(name.clone()));
            }
        }
    }
    Ok(())
}
