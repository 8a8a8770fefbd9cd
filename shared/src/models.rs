use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// Option key -> voter names, in the order the votes were cast.
pub type VoteMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Poll {
    pub id: String,
    #[serde(default)]
    pub votes: VoteMap,
    #[serde(default)]
    pub options: Vec<PollOption>,
}

/// A candidate choice. Options are never edited in place, only added or removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PollOption {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRequest {
    pub user: String,
    #[serde(rename = "restaurant_ID")]
    pub option_id: String,
}

impl PollOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
        }
    }
}

impl Poll {
    pub fn new(id: impl Into<String>, options: Vec<PollOption>) -> Self {
        Self {
            id: id.into(),
            votes: VoteMap::new(),
            options,
        }
    }
}
