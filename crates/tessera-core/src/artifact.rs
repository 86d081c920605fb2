//! Session artifacts, comments, and votes

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cid::Cid;
use crate::error::InvalidVoteValue;
use crate::identity::AccountId;

/// Ledger-assigned artifact identifier, monotonic in creation order
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub u64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Debug for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtifactId({})", self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(ArtifactId)
    }
}

/// A comment appended to exactly one artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub cid: Cid,
    pub author: AccountId,
}

/// A vote in the closed range {-1, 0, 1}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteValue {
    Down,
    Neutral,
    Up,
}

impl VoteValue {
    /// Contribution of this vote to a tally
    pub fn weight(self) -> i64 {
        match self {
            VoteValue::Down => -1,
            VoteValue::Neutral => 0,
            VoteValue::Up => 1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = InvalidVoteValue;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(VoteValue::Down),
            0 => Ok(VoteValue::Neutral),
            1 => Ok(VoteValue::Up),
            other => Err(InvalidVoteValue(other)),
        }
    }
}

impl fmt::Display for VoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.weight())
    }
}

/// Ledger snapshot of a session artifact
///
/// `comments` only ever grows, and `vote_tally` counts the latest vote of
/// each account in `voters` exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub owner: AccountId,
    pub cid: Cid,
    pub comments: Vec<Comment>,
    pub vote_tally: i64,
    pub voters: BTreeSet<AccountId>,
}

impl Artifact {
    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    pub fn has_voted(&self, account: &AccountId) -> bool {
        self.voters.contains(account)
    }
}
