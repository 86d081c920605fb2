//! Contract state machine
//!
//! The rules every ledger implementation in this crate enforces: one file
//! record per account, artifacts with append-only comments, and one vote per
//! `(artifact, account)` pair where a new vote replaces the old one.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use tessera_core::{AccountId, Artifact, ArtifactId, Cid, Comment, LedgerError, TxHash, VoteValue};

/// A state-changing contract call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCall {
    SetFile { cid: Cid },
    AddArtifact { cid: Cid },
    AddComment { artifact: ArtifactId, cid: Cid },
    Vote { artifact: ArtifactId, value: VoteValue },
}

impl ContractCall {
    /// Contract method name, for logging
    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::SetFile { .. } => "setFile",
            ContractCall::AddArtifact { .. } => "addArtifact",
            ContractCall::AddComment { .. } => "addComment",
            ContractCall::Vote { .. } => "vote",
        }
    }

    /// Deterministic transaction hash for `signer` at `nonce`
    pub fn tx_hash(&self, signer: &AccountId, nonce: u64) -> TxHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(signer.as_bytes());
        hasher.update(&nonce.to_le_bytes());
        // Encoding a plain enum of strings and integers cannot fail
        if let Ok(encoded) = postcard::to_allocvec(self) {
            hasher.update(&encoded);
        }
        TxHash(*hasher.finalize().as_bytes())
    }
}

/// Stored form of an artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub owner: AccountId,
    pub cid: Cid,
    pub comments: Vec<Comment>,
    pub votes: BTreeMap<AccountId, VoteValue>,
}

impl ArtifactRecord {
    pub fn new(owner: AccountId, cid: Cid) -> Self {
        Self {
            owner,
            cid,
            comments: Vec::new(),
            votes: BTreeMap::new(),
        }
    }

    pub fn add_comment(&mut self, author: AccountId, cid: Cid) {
        self.comments.push(Comment { cid, author });
    }

    /// Record `voter`'s vote, replacing any earlier one
    pub fn cast_vote(&mut self, voter: AccountId, value: VoteValue) {
        self.votes.insert(voter, value);
    }

    /// Sum of the latest vote of each account
    pub fn tally(&self) -> i64 {
        self.votes.values().map(|v| v.weight()).sum()
    }

    /// Materialise the public view of this record
    pub fn to_artifact(&self, id: ArtifactId) -> Artifact {
        Artifact {
            id,
            owner: self.owner,
            cid: self.cid.clone(),
            comments: self.comments.clone(),
            vote_tally: self.tally(),
            voters: self.votes.keys().copied().collect(),
        }
    }
}

/// Full contract state
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContractState {
    files: HashMap<AccountId, Cid>,
    artifacts: Vec<ArtifactRecord>,
}

impl ContractState {
    pub fn new() -> Self {
        Self::default()
    }

    /// File of `account`, or the empty sentinel
    pub fn file(&self, account: &AccountId) -> Cid {
        self.files.get(account).cloned().unwrap_or_else(Cid::empty)
    }

    pub fn artifact(&self, id: ArtifactId) -> Result<Artifact, LedgerError> {
        self.record(id).map(|record| record.to_artifact(id))
    }

    /// All artifacts in creation order
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts
            .iter()
            .enumerate()
            .map(|(index, record)| record.to_artifact(ArtifactId(index as u64)))
            .collect()
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    fn record(&self, id: ArtifactId) -> Result<&ArtifactRecord, LedgerError> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.artifacts.get(index))
            .ok_or(LedgerError::ArtifactNotFound(id))
    }

    fn record_mut(&mut self, id: ArtifactId) -> Result<&mut ArtifactRecord, LedgerError> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.artifacts.get_mut(index))
            .ok_or(LedgerError::ArtifactNotFound(id))
    }

    /// Execute a call on behalf of `signer`
    ///
    /// Returns the new artifact id for `AddArtifact`. A failed call leaves
    /// the state untouched.
    pub fn apply(
        &mut self,
        signer: AccountId,
        call: &ContractCall,
    ) -> Result<Option<ArtifactId>, LedgerError> {
        match call {
            ContractCall::SetFile { cid } => {
                self.files.insert(signer, cid.clone());
                Ok(None)
            }
            ContractCall::AddArtifact { cid } => {
                let id = ArtifactId(self.artifacts.len() as u64);
                self.artifacts.push(ArtifactRecord::new(signer, cid.clone()));
                Ok(Some(id))
            }
            ContractCall::AddComment { artifact, cid } => {
                self.record_mut(*artifact)?.add_comment(signer, cid.clone());
                Ok(None)
            }
            ContractCall::Vote { artifact, value } => {
                self.record_mut(*artifact)?.cast_vote(signer, *value);
                Ok(None)
            }
        }
    }
}
