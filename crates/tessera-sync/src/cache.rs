//! Reflection cache
//!
//! Locally held copy of last-confirmed ledger values: account → current file
//! and artifact id → snapshot. It is written only with values read from the
//! ledger or confirmed by a receipt, always as whole-value replacements.
//!
//! Every entry is tagged with the block number it reflects. A write tagged
//! with an older block than the current entry is ignored, so a slow
//! read-through cannot overwrite a newer confirmed value.
//!
//! The cache also holds the per-account registration slots, so sessions
//! opened over the same cache serialize registrations for one account.

use dashmap::{DashMap, DashSet};
use dashmap::mapref::entry::Entry;
use tracing::trace;

use tessera_core::{AccountId, Artifact, ArtifactId, Cid};

#[derive(Debug, Clone)]
struct Versioned<T> {
    block: u64,
    value: T,
}

/// Replace `map[key]` unless it holds a newer block; returns the value kept
fn merge<K, T>(map: &DashMap<K, Versioned<T>>, key: K, value: T, block: u64) -> T
where
    K: std::hash::Hash + Eq,
    T: Clone,
{
    match map.entry(key) {
        Entry::Occupied(mut entry) => {
            if entry.get().block <= block {
                entry.insert(Versioned {
                    block,
                    value: value.clone(),
                });
                value
            } else {
                entry.get().value.clone()
            }
        }
        Entry::Vacant(entry) => {
            entry.insert(Versioned {
                block,
                value: value.clone(),
            });
            value
        }
    }
}

/// Shared read-through reflection of ledger state
///
/// Safe to share between sessions of different accounts behind an `Arc`.
#[derive(Debug, Default)]
pub struct ReflectionCache {
    /// `None` value: the ledger reported no file for the account
    files: DashMap<AccountId, Versioned<Option<Cid>>>,
    artifacts: DashMap<ArtifactId, Versioned<Artifact>>,
    /// Accounts with a registration in flight
    registering: DashSet<AccountId>,
}

impl ReflectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached file of `account`
    ///
    /// `None` if the account was never observed; `Some(None)` if the ledger
    /// reported no file set.
    pub fn file(&self, account: &AccountId) -> Option<Option<Cid>> {
        self.files.get(account).map(|entry| entry.value.clone())
    }

    /// Record the file of `account` as of `block`
    ///
    /// The empty sentinel is stored as "no file". Returns the value held
    /// after the merge.
    pub fn put_file(&self, account: AccountId, cid: Cid, block: u64) -> Option<Cid> {
        let cid = cid.into_option();
        trace!(account = %account.short_id(), block, "Reflect file");
        merge(&self.files, account, cid, block)
    }

    pub fn artifact(&self, id: ArtifactId) -> Option<Artifact> {
        self.artifacts.get(&id).map(|entry| entry.value.clone())
    }

    /// Record an artifact snapshot as of `block`; returns the snapshot kept
    pub fn put_artifact(&self, artifact: Artifact, block: u64) -> Artifact {
        trace!(artifact = %artifact.id, block, "Reflect artifact");
        merge(&self.artifacts, artifact.id, artifact, block)
    }

    /// Drop a snapshot so the next read goes to the ledger
    pub fn invalidate_artifact(&self, id: ArtifactId) {
        self.artifacts.remove(&id);
    }

    /// Every cached snapshot, ordered by id
    pub fn artifacts(&self) -> Vec<Artifact> {
        let mut all: Vec<Artifact> = self
            .artifacts
            .iter()
            .map(|entry| entry.value().value.clone())
            .collect();
        all.sort_by_key(|artifact| artifact.id);
        all
    }

    /// Block a cached file entry reflects
    pub fn file_block(&self, account: &AccountId) -> Option<u64> {
        self.files.get(account).map(|entry| entry.block)
    }

    /// Take the registration slot of `account`; `false` if already taken
    pub fn claim_registration(&self, account: AccountId) -> bool {
        self.registering.insert(account)
    }

    pub fn release_registration(&self, account: &AccountId) {
        self.registering.remove(account);
    }

    pub fn is_registering(&self, account: &AccountId) -> bool {
        self.registering.contains(account)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn artifact(id: u64, tally: i64) -> Artifact {
        Artifact {
            id: ArtifactId(id),
            owner: AccountId::from_label("owner"),
            cid: Cid::new("art"),
            comments: Vec::new(),
            vote_tally: tally,
            voters: BTreeSet::new(),
        }
    }

    #[test]
    fn test_unknown_account_is_a_miss() {
        let cache = ReflectionCache::new();
        assert_eq!(cache.file(&AccountId::from_label("a")), None);
    }

    #[test]
    fn test_sentinel_stored_as_absent() {
        let cache = ReflectionCache::new();
        let account = AccountId::from_label("a");

        let kept = cache.put_file(account, Cid::empty(), 1);
        assert_eq!(kept, None);
        assert_eq!(cache.file(&account), Some(None));
    }

    #[test]
    fn test_older_block_is_ignored() {
        let cache = ReflectionCache::new();
        let account = AccountId::from_label("a");

        cache.put_file(account, Cid::new("new"), 5);
        let kept = cache.put_file(account, Cid::new("old"), 3);
        assert_eq!(kept, Some(Cid::new("new")));
        assert_eq!(cache.file(&account), Some(Some(Cid::new("new"))));
        assert_eq!(cache.file_block(&account), Some(5));

        // Same block re-read is accepted
        cache.put_file(account, Cid::new("new2"), 5);
        assert_eq!(cache.file(&account), Some(Some(Cid::new("new2"))));
    }

    #[test]
    fn test_artifact_snapshots() {
        let cache = ReflectionCache::new();
        cache.put_artifact(artifact(1, 2), 4);
        cache.put_artifact(artifact(0, 0), 4);

        let kept = cache.put_artifact(artifact(1, -1), 2);
        assert_eq!(kept.vote_tally, 2);

        let ids: Vec<u64> = cache.artifacts().iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec![0, 1]);

        cache.invalidate_artifact(ArtifactId(1));
        assert!(cache.artifact(ArtifactId(1)).is_none());
    }

    #[test]
    fn test_registration_slot_per_account() {
        let cache = ReflectionCache::new();
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");

        assert!(cache.claim_registration(alice));
        assert!(!cache.claim_registration(alice));
        assert!(cache.claim_registration(bob));
        assert!(cache.is_registering(&alice));

        cache.release_registration(&alice);
        assert!(!cache.is_registering(&alice));
        assert!(cache.claim_registration(alice));
    }
}
