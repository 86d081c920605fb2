//! redb-backed local ledger
//!
//! Persists the contract state so a CLI session survives restarts. Every
//! call is mined in its own block inside a single redb write transaction.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info, instrument};

use tessera_core::{
    AccountId, Artifact, ArtifactId, Cid, LedgerClient, LedgerError, PendingTx, Receipt, TxHash,
    VoteValue,
};

use crate::contract::{ArtifactRecord, ContractCall};

// Key: account bytes, Value: cid text
const FILES: TableDefinition<&[u8], &str> = TableDefinition::new("files");

// Key: artifact id, Value: postcard ArtifactRecord
const ARTIFACTS: TableDefinition<u64, &[u8]> = TableDefinition::new("artifacts");

// Key: "block" or account bytes (nonce), Value: counter
const COUNTERS: TableDefinition<&[u8], u64> = TableDefinition::new("counters");

const BLOCK_KEY: &[u8] = b"block";

fn db_err(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Unavailable(e.to_string())
}

/// Configuration for the redb ledger
#[derive(Debug, Clone)]
pub struct RedbLedgerConfig {
    /// Path to the database file
    pub db_path: PathBuf,
}

impl Default for RedbLedgerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./tessera-data/ledger.redb"),
        }
    }
}

/// Local ledger database
#[derive(Clone)]
pub struct RedbLedger {
    db: Arc<Database>,
}

impl RedbLedger {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbLedgerConfig) -> Result<Self, LedgerError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(db_err)?;
        }

        let db = Database::create(&config.db_path).map_err(db_err)?;

        let write_txn = db.begin_write().map_err(db_err)?;
        write_txn.open_table(FILES).map_err(db_err)?;
        write_txn.open_table(ARTIFACTS).map_err(db_err)?;
        write_txn.open_table(COUNTERS).map_err(db_err)?;
        write_txn.commit().map_err(db_err)?;

        info!("Opened ledger database");
        Ok(Self { db: Arc::new(db) })
    }

    /// Client that signs as `account`
    pub fn connect(&self, account: AccountId) -> RedbLedgerClient {
        RedbLedgerClient {
            ledger: self.clone(),
            account,
        }
    }

    fn block_number(&self) -> Result<u64, LedgerError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(COUNTERS).map_err(db_err)?;
        let block = table
            .get(BLOCK_KEY)
            .map_err(db_err)?
            .map(|v| v.value())
            .unwrap_or(0);
        Ok(block)
    }

    fn file(&self, account: &AccountId) -> Result<Cid, LedgerError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(FILES).map_err(db_err)?;
        let cid = table
            .get(account.as_bytes().as_slice())
            .map_err(db_err)?
            .map(|v| Cid::new(v.value()))
            .unwrap_or_else(Cid::empty);
        Ok(cid)
    }

    fn artifact(&self, id: ArtifactId) -> Result<Artifact, LedgerError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(ARTIFACTS).map_err(db_err)?;
        let bytes = table
            .get(id.0)
            .map_err(db_err)?
            .ok_or(LedgerError::ArtifactNotFound(id))?;
        let record: ArtifactRecord = postcard::from_bytes(bytes.value()).map_err(db_err)?;
        Ok(record.to_artifact(id))
    }

    fn artifacts(&self) -> Result<Vec<Artifact>, LedgerError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(ARTIFACTS).map_err(db_err)?;

        let mut artifacts = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (key, value) = entry.map_err(db_err)?;
            let record: ArtifactRecord = postcard::from_bytes(value.value()).map_err(db_err)?;
            artifacts.push(record.to_artifact(ArtifactId(key.value())));
        }
        Ok(artifacts)
    }

    /// Execute `call` in a new block
    ///
    /// The transaction hash is derived from the nonce read inside the same
    /// write transaction that mines the call. A reverted call aborts that
    /// transaction, so neither the state nor the counters change.
    #[instrument(skip(self, signer, call), fields(signer = %signer.short_id(), method = call.method()))]
    fn execute(&self, signer: AccountId, call: ContractCall) -> Result<MinedTx, LedgerError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;

        let (nonce, block_number) = {
            let counters = write_txn.open_table(COUNTERS).map_err(db_err)?;
            let nonce = counters
                .get(signer.as_bytes().as_slice())
                .map_err(db_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            let block = counters
                .get(BLOCK_KEY)
                .map_err(db_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            (nonce, block + 1)
        };
        let tx_hash = call.tx_hash(&signer, nonce);

        let result = match self.apply(&write_txn, signer, &call, nonce, block_number) {
            Ok(artifact_id) => write_txn.commit().map_err(db_err).map(|()| Receipt {
                tx_hash,
                block_number,
                artifact_id,
            }),
            Err(e) => Err(e),
        };
        if let Ok(receipt) = &result {
            debug!(tx = %receipt.tx_hash.short(), block_number, "Mined transaction");
        }
        Ok(MinedTx {
            hash: tx_hash,
            result,
        })
    }

    fn apply(
        &self,
        write_txn: &redb::WriteTransaction,
        signer: AccountId,
        call: &ContractCall,
        nonce: u64,
        block_number: u64,
    ) -> Result<Option<ArtifactId>, LedgerError> {
        let signer_key = signer.as_bytes().as_slice();
        let artifact_id = match call {
            ContractCall::SetFile { cid } => {
                let mut files = write_txn.open_table(FILES).map_err(db_err)?;
                files.insert(signer_key, cid.as_str()).map_err(db_err)?;
                None
            }
            ContractCall::AddArtifact { cid } => {
                let mut table = write_txn.open_table(ARTIFACTS).map_err(db_err)?;
                let id = table
                    .last()
                    .map_err(db_err)?
                    .map(|(key, _)| key.value() + 1)
                    .unwrap_or(0);
                let record = ArtifactRecord::new(signer, cid.clone());
                let bytes = postcard::to_allocvec(&record).map_err(db_err)?;
                table.insert(id, bytes.as_slice()).map_err(db_err)?;
                Some(ArtifactId(id))
            }
            ContractCall::AddComment { artifact, cid } => {
                self.update_record(write_txn, *artifact, |record| {
                    record.add_comment(signer, cid.clone())
                })?;
                None
            }
            ContractCall::Vote { artifact, value } => {
                self.update_record(write_txn, *artifact, |record| {
                    record.cast_vote(signer, *value)
                })?;
                None
            }
        };

        let mut counters = write_txn.open_table(COUNTERS).map_err(db_err)?;
        counters.insert(signer_key, nonce + 1).map_err(db_err)?;
        counters.insert(BLOCK_KEY, block_number).map_err(db_err)?;
        Ok(artifact_id)
    }

    fn update_record(
        &self,
        write_txn: &redb::WriteTransaction,
        id: ArtifactId,
        update: impl FnOnce(&mut ArtifactRecord),
    ) -> Result<(), LedgerError> {
        let mut table = write_txn.open_table(ARTIFACTS).map_err(db_err)?;
        let mut record: ArtifactRecord = {
            let bytes = table
                .get(id.0)
                .map_err(db_err)?
                .ok_or(LedgerError::ArtifactNotFound(id))?;
            postcard::from_bytes(bytes.value()).map_err(db_err)?
        };
        update(&mut record);
        let bytes = postcard::to_allocvec(&record).map_err(db_err)?;
        table.insert(id.0, bytes.as_slice()).map_err(db_err)?;
        Ok(())
    }
}

/// Transaction that was mined at submission
pub struct MinedTx {
    hash: TxHash,
    result: Result<Receipt, LedgerError>,
}

#[async_trait]
impl PendingTx for MinedTx {
    fn hash(&self) -> TxHash {
        self.hash
    }

    async fn confirm(self: Box<Self>) -> Result<Receipt, LedgerError> {
        self.result
    }
}

/// [`LedgerClient`] bound to one signer of a [`RedbLedger`]
#[derive(Clone)]
pub struct RedbLedgerClient {
    ledger: RedbLedger,
    account: AccountId,
}

impl RedbLedgerClient {
    fn submit(&self, call: ContractCall) -> Result<Box<dyn PendingTx>, LedgerError> {
        Ok(Box::new(self.ledger.execute(self.account, call)?))
    }
}

#[async_trait]
impl LedgerClient for RedbLedgerClient {
    fn account(&self) -> AccountId {
        self.account
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.ledger.block_number()
    }

    async fn get_file(&self, account: &AccountId) -> Result<Cid, LedgerError> {
        self.ledger.file(account)
    }

    async fn get_artifact(&self, id: ArtifactId) -> Result<Artifact, LedgerError> {
        self.ledger.artifact(id)
    }

    async fn list_artifacts(&self) -> Result<Vec<Artifact>, LedgerError> {
        self.ledger.artifacts()
    }

    async fn set_file(&self, cid: &Cid) -> Result<Box<dyn PendingTx>, LedgerError> {
        self.submit(ContractCall::SetFile { cid: cid.clone() })
    }

    async fn add_artifact(&self, cid: &Cid) -> Result<Box<dyn PendingTx>, LedgerError> {
        self.submit(ContractCall::AddArtifact { cid: cid.clone() })
    }

    async fn add_comment(
        &self,
        artifact: ArtifactId,
        cid: &Cid,
    ) -> Result<Box<dyn PendingTx>, LedgerError> {
        self.submit(ContractCall::AddComment {
            artifact,
            cid: cid.clone(),
        })
    }

    async fn vote(
        &self,
        artifact: ArtifactId,
        value: VoteValue,
    ) -> Result<Box<dyn PendingTx>, LedgerError> {
        self.submit(ContractCall::Vote { artifact, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_ledger() -> (RedbLedger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbLedgerConfig {
            db_path: temp_dir.path().join("ledger.redb"),
        };
        let ledger = RedbLedger::open(config).unwrap();
        (ledger, temp_dir)
    }

    #[tokio::test]
    async fn test_set_and_get_file() {
        let (ledger, _temp) = create_test_ledger();
        let alice = ledger.connect(AccountId::from_label("alice"));

        assert!(alice.get_file(&alice.account()).await.unwrap().is_empty_sentinel());

        let receipt = alice
            .set_file(&Cid::new("bafy123"))
            .await
            .unwrap()
            .confirm()
            .await
            .unwrap();
        assert_eq!(receipt.block_number, 1);
        assert_eq!(
            alice.get_file(&alice.account()).await.unwrap(),
            Cid::new("bafy123")
        );
    }

    #[tokio::test]
    async fn test_artifacts_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbLedgerConfig {
            db_path: temp_dir.path().join("ledger.redb"),
        };
        let alice_id = AccountId::from_label("alice");

        {
            let ledger = RedbLedger::open(config.clone()).unwrap();
            let alice = ledger.connect(alice_id);
            let receipt = alice
                .add_artifact(&Cid::new("art"))
                .await
                .unwrap()
                .confirm()
                .await
                .unwrap();
            assert_eq!(receipt.artifact_id, Some(ArtifactId(0)));
            alice
                .vote(ArtifactId(0), VoteValue::Up)
                .await
                .unwrap()
                .confirm()
                .await
                .unwrap();
        }

        let ledger = RedbLedger::open(config).unwrap();
        let alice = ledger.connect(alice_id);
        let artifacts = alice.list_artifacts().await.unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].vote_tally, 1);
        assert_eq!(alice.block_number().await.unwrap(), 2);

        let receipt = alice
            .add_artifact(&Cid::new("second"))
            .await
            .unwrap()
            .confirm()
            .await
            .unwrap();
        assert_eq!(receipt.artifact_id, Some(ArtifactId(1)));
    }

    #[tokio::test]
    async fn test_revert_changes_nothing() {
        let (ledger, _temp) = create_test_ledger();
        let alice = ledger.connect(AccountId::from_label("alice"));

        let err = alice
            .add_comment(ArtifactId(5), &Cid::new("c"))
            .await
            .unwrap()
            .confirm()
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::ArtifactNotFound(ArtifactId(5)));
        assert_eq!(alice.block_number().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_vote_replacement_is_persisted() {
        let (ledger, _temp) = create_test_ledger();
        let alice = ledger.connect(AccountId::from_label("alice"));
        let bob = ledger.connect(AccountId::from_label("bob"));

        alice
            .add_artifact(&Cid::new("art"))
            .await
            .unwrap()
            .confirm()
            .await
            .unwrap();
        for value in [VoteValue::Up, VoteValue::Down, VoteValue::Up] {
            alice
                .vote(ArtifactId(0), value)
                .await
                .unwrap()
                .confirm()
                .await
                .unwrap();
        }
        bob.vote(ArtifactId(0), VoteValue::Up)
            .await
            .unwrap()
            .confirm()
            .await
            .unwrap();

        let artifact = alice.get_artifact(ArtifactId(0)).await.unwrap();
        assert_eq!(artifact.vote_tally, 2);
        assert_eq!(artifact.voters.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pending_hash_matches_receipt_under_concurrency() {
        let (ledger, _temp) = create_test_ledger();
        let alice = ledger.connect(AccountId::from_label("alice"));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let alice = alice.clone();
                tokio::spawn(async move {
                    let pending = alice.set_file(&Cid::new(format!("cid-{i}"))).await.unwrap();
                    let hash = pending.hash();
                    (hash, pending.confirm().await.unwrap())
                })
            })
            .collect();

        let mut hashes = std::collections::HashSet::new();
        for task in tasks {
            let (hash, receipt) = task.await.unwrap();
            assert_eq!(hash, receipt.tx_hash);
            hashes.insert(hash);
        }
        assert_eq!(hashes.len(), 16);
        assert_eq!(alice.block_number().await.unwrap(), 16);
    }
}
