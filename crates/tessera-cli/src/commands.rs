//! Command execution against a data directory

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use tessera_core::{Cid, LedgerClient};
use tessera_ledger::{RedbLedger, RedbLedgerConfig};
use tessera_storage::{BlobContentStore, BlobStoreConfig};
use tessera_sync::{Session, SyncConfig};

use crate::config::{Cli, Command, resolve_account};
use crate::display;

/// Open a session for the signing account over `cli.data_dir`.
pub async fn open_session(cli: &Cli) -> anyhow::Result<Session> {
    let store = BlobContentStore::open(BlobStoreConfig {
        base_dir: cli.data_dir.join("blobs"),
        ..Default::default()
    })
    .await
    .context("opening blob store")?;

    let ledger = RedbLedger::open(RedbLedgerConfig {
        db_path: cli.data_dir.join("ledger.redb"),
    })
    .context("opening ledger")?;
    let client: Arc<dyn LedgerClient> = Arc::new(ledger.connect(cli.signer()));

    let config = SyncConfig::default().with_gateway_base(cli.gateway.as_str());
    let session = Session::open(Arc::new(store), client, config).await?;
    debug!(account = %session.account(), "Session opened");
    Ok(session)
}

/// Run `cli.command`, writing its result to `out`.
pub async fn run(cli: &Cli, out: &mut impl Write) -> anyhow::Result<()> {
    if let Command::Gateway { cid } = &cli.command {
        // No data directory needed
        writeln!(out, "{}", Cid::new(cid.as_str()).gateway_url(&cli.gateway))?;
        return Ok(());
    }

    let session = open_session(cli).await?;
    let text = match &cli.command {
        Command::Register { path, name } => {
            let (payload, name) = read_payload(path, name.as_deref()).await?;
            let registration = session.register_file(payload, &name).await?;
            display::registration(&registration, &session.gateway_url(&registration.cid))
        }
        Command::Current { of } => {
            let account = of
                .as_deref()
                .map(resolve_account)
                .unwrap_or_else(|| session.account());
            let file = session.current_file(&account).await?;
            display::current_file(
                &account,
                file.as_ref().map(|cid| (cid, session.gateway_url(cid))),
            )
        }
        Command::Add { path, on, name } => {
            let (payload, name) = read_payload(path, name.as_deref()).await?;
            let outcome = session.add_or_comment_artifact(payload, &name, *on).await?;
            display::artifact_outcome(&outcome)
        }
        Command::Vote { artifact, value } => {
            let receipt = session.submit_vote(*artifact, *value).await?;
            let artifact = session.artifact(*artifact).await?;
            display::vote(&artifact, &receipt)
        }
        Command::Artifacts => display::artifact_table(&session.list_artifacts().await?),
        Command::Show { artifact } => {
            let artifact = session.refresh_artifact(*artifact).await?;
            display::artifact_detail(&artifact, &session.gateway_url(&artifact.cid))
        }
        Command::Gateway { cid } => format!("{}\n", session.gateway_url(&Cid::new(cid.as_str()))),
    };

    out.write_all(text.as_bytes())?;
    Ok(())
}

async fn read_payload(path: &Path, name: Option<&str>) -> anyhow::Result<(Vec<u8>, String)> {
    let payload = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = name
        .map(str::to_string)
        .or_else(|| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "upload".to_string());
    Ok((payload, name))
}
