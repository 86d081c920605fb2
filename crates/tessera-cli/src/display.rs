//! Plain-text rendering of command results

use std::fmt::Write;

use tessera_core::{AccountId, Artifact, Cid, Receipt};
use tessera_sync::{ArtifactOutcome, Registration};

pub fn registration(registration: &Registration, link: &str) -> String {
    format!(
        "registered {}\n  tx    {}\n  block {}\n  link  {link}\n",
        registration.cid, registration.receipt.tx_hash, registration.receipt.block_number
    )
}

pub fn current_file(account: &AccountId, file: Option<(&Cid, String)>) -> String {
    match file {
        Some((cid, link)) => format!("{account}\n  file  {cid}\n  link  {link}\n"),
        None => format!("{account}\n  no file registered\n"),
    }
}

pub fn artifact_outcome(outcome: &ArtifactOutcome) -> String {
    let verb = match outcome {
        ArtifactOutcome::Created { .. } => "created artifact",
        ArtifactOutcome::Commented { .. } => "commented on artifact",
    };
    format!("{verb} {}\n{}", outcome.artifact_id(), receipt(outcome.receipt()))
}

pub fn vote(artifact: &Artifact, confirmed: &Receipt) -> String {
    format!(
        "voted on artifact {}, tally now {:+}\n{}",
        artifact.id,
        artifact.vote_tally,
        receipt(confirmed)
    )
}

pub fn receipt(receipt: &Receipt) -> String {
    format!("  tx    {}\n  block {}\n", receipt.tx_hash, receipt.block_number)
}

/// One line per artifact
pub fn artifact_table(artifacts: &[Artifact]) -> String {
    if artifacts.is_empty() {
        return "no artifacts\n".to_string();
    }
    let mut out = String::new();
    for artifact in artifacts {
        let _ = writeln!(
            out,
            "{:<6} {:>+4}  {:>3} comments  {}  {}",
            artifact.id.to_string(),
            artifact.vote_tally,
            artifact.comment_count(),
            artifact.owner.short_id(),
            artifact.cid.short(),
        );
    }
    out
}

pub fn artifact_detail(artifact: &Artifact, link: &str) -> String {
    let mut out = format!(
        "artifact {}\n  owner  {}\n  cid    {}\n  link   {link}\n  tally  {:+} from {} voters\n",
        artifact.id,
        artifact.owner,
        artifact.cid,
        artifact.vote_tally,
        artifact.voters.len(),
    );
    for (index, comment) in artifact.comments.iter().enumerate() {
        let _ = writeln!(
            out,
            "  [{index}] {} by {}",
            comment.cid,
            comment.author.short_id()
        );
    }
    out
}
