use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tessera_core::{AccountId, ArtifactId, DEFAULT_GATEWAY};

#[derive(Debug, Parser)]
#[command(
    name = "tessera",
    about = "Register content and curate session artifacts on a local ledger"
)]
pub struct Cli {
    /// Directory holding blobs and the ledger database
    #[arg(long, env = "TESSERA_DATA_DIR", default_value = "./tessera-data")]
    pub data_dir: PathBuf,

    /// Signing account: a 0x address or a label to derive one from
    #[arg(long, env = "TESSERA_ACCOUNT", default_value = "default")]
    pub account: String,

    /// Gateway used to render content links
    #[arg(long, env = "TESSERA_GATEWAY", default_value = DEFAULT_GATEWAY)]
    pub gateway: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Emit JSONL logs instead of pretty output
    #[arg(long)]
    pub log_json: bool,

    /// Also write JSONL logs to this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a file and make it the account's current file
    Register {
        path: PathBuf,
        /// Name recorded with the upload; defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Show the current file of an account
    Current {
        /// Account to look up; defaults to the signing account
        #[arg(long)]
        of: Option<String>,
    },
    /// Upload a file as a new artifact, or as a comment on one
    Add {
        path: PathBuf,
        /// Comment on this artifact instead of creating one
        #[arg(long)]
        on: Option<ArtifactId>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Vote -1, 0 or 1 on an artifact
    Vote {
        artifact: ArtifactId,
        #[arg(allow_hyphen_values = true)]
        value: i64,
    },
    /// List every artifact in creation order
    Artifacts,
    /// Show one artifact with its comments
    Show { artifact: ArtifactId },
    /// Print the gateway link for a content identifier
    Gateway { cid: String },
}

impl Cli {
    pub fn signer(&self) -> AccountId {
        resolve_account(&self.account)
    }
}

/// Parse a `0x` address, falling back to deriving one from a label.
pub fn resolve_account(value: &str) -> AccountId {
    value
        .parse()
        .unwrap_or_else(|_| AccountId::from_label(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tessera", "artifacts"]).unwrap();
        assert_eq!(cli.log_level, "warn");
        assert_eq!(cli.gateway, DEFAULT_GATEWAY);
        assert!(matches!(cli.command, Command::Artifacts));
    }

    #[test]
    fn test_negative_vote_parses() {
        let cli = Cli::try_parse_from(["tessera", "vote", "#3", "-1"]).unwrap();
        match cli.command {
            Command::Vote { artifact, value } => {
                assert_eq!(artifact, ArtifactId(3));
                assert_eq!(value, -1);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_comment_target() {
        let cli =
            Cli::try_parse_from(["tessera", "add", "reply.txt", "--on", "0"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Add { on: Some(ArtifactId(0)), .. }
        ));
    }

    #[test]
    fn test_account_address_or_label() {
        let alice = AccountId::from_label("alice");
        assert_eq!(resolve_account(&alice.to_string()), alice);
        assert_eq!(resolve_account("alice"), alice);
    }
}
