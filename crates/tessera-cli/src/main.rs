use std::io::Write;

use clap::Parser;
use tessera_cli::commands;
use tessera_cli::config::Cli;
use tessera_logging::AccountContextGuard;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = tessera_cli::init_logging(&cli.log_level, cli.log_json, cli.log_dir.clone());

    // Current-thread runtime keeps the account context on every task
    let _account = AccountContextGuard::new(cli.signer());

    let mut stdout = std::io::stdout().lock();
    commands::run(&cli, &mut stdout).await?;
    stdout.flush()?;
    Ok(())
}
