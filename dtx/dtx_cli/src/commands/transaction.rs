//! Transaction inspection commands

use anyhow::{Context, Result};
use clap::Args;
use dtx_client::{TransactionClient, TransactionStatus};
use tokio_util::sync::CancellationToken;

/// Arguments for the get command
#[derive(Args)]
pub struct GetArgs {
    /// Global transaction ID
    pub gid: String,
}

/// Arguments for the list command
#[derive(Args)]
pub struct ListArgs {
    /// Maximum number of transactions to return
    #[clap(long, default_value_t = 20)]
    pub limit: u32,

    /// Number of transactions to skip
    #[clap(long, default_value_t = 0)]
    pub offset: u32,

    /// Only list transactions in this status, e.g. COMMITTED
    #[clap(long)]
    pub status: Option<String>,
}

/// Implementation of the get command; prints the transaction as JSON
pub async fn execute_get(client: &TransactionClient, args: &GetArgs) -> Result<()> {
    let info = client
        .get_transaction(&CancellationToken::new(), &args.gid)
        .await
        .with_context(|| format!("failed to get transaction {}", args.gid))?;

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Implementation of the list command; prints one line per transaction
pub async fn execute_list(client: &TransactionClient, args: &ListArgs) -> Result<()> {
    let status = args
        .status
        .as_deref()
        .map(|s| TransactionStatus::from(s.to_uppercase()));

    let transactions = client
        .list_transactions(
            &CancellationToken::new(),
            args.limit,
            args.offset,
            status.as_ref(),
        )
        .await
        .context("failed to list transactions")?;

    if transactions.is_empty() {
        println!("No transactions found");
        return Ok(());
    }

    for info in transactions {
        println!(
            "{}\t{}\t{}\t{} branch(es)",
            info.gid,
            info.mode,
            info.status,
            info.branches.len()
        );
    }
    Ok(())
}
