//! Coordinator health and metrics commands

use anyhow::{Context, Result};
use dtx_client::TransactionClient;
use tokio_util::sync::CancellationToken;

/// Implementation of the health command
pub async fn execute_health(client: &TransactionClient) -> Result<()> {
    let health = client
        .health(&CancellationToken::new())
        .await
        .context("health check failed")?;

    match health.timestamp {
        Some(ts) => println!("{} (reported at {})", health.status, ts.to_rfc3339()),
        None => println!("{}", health.status),
    }
    Ok(())
}

/// Implementation of the metrics command
pub async fn execute_metrics(client: &TransactionClient) -> Result<()> {
    let metrics = client
        .metrics(&CancellationToken::new())
        .await
        .context("failed to fetch metrics")?;

    print!("{}", metrics);
    if !metrics.ends_with('\n') {
        println!();
    }
    Ok(())
}
