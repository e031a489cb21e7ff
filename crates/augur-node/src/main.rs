//! augur-node: drives the oracle task engine from a stream of blocks.
//!
//! Reads one JSON [`TxEnvelope`](node::TxEnvelope) per stdin line, applies
//! it and prints a JSON receipt per line on stdout. Logs go to stderr.
//!
//! ```text
//! augur-node            run the node
//! augur-node keygen     print a new secret and validator id
//! augur-node sign <h>   sign request JSON lines from stdin at height h
//! ```

mod commands;
mod config;
mod node;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use crate::config::NodeConfig;
use crate::node::Node;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("run") => run().await,
        Some("keygen") => {
            let line = Zeroizing::new(serde_json::to_string(&commands::keygen())?);
            println!("{}", line.as_str());
            Ok(())
        }
        Some("sign") => {
            let height = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("usage: augur-node sign <height>"))?
                .parse()?;
            commands::sign_stdin(height).await
        }
        Some(other) => Err(anyhow::anyhow!("unknown command: {other}")),
    }
}

async fn run() -> anyhow::Result<()> {
    let config = NodeConfig::load()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Augur node starting");

    let mut node = Node::from_config(&config)?;
    let task_params = node.params().versioned_task_params();
    info!(
        version = task_params.version,
        window = task_params.params.aggregation_window,
        threshold = task_params.params.threshold_score,
        "task parameters loaded"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut rejected = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let receipt = node.handle_line(&line);
                if !receipt.is_ok() {
                    rejected += 1;
                }
                let mut out = serde_json::to_string(&receipt)?;
                out.push('\n');
                stdout.write_all(out.as_bytes()).await?;
                stdout.flush().await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    info!(
        height = node.height(),
        live_tasks = node.engine().tasks().count(),
        rejected,
        validators = node.pool().records().count(),
        scored = node.ledger().iter().count(),
        archived = node.archived_count()?,
        "Augur node stopped"
    );
    Ok(())
}
