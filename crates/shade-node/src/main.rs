#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shade_core::TREE_HEIGHT;
use shade_node::{serve_rpc, LedgerStore};

/// Node configuration resolved from CLI, environment and defaults.
#[derive(Parser, Debug)]
#[command(name = "shade-node", version)]
struct Config {
    /// Listen address for the JSON RPC
    #[arg(long, env = "SHADE_LISTEN", default_value = "127.0.0.1:18555")]
    listen: String,
    /// Path to the ledger db (sled)
    #[arg(long, env = "SHADE_DB", default_value = "shade.ledger.db")]
    db: PathBuf,
    /// Token RPC callers must send as `auth`
    #[arg(long, env = "SHADE_RPC_AUTH")]
    auth: Option<String>,
    /// Height of the account and UTXO trees
    #[arg(long, env = "SHADE_TREE_HEIGHT", default_value_t = TREE_HEIGHT)]
    height: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::parse();
    info!(
        listen = %cfg.listen,
        db = %cfg.db.display(),
        height = cfg.height,
        "starting shade node"
    );

    let store = LedgerStore::load_or_init(&cfg.db, cfg.height)
        .with_context(|| format!("open ledger db at {}", cfg.db.display()))?;
    let state = store.state();
    info!(
        account_root = %state.account_root,
        utxo_root = %state.utxo_root,
        nullifier_root = %state.nullifier_root,
        next_utxo_index = state.next_utxo_index,
        "ledger state"
    );
    let store = Arc::new(Mutex::new(store));

    let addr = serve_rpc(&cfg.listen, cfg.auth, store).context("bind rpc socket")?;
    info!(%addr, "node ready");

    loop {
        thread::park();
    }
}
