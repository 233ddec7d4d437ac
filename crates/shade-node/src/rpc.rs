//! Line-delimited JSON RPC over TCP.
//!
//! One request object per line, one response object per line. Operations,
//! events and witnesses travel as hex of their Borsh encoding.

use std::fmt::Display;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::thread;

use hex::FromHex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shade_core::{from_bytes, to_bytes, CoreError, Hash32, Operation};
use shade_mirror::{Selector, TreeName, DEFAULT_BATCH};
use shade_state::LedgerState;

use crate::error::NodeError;
use crate::ledger_store::LedgerStore;

/// Largest number of events one `get_events` call returns.
pub const MAX_EVENTS_PER_CALL: usize = 4096;

/// Ledger handle shared by connection threads.
pub type SharedStore = Arc<Mutex<LedgerStore>>;

/// `LedgerState` with roots as hex strings.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StateView {
    /// Account tree root.
    pub account_root: String,
    /// UTXO tree root.
    pub utxo_root: String,
    /// Next UTXO slot.
    pub next_utxo_index: u64,
    /// Nullifier map root.
    pub nullifier_root: String,
}

impl From<LedgerState> for StateView {
    fn from(s: LedgerState) -> Self {
        Self {
            account_root: s.account_root.to_string(),
            utxo_root: s.utxo_root.to_string(),
            next_utxo_index: s.next_utxo_index,
            nullifier_root: s.nullifier_root.to_string(),
        }
    }
}

impl TryFrom<StateView> for LedgerState {
    type Error = CoreError;

    fn try_from(v: StateView) -> Result<Self, Self::Error> {
        Ok(Self {
            account_root: Hash32::from_str(&v.account_root)?,
            utxo_root: Hash32::from_str(&v.utxo_root)?,
            next_utxo_index: v.next_utxo_index,
            nullifier_root: Hash32::from_str(&v.nullifier_root)?,
        })
    }
}

/// Bind `addr` and serve requests on background threads; returns the bound address.
pub fn serve_rpc(
    addr: &str,
    auth_token: Option<String>,
    store: SharedStore,
) -> io::Result<SocketAddr> {
    let listener = TcpListener::bind(addr)?;
    let local = listener.local_addr()?;
    info!(%local, auth = auth_token.is_some(), "rpc listening");
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let store = Arc::clone(&store);
                    let auth_token = auth_token.clone();
                    thread::spawn(move || handle_client(stream, auth_token, store));
                }
                Err(e) => warn!(error = %e, "rpc accept failed"),
            }
        }
    });
    Ok(local)
}

fn handle_client(stream: TcpStream, auth_token: Option<String>, store: SharedStore) {
    let peer = stream.peer_addr().ok();
    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);
    let mut writer = stream;
    let mut line = String::new();
    while let Ok(n) = reader.read_line(&mut line) {
        if n == 0 {
            break;
        }
        let resp = match serde_json::from_str::<Value>(&line) {
            Ok(v) => handle_request(&v, auth_token.as_deref(), &store),
            Err(_) => fail("invalid json"),
        };
        line.clear();
        let sent = writer
            .write_all(resp.to_string().as_bytes())
            .and_then(|_| writer.write_all(b"\n"));
        if sent.is_err() {
            break;
        }
    }
    debug!(?peer, "rpc client disconnected");
}

/// Answer one request object.
pub fn handle_request(v: &Value, auth_token: Option<&str>, store: &Mutex<LedgerStore>) -> Value {
    if let Some(expected) = auth_token {
        match v.get("auth").and_then(|a| a.as_str()) {
            Some(tok) if tok == expected => {}
            _ => return fail("unauthorized"),
        }
    }
    let method = match v.get("method").and_then(|m| m.as_str()) {
        Some(m) => m,
        None => return fail("missing method"),
    };
    let Ok(mut store) = store.lock() else {
        return fail("ledger unavailable");
    };

    let resp = match method {
        "ping" => Ok(json!({"ok": true})),
        "get_state" => Ok(json!({
            "ok": true,
            "height": store.height(),
            "next_seq": store.next_seq(),
            "state": StateView::from(store.state()),
        })),
        "submit" => submit(v, &mut store),
        "get_events" => get_events(v, &store),
        "root" => root(v, &store),
        "witness" => witness(v, &store),
        _ => Err(fail("unknown method")),
    };
    resp.unwrap_or_else(|e| e)
}

fn submit(v: &Value, store: &mut LedgerStore) -> Result<Value, Value> {
    let bytes = Vec::from_hex(str_param(v, "op_hex")?).map_err(|_| fail("bad hex"))?;
    let op: Operation = from_bytes(&bytes).map_err(|_| fail("decode failed"))?;
    let receipt = store.submit(&op).map_err(|e| node_fail(&e))?;
    Ok(json!({
        "ok": true,
        "kind": op.kind(),
        "state": StateView::from(receipt.state),
        "seq_start": receipt.events.start,
        "seq_end": receipt.events.end,
    }))
}

fn get_events(v: &Value, store: &LedgerStore) -> Result<Value, Value> {
    let since = v.get("since").and_then(Value::as_u64).unwrap_or(0);
    let limit = v
        .get("limit")
        .and_then(Value::as_u64)
        .map_or(DEFAULT_BATCH, |l| usize::try_from(l).unwrap_or(usize::MAX))
        .min(MAX_EVENTS_PER_CALL);
    let events = store
        .events_since(since, limit)
        .iter()
        .map(|e| to_bytes(e).map(hex::encode))
        .collect::<Result<Vec<_>, CoreError>>()
        .map_err(fail)?;
    Ok(json!({
        "ok": true,
        "events_hex": events,
        "next_seq": store.next_seq(),
    }))
}

fn root(v: &Value, store: &LedgerStore) -> Result<Value, Value> {
    let tree = tree_param(v)?;
    Ok(json!({
        "ok": true,
        "tree": tree.as_str(),
        "root": store.mirror().root(tree).to_string(),
    }))
}

fn witness(v: &Value, store: &LedgerStore) -> Result<Value, Value> {
    let tree = tree_param(v)?;
    let at = selector_param(v)?;
    let w = store
        .mirror()
        .witness(tree, at)
        .map_err(|e| node_fail(&e.into()))?;
    let bytes = to_bytes(&w).map_err(fail)?;
    Ok(json!({
        "ok": true,
        "tree": tree.as_str(),
        "root": store.mirror().root(tree).to_string(),
        "witness_hex": hex::encode(bytes),
    }))
}

fn str_param<'a>(v: &'a Value, name: &'static str) -> Result<&'a str, Value> {
    v.get(name)
        .and_then(|p| p.as_str())
        .ok_or_else(|| fail(format!("missing {name}")))
}

fn tree_param(v: &Value) -> Result<TreeName, Value> {
    str_param(v, "tree")?.parse::<TreeName>().map_err(fail)
}

fn selector_param(v: &Value) -> Result<Selector, Value> {
    if let Some(index) = v.get("index").and_then(Value::as_u64) {
        return Ok(Selector::Index(index));
    }
    let key = str_param(v, "key").map_err(|_| fail("missing index or key"))?;
    Hash32::from_str(key).map(Selector::Key).map_err(fail)
}

fn fail(msg: impl Display) -> Value {
    json!({"ok": false, "error": msg.to_string()})
}

fn node_fail(e: &NodeError) -> Value {
    json!({"ok": false, "error": e.to_string(), "check": e.check()})
}
