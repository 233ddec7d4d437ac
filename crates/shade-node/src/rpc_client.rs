//! Blocking client for the node RPC.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use hex::FromHex;
use serde_json::{json, Value};
use thiserror::Error;

use shade_core::{from_bytes, to_bytes, Hash32, MerkleWitness, Operation, Root};
use shade_mirror::{EventSource, MirrorError, Selector, TreeName};
use shade_state::{LedgerState, Receipt, SeqRange, SequencedEvent};

use crate::rpc::StateView;

const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// A request the node answered with `"ok": false`.
#[derive(Debug, Error)]
#[error("{check}: {message}")]
pub struct RemoteError {
    /// Failed check, or `rpc_error` for envelope problems.
    pub check: String,
    /// Node's error text.
    pub message: String,
}

/// Client for one node's JSON RPC; one connection per call.
#[derive(Clone, Debug)]
pub struct RpcClient {
    addr: String,
    auth: Option<String>,
}

impl RpcClient {
    /// Client for `addr`, sending `auth` with every request when set.
    pub fn new(addr: &str, auth: Option<String>) -> Self {
        Self {
            addr: addr.to_string(),
            auth,
        }
    }

    /// Node address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn send(&self, req: Value) -> Result<Value> {
        let mut stream = TcpStream::connect(&self.addr)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;
        let mut req = req;
        if let Some(token) = &self.auth {
            req["auth"] = json!(token);
        }
        let line = req.to_string();
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;
        let mut reader = BufReader::new(stream);
        let mut resp = String::new();
        if reader.read_line(&mut resp)? == 0 {
            bail!("node closed the connection");
        }
        Ok(serde_json::from_str(&resp)?)
    }

    /// Send and turn `"ok": false` into a `RemoteError`.
    fn call(&self, req: Value) -> Result<Value> {
        let v = self.send(req)?;
        if v.get("ok").and_then(|o| o.as_bool()) != Some(true) {
            let text = |k: &str| v.get(k).and_then(|e| e.as_str()).map(str::to_string);
            return Err(RemoteError {
                check: text("check").unwrap_or_else(|| "rpc_error".into()),
                message: text("error").unwrap_or_else(|| "unknown error".into()),
            }
            .into());
        }
        Ok(v)
    }

    /// Liveness check.
    pub fn ping(&self) -> Result<()> {
        self.call(json!({"method": "ping"}))?;
        Ok(())
    }

    /// Node's committed state.
    pub fn state(&self) -> Result<LedgerState> {
        let v = self.call(json!({"method": "get_state"}))?;
        state_field(&v)
    }

    /// Submit an operation; returns the node's receipt.
    pub fn submit(&self, op: &Operation) -> Result<Receipt> {
        let v = self.call(json!({
            "method": "submit",
            "op_hex": hex::encode(to_bytes(op)?),
        }))?;
        let seq = |k: &str| {
            v.get(k)
                .and_then(Value::as_u64)
                .ok_or_else(|| anyhow!("missing {k}"))
        };
        Ok(Receipt {
            state: state_field(&v)?,
            events: SeqRange {
                start: seq("seq_start")?,
                end: seq("seq_end")?,
            },
        })
    }

    /// Up to `limit` events from `since`.
    pub fn get_events(&self, since: u64, limit: usize) -> Result<Vec<SequencedEvent>> {
        let v = self.call(json!({
            "method": "get_events",
            "since": since,
            "limit": limit,
        }))?;
        let list = v
            .get("events_hex")
            .and_then(|l| l.as_array())
            .ok_or_else(|| anyhow!("missing events_hex"))?;
        list.iter()
            .map(|item| -> Result<SequencedEvent> {
                let s = item.as_str().ok_or_else(|| anyhow!("event is not a string"))?;
                Ok(from_bytes(&Vec::from_hex(s)?)?)
            })
            .collect()
    }

    /// Current root of `tree`.
    pub fn root(&self, tree: TreeName) -> Result<Root> {
        let v = self.call(json!({"method": "root", "tree": tree.as_str()}))?;
        hash_field(&v, "root")
    }

    /// Witness for a leaf of `tree`, with the root it proves against.
    pub fn witness(&self, tree: TreeName, at: Selector) -> Result<(MerkleWitness, Root)> {
        let mut req = json!({"method": "witness", "tree": tree.as_str()});
        match at {
            Selector::Index(i) => req["index"] = json!(i),
            Selector::Key(k) => req["key"] = json!(k.to_string()),
        }
        let v = self.call(req)?;
        let s = v
            .get("witness_hex")
            .and_then(|w| w.as_str())
            .ok_or_else(|| anyhow!("missing witness_hex"))?;
        Ok((from_bytes(&Vec::from_hex(s)?)?, hash_field(&v, "root")?))
    }
}

impl EventSource for RpcClient {
    fn fetch_since(&self, since: u64, limit: usize) -> Result<Vec<SequencedEvent>, MirrorError> {
        self.get_events(since, limit)
            .map_err(|e| MirrorError::Unavailable(e.to_string()))
    }
}

fn state_field(v: &Value) -> Result<LedgerState> {
    let view: StateView = serde_json::from_value(
        v.get("state")
            .cloned()
            .ok_or_else(|| anyhow!("missing state"))?,
    )?;
    Ok(LedgerState::try_from(view)?)
}

fn hash_field(v: &Value, name: &str) -> Result<Hash32> {
    let s = v
        .get(name)
        .and_then(|h| h.as_str())
        .ok_or_else(|| anyhow!("missing {name}"))?;
    Ok(Hash32::from_str(s)?)
}
