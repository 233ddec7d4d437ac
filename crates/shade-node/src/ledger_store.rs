//! Persistent host for the ledger engine.
//!
//! Storage holds only the committed `LedgerState` and the event log. Trees
//! are never written to disk; the query mirror is rebuilt by replaying the log
//! on open and must land on the stored roots.

use std::path::Path;

use sled::transaction::{TransactionError, TransactionResult, Transactional};
use tracing::{debug, info, warn};

use shade_core::{from_bytes, to_bytes, Operation};
use shade_mirror::Mirror;
use shade_state::{EventLog, LedgerEngine, LedgerEvent, LedgerState, Receipt, SequencedEvent};

use crate::error::NodeError;

const TREE_META: &str = "meta";
const TREE_EVENTS: &str = "events";
const KEY_STATE: &[u8] = b"state";
const KEY_HEIGHT: &[u8] = b"height";

/// sled trees backing the node.
pub struct LedgerDb {
    db: sled::Db,
    meta: sled::Tree,
    events: sled::Tree,
}

impl LedgerDb {
    /// Open or create the db at `path`.
    pub fn open(path: &Path) -> Result<Self, NodeError> {
        let db = sled::open(path)?;
        let meta = db.open_tree(TREE_META)?;
        let events = db.open_tree(TREE_EVENTS)?;
        Ok(Self { db, meta, events })
    }

    /// Last committed state, if any operation was ever stored.
    pub fn state(&self) -> Result<Option<LedgerState>, NodeError> {
        match self.meta.get(KEY_STATE)? {
            Some(bytes) => Ok(Some(from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Tree height the db was created with.
    pub fn height(&self) -> Result<Option<u64>, NodeError> {
        match self.meta.get(KEY_HEIGHT)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| NodeError::Corrupt("height record is not 8 bytes"))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    fn set_height(&self, height: u64) -> Result<(), NodeError> {
        self.meta.insert(KEY_HEIGHT, height.to_be_bytes().to_vec())?;
        self.db.flush()?;
        Ok(())
    }

    /// Every stored event, in sequence order.
    pub fn events(&self) -> Result<Vec<SequencedEvent>, NodeError> {
        let mut out = Vec::new();
        for item in self.events.iter() {
            let (k, v) = item?;
            let raw: [u8; 8] = k
                .as_ref()
                .try_into()
                .map_err(|_| NodeError::Corrupt("event key is not 8 bytes"))?;
            out.push(SequencedEvent {
                seq: u64::from_be_bytes(raw),
                event: from_bytes::<LedgerEvent>(&v)?,
            });
        }
        Ok(out)
    }

    /// Store a new state together with the events that produced it.
    pub fn append(&self, state: &LedgerState, events: &[SequencedEvent]) -> Result<(), NodeError> {
        let state_bytes = to_bytes(state)?;
        let mut rows = Vec::with_capacity(events.len());
        for e in events {
            rows.push((e.seq.to_be_bytes().to_vec(), to_bytes(&e.event)?));
        }

        let res: TransactionResult<(), sled::Error> =
            (&self.meta, &self.events).transaction(|(meta, log)| {
                for (k, v) in &rows {
                    log.insert(k.clone(), v.clone())?;
                }
                meta.insert(KEY_STATE, state_bytes.clone())?;
                Ok(())
            });
        res.map_err(|e| match e {
            TransactionError::Abort(e) | TransactionError::Storage(e) => NodeError::Storage(e),
        })?;
        self.db.flush()?;
        Ok(())
    }
}

/// Engine, query mirror and journal kept in step.
pub struct LedgerStore {
    engine: LedgerEngine,
    mirror: Mirror,
    db: LedgerDb,
}

impl LedgerStore {
    /// Open the db at `path`, or start a fresh ledger there.
    pub fn load_or_init(path: &Path, height: usize) -> Result<Self, NodeError> {
        let db = LedgerDb::open(path)?;
        let stored_height = db.height()?;
        if let Some(stored) = stored_height {
            if stored != height as u64 {
                return Err(NodeError::HeightMismatch {
                    stored,
                    configured: height as u64,
                });
            }
        }

        let log = EventLog::from_events(db.events()?)
            .ok_or(NodeError::Corrupt("event log is not consecutive from zero"))?;
        let state = match db.state()? {
            Some(s) => s,
            None if log.is_empty() => LedgerState::genesis(height),
            None => return Err(NodeError::Corrupt("events stored without a state")),
        };
        let engine = LedgerEngine::restore(height, state, log)?;
        let mirror = Mirror::replay(height, engine.log().iter())?;
        if mirror.state() != engine.state() {
            return Err(NodeError::Corrupt("stored state does not match replayed events"));
        }
        if stored_height.is_none() {
            db.set_height(height as u64)?;
        }

        info!(
            height,
            events = engine.log().len(),
            next_utxo_index = state.next_utxo_index,
            "ledger loaded"
        );
        Ok(Self { engine, mirror, db })
    }

    /// Check `op`, persist its effects, then commit them.
    ///
    /// Nothing is written if any check fails.
    pub fn submit(&mut self, op: &Operation) -> Result<Receipt, NodeError> {
        let transition = match self.engine.check(op) {
            Ok(t) => t,
            Err(e) => {
                warn!(kind = op.kind(), check = e.check(), error = %e, "operation rejected");
                return Err(e.into());
            }
        };
        let events = self.engine.log().sequence(transition.events.clone());
        self.db.append(&transition.next, &events)?;
        let receipt = self.engine.commit(transition)?;
        self.mirror.apply_all(&events)?;
        debug!(
            kind = op.kind(),
            seq_start = receipt.events.start,
            seq_end = receipt.events.end,
            "operation persisted"
        );
        Ok(receipt)
    }

    /// Current committed state.
    pub fn state(&self) -> LedgerState {
        self.engine.state()
    }

    /// Tree height.
    pub fn height(&self) -> usize {
        self.engine.height()
    }

    /// Sequence number of the next event.
    pub fn next_seq(&self) -> u64 {
        self.engine.log().next_seq()
    }

    /// Up to `limit` events from `since`.
    pub fn events_since(&self, since: u64, limit: usize) -> &[SequencedEvent] {
        self.engine.log().since(since, limit)
    }

    /// Query mirror, always at the engine's state.
    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Underlying journal.
    pub fn db(&self) -> &LedgerDb {
        &self.db
    }
}
