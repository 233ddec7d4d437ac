//! Ordered facts emitted by committed transitions.
//!
//! Per leaf the data fact comes first and its index fact second. A consumer
//! pairs each data fact with the next index fact of the same category.

use borsh::{BorshDeserialize, BorshSerialize};
use shade_core::{Amount, Hash32, PublicKey};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One emitted fact.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub enum LedgerEvent {
    /// Owner of the next account leaf.
    AccountAddress(PublicKey),
    /// Balance of the next account leaf.
    AccountBalance(Amount),
    /// Slot of the buffered account leaf.
    AccountLeafIndex(u64),
    /// Commitment of the next UTXO leaf.
    PrivateLeaf(Hash32),
    /// Slot of the buffered UTXO leaf.
    PrivateLeafIndex(u64),
    /// Nullifier key that became used.
    NullifierLeafIndex(Hash32),
}

impl LedgerEvent {
    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::AccountAddress(_) => "account_address",
            LedgerEvent::AccountBalance(_) => "account_balance",
            LedgerEvent::AccountLeafIndex(_) => "account_leaf_index",
            LedgerEvent::PrivateLeaf(_) => "private_leaf",
            LedgerEvent::PrivateLeafIndex(_) => "private_leaf_index",
            LedgerEvent::NullifierLeafIndex(_) => "nullifier_leaf_index",
        }
    }
}

/// Facts for one account leaf write.
pub fn account_facts(owner: PublicKey, balance: Amount, index: u64) -> [LedgerEvent; 3] {
    [
        LedgerEvent::AccountAddress(owner),
        LedgerEvent::AccountBalance(balance),
        LedgerEvent::AccountLeafIndex(index),
    ]
}

/// Facts for one UTXO append.
pub fn utxo_facts(commitment: Hash32, index: u64) -> [LedgerEvent; 2] {
    [
        LedgerEvent::PrivateLeaf(commitment),
        LedgerEvent::PrivateLeafIndex(index),
    ]
}

/// A fact with its position in the log.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct SequencedEvent {
    /// Zero-based log position.
    pub seq: u64,
    /// The fact.
    pub event: LedgerEvent,
}

/// Sequence range produced by one transition.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeqRange {
    /// First sequence number written.
    pub start: u64,
    /// One past the last sequence number written.
    pub end: u64,
}

impl SeqRange {
    /// Number of events in the range.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only event log with consecutive sequence numbers from zero.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<SequencedEvent>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Rebuild from stored events; they must be consecutive from zero.
    pub fn from_events(events: Vec<SequencedEvent>) -> Option<Self> {
        let consecutive = events
            .iter()
            .enumerate()
            .all(|(i, e)| e.seq == i as u64);
        consecutive.then_some(Self { events })
    }

    /// Sequence number the next appended event receives.
    pub fn next_seq(&self) -> u64 {
        self.events.len() as u64
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number sequence events as they would be appended, without appending.
    pub fn sequence(&self, events: Vec<LedgerEvent>) -> Vec<SequencedEvent> {
        let base = self.next_seq();
        events
            .into_iter()
            .enumerate()
            .map(|(i, event)| SequencedEvent {
                seq: base + i as u64,
                event,
            })
            .collect()
    }

    /// Append facts and return their sequence range.
    pub fn append(&mut self, events: Vec<LedgerEvent>) -> SeqRange {
        let start = self.next_seq();
        let sequenced = self.sequence(events);
        self.events.extend(sequenced);
        SeqRange {
            start,
            end: self.next_seq(),
        }
    }

    /// Up to `limit` events starting at `since`.
    pub fn since(&self, since: u64, limit: usize) -> &[SequencedEvent] {
        let start = usize::try_from(since)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        let end = start.saturating_add(limit).min(self.events.len());
        &self.events[start..end]
    }

    /// All events in order.
    pub fn iter(&self) -> impl Iterator<Item = &SequencedEvent> {
        self.events.iter()
    }
}
