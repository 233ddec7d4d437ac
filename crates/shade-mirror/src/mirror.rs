//! Event-sourced replica of the ledger trees.

use core::fmt;
use core::str::FromStr;

use hashbrown::HashMap;
use tracing::{debug, trace};

use shade_core::{account_leaf, Amount, Hash32, MerkleWitness, PublicKey, Root};
use shade_state::{
    LedgerEvent, LedgerState, MerkleTree, NullifierMap, SequencedEvent, NULLIFIER_USED,
};

use crate::error::MirrorError;

/// Tree addressed by a query.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TreeName {
    /// Account tree.
    Public,
    /// UTXO tree.
    Private,
    /// Nullifier map.
    Nullifier,
}

impl TreeName {
    /// Query-surface name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeName::Public => "public",
            TreeName::Private => "private",
            TreeName::Nullifier => "nullifier",
        }
    }
}

impl fmt::Display for TreeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreeName {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(TreeName::Public),
            "private" => Ok(TreeName::Private),
            "nullifier" => Ok(TreeName::Nullifier),
            _ => Err(MirrorError::InvalidQuery("unknown tree")),
        }
    }
}

/// Leaf address: a slot for the trees, a key for the nullifier map.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Selector {
    /// Slot number.
    Index(u64),
    /// Nullifier key.
    Key(Hash32),
}

/// Public data of an account slot, as last announced by the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AccountRecord {
    /// Slot owner.
    pub owner: PublicKey,
    /// Balance.
    pub balance: Amount,
}

/// Local account tree, UTXO tree and nullifier map rebuilt from facts.
#[derive(Clone, Debug)]
pub struct Mirror {
    accounts: MerkleTree,
    utxos: MerkleTree,
    nullifiers: NullifierMap,
    records: HashMap<u64, AccountRecord>,
    next_utxo_index: u64,
    cursor: u64,
    owner: Option<PublicKey>,
    balance: Option<Amount>,
    commitment: Option<Hash32>,
}

impl Mirror {
    /// Empty mirror for trees of `height`.
    pub fn new(height: usize) -> Self {
        Self {
            accounts: MerkleTree::new(height),
            utxos: MerkleTree::new(height),
            nullifiers: NullifierMap::new(),
            records: HashMap::new(),
            next_utxo_index: 0,
            cursor: 0,
            owner: None,
            balance: None,
            commitment: None,
        }
    }

    /// Mirror rebuilt from a complete log.
    pub fn replay<'a>(
        height: usize,
        events: impl IntoIterator<Item = &'a SequencedEvent>,
    ) -> Result<Self, MirrorError> {
        let mut m = Self::new(height);
        for e in events {
            m.apply(e)?;
        }
        Ok(m)
    }

    /// Apply one sequenced fact.
    ///
    /// Already-applied positions are skipped; a position past the cursor is a
    /// retryable `Gap`.
    pub fn apply(&mut self, event: &SequencedEvent) -> Result<(), MirrorError> {
        if event.seq < self.cursor {
            trace!(seq = event.seq, cursor = self.cursor, "skipping re-delivered event");
            return Ok(());
        }
        if event.seq > self.cursor {
            return Err(MirrorError::Gap {
                expected: self.cursor,
                got: event.seq,
            });
        }
        self.apply_fact(&event.event)?;
        self.cursor += 1;
        Ok(())
    }

    /// Apply a batch in order; returns how many advanced the cursor.
    pub fn apply_all(&mut self, events: &[SequencedEvent]) -> Result<usize, MirrorError> {
        let start = self.cursor;
        for e in events {
            self.apply(e)?;
        }
        Ok((self.cursor - start) as usize)
    }

    /// Apply a raw fact, pairing data facts with the next index fact.
    pub fn apply_fact(&mut self, fact: &LedgerEvent) -> Result<(), MirrorError> {
        match fact {
            LedgerEvent::AccountAddress(pk) => self.owner = Some(*pk),
            LedgerEvent::AccountBalance(b) => self.balance = Some(*b),
            // buffers are cleared only once the leaf is written
            LedgerEvent::AccountLeafIndex(index) => match (self.owner, self.balance) {
                (Some(owner), Some(balance)) => {
                    self.accounts
                        .set_leaf(*index, account_leaf(&owner, balance)?)?;
                    self.owner = None;
                    self.balance = None;
                    self.records
                        .insert(*index, AccountRecord { owner, balance });
                    debug!(index, %balance, "account leaf set");
                }
                _ => trace!(index, "account index without buffered data"),
            },
            LedgerEvent::PrivateLeaf(h) => self.commitment = Some(*h),
            LedgerEvent::PrivateLeafIndex(index) => match self.commitment {
                Some(h) => {
                    self.utxos.set_leaf(*index, h)?;
                    self.commitment = None;
                    self.next_utxo_index = self.next_utxo_index.max(index.saturating_add(1));
                    debug!(index, "utxo leaf set");
                }
                None => trace!(index, "utxo index without buffered data"),
            },
            LedgerEvent::NullifierLeafIndex(key) => {
                if self.nullifiers.insert(*key)? {
                    debug!(%key, "nullifier marked used");
                }
            }
        }
        Ok(())
    }

    /// Next sequence number the mirror expects.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Sequence number of the last applied event.
    pub fn last_applied(&self) -> Option<u64> {
        self.cursor.checked_sub(1)
    }

    /// Slot the next UTXO will be appended at, as far as the mirror has seen.
    pub fn next_utxo_index(&self) -> u64 {
        self.next_utxo_index
    }

    /// Roots and counter in engine form.
    pub fn state(&self) -> LedgerState {
        LedgerState {
            account_root: self.accounts.root(),
            utxo_root: self.utxos.root(),
            next_utxo_index: self.next_utxo_index,
            nullifier_root: self.nullifiers.root(),
        }
    }

    /// Tree height (leaf layer included).
    pub fn height(&self) -> usize {
        self.accounts.height()
    }

    /// Current root of `tree`.
    pub fn root(&self, tree: TreeName) -> Root {
        match tree {
            TreeName::Public => self.accounts.root(),
            TreeName::Private => self.utxos.root(),
            TreeName::Nullifier => self.nullifiers.root(),
        }
    }

    /// Witness for a leaf of `tree`.
    pub fn witness(&self, tree: TreeName, at: Selector) -> Result<MerkleWitness, MirrorError> {
        let w = match (tree, at) {
            (TreeName::Public, Selector::Index(i)) => self.accounts.witness(i)?,
            (TreeName::Private, Selector::Index(i)) => self.utxos.witness(i)?,
            (TreeName::Nullifier, Selector::Key(k)) => self.nullifiers.witness(&k)?,
            (TreeName::Nullifier, Selector::Index(_)) => {
                return Err(MirrorError::InvalidQuery("nullifier map is addressed by key"))
            }
            (_, Selector::Key(_)) => {
                return Err(MirrorError::InvalidQuery("trees are addressed by index"))
            }
        };
        Ok(w)
    }

    /// Leaf value of `tree`.
    pub fn leaf(&self, tree: TreeName, at: Selector) -> Result<Hash32, MirrorError> {
        match (tree, at) {
            (TreeName::Public, Selector::Index(i)) => Ok(self.accounts.leaf(i)),
            (TreeName::Private, Selector::Index(i)) => Ok(self.utxos.leaf(i)),
            (TreeName::Nullifier, Selector::Key(k)) => Ok(if self.nullifiers.contains(&k) {
                NULLIFIER_USED
            } else {
                Hash32::zero()
            }),
            _ => Err(MirrorError::InvalidQuery("selector does not match tree")),
        }
    }

    /// Owner and balance of an account slot, if it was ever written.
    pub fn account(&self, index: u64) -> Option<AccountRecord> {
        self.records.get(&index).copied()
    }

    pub(crate) fn utxo_tree(&self) -> &MerkleTree {
        &self.utxos
    }
}
