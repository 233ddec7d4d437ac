//! State transition logic for the Shade ledger.
//!
//! Every operation is checked against the committed roots into a
//! `Transition` first; nothing is written until `commit`. A transition
//! checked against a superseded state is refused at commit time.

use borsh::{BorshDeserialize, BorshSerialize};
use tracing::{debug, warn};

use shade_core::{
    account_leaf, empty_hashes, nullifier_key, shield_message, spend_message, transfer_message,
    utxo_leaf, Amount, Hash32, Mint, Operation, PrivateOutput, PrivateTransfer, PublicCredit,
    PublicKey, Root, Shield, SpendDescriptor, SpendSignature, Transfer, Unshield, MerkleWitness,
    NULLIFIER_MAP_LEVELS,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dual::dual_update;
use crate::error::LedgerError;
use crate::events::{account_facts, utxo_facts, EventLog, LedgerEvent, SeqRange};
use crate::merkle::{compute_root, verify_leaf, witness_index};
use crate::nullifier::{assert_unused, mark_used, NULLIFIER_USED};

/// Smallest supported tree height (one witness level).
pub const MIN_TREE_HEIGHT: usize = 2;
/// Largest supported tree height (slot indexes fit in `u64`).
pub const MAX_TREE_HEIGHT: usize = 64;

/// Authoritative ledger state: three roots and the UTXO counter.
#[derive(Clone, Copy, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LedgerState {
    /// Root of the public account tree.
    pub account_root: Root,
    /// Root of the append-only UTXO tree.
    pub utxo_root: Root,
    /// Slot the next UTXO is appended at.
    pub next_utxo_index: u64,
    /// Root of the sparse nullifier map.
    pub nullifier_root: Root,
}

impl LedgerState {
    /// Empty trees, counter zero, empty nullifier map.
    pub fn genesis(height: usize) -> Self {
        let tree_empty = empty_root(height.saturating_sub(1));
        Self {
            account_root: tree_empty,
            utxo_root: tree_empty,
            next_utxo_index: 0,
            nullifier_root: empty_root(NULLIFIER_MAP_LEVELS),
        }
    }
}

fn empty_root(levels: usize) -> Root {
    empty_hashes(levels)
        .last()
        .copied()
        .unwrap_or_else(Hash32::zero)
}

/// A fully checked, not yet committed transition.
#[derive(Clone, Debug)]
pub struct Transition {
    /// Operation name.
    pub kind: &'static str,
    /// State the checks ran against.
    pub prior: LedgerState,
    /// State after the operation.
    pub next: LedgerState,
    /// Facts to emit, in order.
    pub events: Vec<LedgerEvent>,
}

/// Result of a committed operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Receipt {
    /// New committed state.
    pub state: LedgerState,
    /// Log positions of the emitted facts.
    pub events: SeqRange,
}

/// A checked account leaf write.
struct AccountWrite {
    index: u64,
    owner: PublicKey,
    balance: Amount,
    leaf: Hash32,
}

/// Aggregated spend side of a private operation.
struct SpendSide {
    inputs: Amount,
    nullifier_root: Root,
    keys: Vec<Hash32>,
}

/// Sequential state machine over `LedgerState`.
#[derive(Clone, Debug)]
pub struct LedgerEngine {
    height: usize,
    levels: usize,
    state: LedgerState,
    log: EventLog,
}

impl LedgerEngine {
    /// Engine at genesis for trees of `height`.
    pub fn new(height: usize) -> Result<Self, LedgerError> {
        Self::restore(height, LedgerState::genesis(height), EventLog::new())
    }

    /// Engine resuming from stored state and log.
    pub fn restore(height: usize, state: LedgerState, log: EventLog) -> Result<Self, LedgerError> {
        if !(MIN_TREE_HEIGHT..=MAX_TREE_HEIGHT).contains(&height) {
            return Err(LedgerError::InvalidWitness("unsupported tree height"));
        }
        Ok(Self {
            height,
            levels: height - 1,
            state,
            log,
        })
    }

    /// Tree height (leaf layer included).
    pub fn height(&self) -> usize {
        self.height
    }

    /// Current committed state.
    pub fn state(&self) -> LedgerState {
        self.state
    }

    /// Event log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Check and commit any operation.
    pub fn apply(&mut self, op: &Operation) -> Result<Receipt, LedgerError> {
        let checked = self.check(op);
        self.finish(op.kind(), checked)
    }

    /// Credit an account slot.
    pub fn mint(&mut self, op: &Mint) -> Result<Receipt, LedgerError> {
        let checked = self.check_mint(op);
        self.finish("mint", checked)
    }

    /// Public to public transfer.
    pub fn transfer(&mut self, op: &Transfer) -> Result<Receipt, LedgerError> {
        let checked = self.check_transfer(op);
        self.finish("transfer", checked)
    }

    /// Public to private transfer.
    pub fn to_private(&mut self, op: &Shield) -> Result<Receipt, LedgerError> {
        let checked = self.check_to_private(op);
        self.finish("to_private", checked)
    }

    /// Private to private transfer.
    pub fn private_to_private(&mut self, op: &PrivateTransfer) -> Result<Receipt, LedgerError> {
        let checked = self.check_private_to_private(op);
        self.finish("private_to_private", checked)
    }

    /// Private to public transfer.
    pub fn private_to_public(&mut self, op: &Unshield) -> Result<Receipt, LedgerError> {
        let checked = self.check_private_to_public(op);
        self.finish("private_to_public", checked)
    }

    /// Run every check for `op` against the current state without committing.
    pub fn check(&self, op: &Operation) -> Result<Transition, LedgerError> {
        match op {
            Operation::Mint(m) => self.check_mint(m),
            Operation::Transfer(t) => self.check_transfer(t),
            Operation::Shield(s) => self.check_to_private(s),
            Operation::PrivateTransfer(p) => self.check_private_to_private(p),
            Operation::Unshield(u) => self.check_private_to_public(u),
        }
    }

    /// Commit a checked transition.
    pub fn commit(&mut self, transition: Transition) -> Result<Receipt, LedgerError> {
        if transition.prior != self.state {
            return Err(LedgerError::RootMismatch("transition checked against a stale state"));
        }
        self.state = transition.next;
        let events = self.log.append(transition.events);
        Ok(Receipt {
            state: self.state,
            events,
        })
    }

    fn finish(
        &mut self,
        kind: &'static str,
        checked: Result<Transition, LedgerError>,
    ) -> Result<Receipt, LedgerError> {
        let receipt = checked.and_then(|t| self.commit(t));
        match &receipt {
            Ok(r) => debug!(
                kind,
                seq_start = r.events.start,
                seq_end = r.events.end,
                next_utxo_index = r.state.next_utxo_index,
                "operation committed"
            ),
            Err(e) => warn!(kind, check = e.check(), error = %e, "operation rejected"),
        }
        receipt
    }

    fn check_mint(&self, op: &Mint) -> Result<Transition, LedgerError> {
        let write = self.credit(
            &op.witness,
            op.is_empty,
            &op.owner,
            op.current_balance,
            op.amount,
        )?;
        let next = LedgerState {
            account_root: compute_root(&op.witness, &write.leaf),
            ..self.state
        };
        Ok(self.transition("mint", next, write_facts(&write).to_vec()))
    }

    fn check_transfer(&self, op: &Transfer) -> Result<Transition, LedgerError> {
        let root = self.state.account_root;
        let sender_index = self.verify_account(&op.sender_witness, &op.sender, op.sender_balance)?;
        op.signature
            .verify(&op.sender, &transfer_message(&root, op.amount))
            .map_err(|_| LedgerError::AuthorizationFailure("sender signature"))?;
        let recipient = self.credit(
            &op.recipient_witness,
            op.recipient_is_empty,
            &op.recipient,
            op.recipient_balance,
            op.amount,
        )?;
        let sender = self.debit(sender_index, &op.sender, op.sender_balance, op.amount)?;
        if sender.index == recipient.index {
            return Err(LedgerError::IndexMismatch("sender and recipient share a slot"));
        }

        let account_root = dual_update(
            &op.sender_witness,
            &sender.leaf,
            &op.recipient_witness,
            &recipient.leaf,
        )?;
        let mut events = write_facts(&sender).to_vec();
        events.extend(write_facts(&recipient));
        Ok(self.transition(
            "transfer",
            LedgerState {
                account_root,
                ..self.state
            },
            events,
        ))
    }

    fn check_to_private(&self, op: &Shield) -> Result<Transition, LedgerError> {
        let st = self.state;
        let sender_index = self.verify_account(&op.sender_witness, &op.sender, op.sender_balance)?;
        let output = PrivateOutput {
            recipient: op.recipient,
            amount: op.amount,
            nonce: op.nonce,
            witness: op.utxo_witness.clone(),
        };
        let (utxo_root, commitment) = self.append_utxo(&st.utxo_root, st.next_utxo_index, &output)?;
        op.signature
            .verify(
                &op.sender,
                &shield_message(&st.account_root, &st.utxo_root, op.amount),
            )
            .map_err(|_| LedgerError::AuthorizationFailure("sender signature"))?;
        let sender = self.debit(sender_index, &op.sender, op.sender_balance, op.amount)?;

        let next = LedgerState {
            account_root: compute_root(&op.sender_witness, &sender.leaf),
            utxo_root,
            next_utxo_index: bump(st.next_utxo_index)?,
            nullifier_root: st.nullifier_root,
        };
        let mut events = write_facts(&sender).to_vec();
        events.extend(utxo_facts(commitment, st.next_utxo_index));
        Ok(self.transition("to_private", next, events))
    }

    fn check_private_to_private(&self, op: &PrivateTransfer) -> Result<Transition, LedgerError> {
        let st = self.state;
        let spent = self.check_spends(&op.sender, &op.spends, &op.signature)?;
        let outputs = sum(op.outputs.iter().map(|o| o.amount))?;
        conserve(spent.inputs, outputs)?;

        let mut utxo_root = st.utxo_root;
        let mut next_index = st.next_utxo_index;
        let mut events = Vec::with_capacity(4 + spent.keys.len());
        for output in &op.outputs {
            let (root, commitment) = self.append_utxo(&utxo_root, next_index, output)?;
            events.extend(utxo_facts(commitment, next_index));
            utxo_root = root;
            next_index = bump(next_index)?;
        }
        events.extend(spent.keys.iter().map(|k| LedgerEvent::NullifierLeafIndex(*k)));

        let next = LedgerState {
            account_root: st.account_root,
            utxo_root,
            next_utxo_index: next_index,
            nullifier_root: spent.nullifier_root,
        };
        Ok(self.transition("private_to_private", next, events))
    }

    fn check_private_to_public(&self, op: &Unshield) -> Result<Transition, LedgerError> {
        let st = self.state;
        let spent = self.check_spends(&op.sender, &op.spends, &op.signature)?;
        let outputs = op
            .private_output
            .amount
            .checked_add(op.public_output.amount)
            .map_err(|_| LedgerError::AmountOverflow)?;
        conserve(spent.inputs, outputs)?;

        let (utxo_root, commitment) =
            self.append_utxo(&st.utxo_root, st.next_utxo_index, &op.private_output)?;
        let credit = self.public_credit(&op.public_output)?;

        let next = LedgerState {
            account_root: compute_root(&op.public_output.witness, &credit.leaf),
            utxo_root,
            next_utxo_index: bump(st.next_utxo_index)?,
            nullifier_root: spent.nullifier_root,
        };
        let mut events = write_facts(&credit).to_vec();
        events.extend(utxo_facts(commitment, st.next_utxo_index));
        events.extend(spent.keys.iter().map(|k| LedgerEvent::NullifierLeafIndex(*k)));
        Ok(self.transition("private_to_public", next, events))
    }

    fn transition(
        &self,
        kind: &'static str,
        next: LedgerState,
        events: Vec<LedgerEvent>,
    ) -> Transition {
        Transition {
            kind,
            prior: self.state,
            next,
            events,
        }
    }

    /// Verify an existing account leaf; returns its slot.
    fn verify_account(
        &self,
        witness: &MerkleWitness,
        owner: &PublicKey,
        balance: Amount,
    ) -> Result<u64, LedgerError> {
        let index = witness_index(witness, self.levels)?;
        let leaf = account_leaf(owner, balance)?;
        verify_leaf(witness, &leaf, &self.state.account_root, self.levels)?;
        Ok(index)
    }

    fn debit(
        &self,
        index: u64,
        owner: &PublicKey,
        balance: Amount,
        amount: Amount,
    ) -> Result<AccountWrite, LedgerError> {
        let balance = balance
            .checked_sub(amount)
            .map_err(|_| LedgerError::InsufficientBalance)?;
        Ok(AccountWrite {
            index,
            owner: *owner,
            balance,
            leaf: account_leaf(owner, balance)?,
        })
    }

    /// Verify an empty-or-existing account leaf and credit it.
    fn credit(
        &self,
        witness: &MerkleWitness,
        is_empty: bool,
        owner: &PublicKey,
        balance: Amount,
        amount: Amount,
    ) -> Result<AccountWrite, LedgerError> {
        let index = witness_index(witness, self.levels)?;
        let prior = if is_empty {
            Hash32::zero()
        } else {
            account_leaf(owner, balance)?
        };
        verify_leaf(witness, &prior, &self.state.account_root, self.levels)?;
        let balance = if is_empty {
            amount
        } else {
            balance
                .checked_add(amount)
                .map_err(|_| LedgerError::AmountOverflow)?
        };
        Ok(AccountWrite {
            index,
            owner: *owner,
            balance,
            leaf: account_leaf(owner, balance)?,
        })
    }

    fn public_credit(&self, credit: &PublicCredit) -> Result<AccountWrite, LedgerError> {
        self.credit(
            &credit.witness,
            credit.is_empty,
            &credit.recipient,
            credit.balance,
            credit.amount,
        )
    }

    /// Check an append at `next_index` against `utxo_root`; returns the new root and leaf.
    fn append_utxo(
        &self,
        utxo_root: &Root,
        next_index: u64,
        output: &PrivateOutput,
    ) -> Result<(Root, Hash32), LedgerError> {
        let index = witness_index(&output.witness, self.levels)?;
        if index != next_index {
            return Err(LedgerError::IndexMismatch("append target is not the next utxo index"));
        }
        verify_leaf(&output.witness, &Hash32::zero(), utxo_root, self.levels)?;
        let leaf = utxo_leaf(&output.recipient, output.amount, &output.nonce)?;
        Ok((compute_root(&output.witness, &leaf), leaf))
    }

    /// Check one spend; returns the spent slot and its nullifier key.
    fn check_spend(
        &self,
        sender: &PublicKey,
        spend: &SpendDescriptor,
    ) -> Result<(u64, Hash32), LedgerError> {
        if spend.auth.public_key != *sender {
            return Err(LedgerError::AuthorizationFailure(
                "nullifier authorization names another owner",
            ));
        }
        let index = witness_index(&spend.utxo_witness, self.levels)?;
        let key = nullifier_key(&spend.auth, index)
            .map_err(|_| LedgerError::AuthorizationFailure("malformed nullifier point"))?;
        assert_unused(&self.state.nullifier_root, &spend.nullifier_witness, &key)?;

        let leaf = utxo_leaf(sender, spend.amount, &spend.nonce)?;
        spend
            .auth
            .verify(&leaf)
            .map_err(|_| LedgerError::AuthorizationFailure("nullifier proof"))?;
        verify_leaf(&spend.utxo_witness, &leaf, &self.state.utxo_root, self.levels)?;
        Ok((index, key))
    }

    /// Both spends, deduplicated when padded, plus the spend signature.
    fn check_spends(
        &self,
        sender: &PublicKey,
        spends: &[SpendDescriptor; 2],
        signature: &SpendSignature,
    ) -> Result<SpendSide, LedgerError> {
        let [first, second] = spends;
        let padded = first.nullifier_witness == second.nullifier_witness;
        if padded && first != second {
            return Err(LedgerError::IndexMismatch("padded spend descriptors differ"));
        }

        let (index0, key0) = self.check_spend(sender, first)?;
        let side = if padded {
            SpendSide {
                inputs: first.amount,
                nullifier_root: mark_used(&first.nullifier_witness),
                keys: vec![key0],
            }
        } else {
            let (index1, key1) = self.check_spend(sender, second)?;
            if index0 == index1 {
                return Err(LedgerError::IndexMismatch("both spends consume the same utxo"));
            }
            if key0 == key1 {
                return Err(LedgerError::DoubleSpend);
            }
            SpendSide {
                inputs: sum([first.amount, second.amount])?,
                nullifier_root: dual_update(
                    &first.nullifier_witness,
                    &NULLIFIER_USED,
                    &second.nullifier_witness,
                    &NULLIFIER_USED,
                )?,
                keys: vec![key0, key1],
            }
        };

        signature
            .verify(
                sender,
                &spend_message(&self.state.utxo_root, first.amount, second.amount),
            )
            .map_err(|_| LedgerError::AuthorizationFailure("spend signature"))?;
        Ok(side)
    }
}

fn write_facts(write: &AccountWrite) -> [LedgerEvent; 3] {
    account_facts(write.owner, write.balance, write.index)
}

fn sum(amounts: impl IntoIterator<Item = Amount>) -> Result<Amount, LedgerError> {
    amounts.into_iter().try_fold(Amount::zero(), |acc, a| {
        acc.checked_add(a).map_err(|_| LedgerError::AmountOverflow)
    })
}

fn conserve(inputs: Amount, outputs: Amount) -> Result<(), LedgerError> {
    if inputs != outputs {
        return Err(LedgerError::ConservationViolation {
            inputs: inputs.units(),
            outputs: outputs.units(),
        });
    }
    Ok(())
}

fn bump(index: u64) -> Result<u64, LedgerError> {
    index
        .checked_add(1)
        .ok_or(LedgerError::IndexMismatch("utxo counter exhausted"))
}
