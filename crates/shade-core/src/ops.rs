//! Operation payloads accepted by the ledger engine.
//!
//! Every payload carries the witnesses and claims the engine re-verifies
//! against its stored roots. Callers build them against the CURRENT roots.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::constants::HASH32_LEN;
use crate::crypto::NullifierAuth;
use crate::keys::{PublicKey, SpendSignature};
use crate::types::{Amount, Nonce, Root};
use crate::witness::MerkleWitness;

/// Credit `amount` to an account slot (privileged, no authorization).
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct Mint {
    /// Witness for the account slot.
    pub witness: MerkleWitness,
    /// Whether the slot is currently empty.
    pub is_empty: bool,
    /// Slot owner.
    pub owner: PublicKey,
    /// Claimed current balance (ignored when empty).
    pub current_balance: Amount,
    /// Amount to credit.
    pub amount: Amount,
}

/// Public to public transfer between two account slots.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct Transfer {
    /// Witness for the sender slot.
    pub sender_witness: MerkleWitness,
    /// Sender key.
    pub sender: PublicKey,
    /// Claimed sender balance.
    pub sender_balance: Amount,
    /// Signature over `(accountRoot, amount)`.
    pub signature: SpendSignature,
    /// Whether the recipient slot is empty.
    pub recipient_is_empty: bool,
    /// Witness for the recipient slot.
    pub recipient_witness: MerkleWitness,
    /// Recipient key.
    pub recipient: PublicKey,
    /// Claimed recipient balance (ignored when empty).
    pub recipient_balance: Amount,
    /// Amount moved.
    pub amount: Amount,
}

/// Public to private transfer: debit an account, append one UTXO.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct Shield {
    /// Witness for the sender slot.
    pub sender_witness: MerkleWitness,
    /// Sender key.
    pub sender: PublicKey,
    /// Claimed sender balance.
    pub sender_balance: Amount,
    /// Signature over `(accountRoot, utxoRoot, amount)`.
    pub signature: SpendSignature,
    /// Owner of the new UTXO.
    pub recipient: PublicKey,
    /// Blinding nonce of the new UTXO.
    pub nonce: Nonce,
    /// Witness of the empty slot at `nextUtxoIndex`.
    pub utxo_witness: MerkleWitness,
    /// Amount moved.
    pub amount: Amount,
}

/// One UTXO being consumed.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct SpendDescriptor {
    /// Nullifier over the UTXO leaf, under the owner's key.
    pub auth: NullifierAuth,
    /// Nullifier map witness at the spend's key.
    pub nullifier_witness: MerkleWitness,
    /// Witness of the UTXO leaf.
    pub utxo_witness: MerkleWitness,
    /// Claimed amount of the UTXO.
    pub amount: Amount,
    /// Claimed nonce of the UTXO.
    pub nonce: Nonce,
}

/// One UTXO being created.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct PrivateOutput {
    /// Owner of the new UTXO.
    pub recipient: PublicKey,
    /// Amount.
    pub amount: Amount,
    /// Blinding nonce.
    pub nonce: Nonce,
    /// Witness of the empty slot it is appended to.
    pub witness: MerkleWitness,
}

/// Credit to an account slot that may be empty.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct PublicCredit {
    /// Whether the slot is empty.
    pub is_empty: bool,
    /// Witness for the slot.
    pub witness: MerkleWitness,
    /// Slot owner.
    pub recipient: PublicKey,
    /// Claimed current balance (ignored when empty).
    pub balance: Amount,
    /// Amount credited.
    pub amount: Amount,
}

/// Private to private transfer: two spends, two new UTXOs.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct PrivateTransfer {
    /// Owner of both spent UTXOs.
    pub sender: PublicKey,
    /// Spent UTXOs; for a single input, clone one descriptor into both
    /// slots. Two separately built descriptors for the same UTXO carry
    /// different proof randomness and are rejected.
    pub spends: [SpendDescriptor; 2],
    /// Signature over `(utxoRoot, amount0, amount1)`.
    pub signature: SpendSignature,
    /// New UTXOs, appended in order.
    pub outputs: [PrivateOutput; 2],
}

/// Private to public transfer: two spends, one new UTXO, one account credit.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct Unshield {
    /// Owner of both spent UTXOs.
    pub sender: PublicKey,
    /// Spent UTXOs; for a single input, clone one descriptor into both
    /// slots. Two separately built descriptors for the same UTXO carry
    /// different proof randomness and are rejected.
    pub spends: [SpendDescriptor; 2],
    /// Signature over `(utxoRoot, amount0, amount1)`.
    pub signature: SpendSignature,
    /// Private change output.
    pub private_output: PrivateOutput,
    /// Public credit.
    pub public_output: PublicCredit,
}

/// Any ledger operation.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub enum Operation {
    /// See [`Mint`].
    Mint(Mint),
    /// See [`Transfer`].
    Transfer(Transfer),
    /// See [`Shield`].
    Shield(Shield),
    /// See [`PrivateTransfer`].
    PrivateTransfer(PrivateTransfer),
    /// See [`Unshield`].
    Unshield(Unshield),
}

impl Operation {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Mint(_) => "mint",
            Operation::Transfer(_) => "transfer",
            Operation::Shield(_) => "to_private",
            Operation::PrivateTransfer(_) => "private_to_private",
            Operation::Unshield(_) => "private_to_public",
        }
    }
}

/// Fields signed by a public transfer sender.
pub fn transfer_message(account_root: &Root, amount: Amount) -> Vec<[u8; HASH32_LEN]> {
    vec![account_root.0, amount.to_field()]
}

/// Fields signed by a public to private sender.
pub fn shield_message(
    account_root: &Root,
    utxo_root: &Root,
    amount: Amount,
) -> Vec<[u8; HASH32_LEN]> {
    vec![account_root.0, utxo_root.0, amount.to_field()]
}

/// Fields signed by a private spender (claimed amounts, before deduplication).
pub fn spend_message(utxo_root: &Root, amount0: Amount, amount1: Amount) -> Vec<[u8; HASH32_LEN]> {
    vec![utxo_root.0, amount0.to_field(), amount1.to_field()]
}
