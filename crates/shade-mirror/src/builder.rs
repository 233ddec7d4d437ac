//! Operation assembly against a mirror's view.
//!
//! Witnesses and signed roots come from the mirror, so an operation is only
//! accepted if the mirror has caught up with the engine's current state.

use k256::ecdsa::SigningKey;

use shade_core::{
    nullifier_key, shield_message, spend_message, transfer_message, utxo_leaf, Amount,
    MerkleWitness, Mint, Nonce, NullifierAuth, Operation, PrivateOutput, PrivateTransfer,
    PublicCredit, PublicKey, Shield, SpendDescriptor, SpendSignature, Transfer, Unshield,
};

use crate::error::MirrorError;
use crate::mirror::{Mirror, Selector, TreeName};

/// One UTXO to create.
#[derive(Clone, Copy, Debug)]
pub struct OutputSpec {
    /// Owner.
    pub recipient: PublicKey,
    /// Amount.
    pub amount: Amount,
    /// Blinding nonce.
    pub nonce: Nonce,
}

/// Builds operation payloads from a mirror snapshot.
pub struct Builder<'a> {
    mirror: &'a Mirror,
}

impl<'a> Builder<'a> {
    /// Builder over `mirror`.
    pub fn new(mirror: &'a Mirror) -> Self {
        Self { mirror }
    }

    /// Mint `amount` into account slot `slot`.
    pub fn mint(
        &self,
        slot: u64,
        owner: &PublicKey,
        amount: Amount,
    ) -> Result<Operation, MirrorError> {
        let (is_empty, current_balance) = self.slot_balance(slot, owner)?;
        Ok(Operation::Mint(Mint {
            witness: self.account_witness(slot)?,
            is_empty,
            owner: *owner,
            current_balance,
            amount,
        }))
    }

    /// Public transfer from `from_slot` (owned by `sk`) to `to_slot`.
    pub fn transfer(
        &self,
        sk: &SigningKey,
        from_slot: u64,
        to_slot: u64,
        recipient: &PublicKey,
        amount: Amount,
    ) -> Result<Operation, MirrorError> {
        let sender = PublicKey::from_signing_key(sk);
        let sender_balance = self.owned_balance(from_slot, &sender)?;
        let (recipient_is_empty, recipient_balance) = self.slot_balance(to_slot, recipient)?;
        let root = self.mirror.root(TreeName::Public);
        Ok(Operation::Transfer(Transfer {
            sender_witness: self.account_witness(from_slot)?,
            sender,
            sender_balance,
            signature: SpendSignature::create(sk, &transfer_message(&root, amount)),
            recipient_is_empty,
            recipient_witness: self.account_witness(to_slot)?,
            recipient: *recipient,
            recipient_balance,
            amount,
        }))
    }

    /// Move `amount` from `from_slot` into a new UTXO.
    pub fn shield(
        &self,
        sk: &SigningKey,
        from_slot: u64,
        output: OutputSpec,
    ) -> Result<Operation, MirrorError> {
        let sender = PublicKey::from_signing_key(sk);
        let sender_balance = self.owned_balance(from_slot, &sender)?;
        let st = self.mirror.state();
        Ok(Operation::Shield(Shield {
            sender_witness: self.account_witness(from_slot)?,
            sender,
            sender_balance,
            signature: SpendSignature::create(
                sk,
                &shield_message(&st.account_root, &st.utxo_root, output.amount),
            ),
            recipient: output.recipient,
            nonce: output.nonce,
            utxo_witness: self
                .mirror
                .witness(TreeName::Private, Selector::Index(st.next_utxo_index))?,
            amount: output.amount,
        }))
    }

    /// Spend descriptor for the UTXO `(owner of sk, amount, nonce)` at `slot`.
    pub fn spend(
        &self,
        sk: &SigningKey,
        slot: u64,
        amount: Amount,
        nonce: Nonce,
    ) -> Result<SpendDescriptor, MirrorError> {
        let owner = PublicKey::from_signing_key(sk);
        let leaf = utxo_leaf(&owner, amount, &nonce)?;
        if self.mirror.leaf(TreeName::Private, Selector::Index(slot))? != leaf {
            return Err(MirrorError::UnknownLeaf("utxo slot holds another commitment"));
        }
        let auth = NullifierAuth::create(sk, &leaf)?;
        let key = nullifier_key(&auth, slot)?;
        Ok(SpendDescriptor {
            auth,
            nullifier_witness: self.mirror.witness(TreeName::Nullifier, Selector::Key(key))?,
            utxo_witness: self.mirror.witness(TreeName::Private, Selector::Index(slot))?,
            amount,
            nonce,
        })
    }

    /// Private transfer; pass the same descriptor twice for a single input.
    pub fn private_transfer(
        &self,
        sk: &SigningKey,
        spends: [SpendDescriptor; 2],
        outputs: [OutputSpec; 2],
    ) -> Result<Operation, MirrorError> {
        let signature = self.spend_signature(sk, &spends);
        Ok(Operation::PrivateTransfer(PrivateTransfer {
            sender: PublicKey::from_signing_key(sk),
            spends,
            signature,
            outputs: self.outputs(outputs)?,
        }))
    }

    /// Private to public transfer crediting `public_slot`.
    pub fn unshield(
        &self,
        sk: &SigningKey,
        spends: [SpendDescriptor; 2],
        private: OutputSpec,
        public_slot: u64,
        recipient: &PublicKey,
        public_amount: Amount,
    ) -> Result<Operation, MirrorError> {
        let signature = self.spend_signature(sk, &spends);
        let [private_output] = self.outputs([private])?;
        let (is_empty, balance) = self.slot_balance(public_slot, recipient)?;
        Ok(Operation::Unshield(Unshield {
            sender: PublicKey::from_signing_key(sk),
            spends,
            signature,
            private_output,
            public_output: PublicCredit {
                is_empty,
                witness: self.account_witness(public_slot)?,
                recipient: *recipient,
                balance,
                amount: public_amount,
            },
        }))
    }

    /// Outputs appended from the mirror's counter, each witnessed after the previous.
    fn outputs<const N: usize>(
        &self,
        specs: [OutputSpec; N],
    ) -> Result<[PrivateOutput; N], MirrorError> {
        let mut tree = self.mirror.utxo_tree().clone();
        let mut index = self.mirror.next_utxo_index();
        let mut out = Vec::with_capacity(N);
        for spec in specs {
            let witness = tree.witness(index)?;
            tree.set_leaf(index, utxo_leaf(&spec.recipient, spec.amount, &spec.nonce)?)?;
            index += 1;
            out.push(PrivateOutput {
                recipient: spec.recipient,
                amount: spec.amount,
                nonce: spec.nonce,
                witness,
            });
        }
        out.try_into()
            .map_err(|_| MirrorError::InvalidQuery("output count"))
    }

    fn spend_signature(&self, sk: &SigningKey, spends: &[SpendDescriptor; 2]) -> SpendSignature {
        SpendSignature::create(
            sk,
            &spend_message(
                &self.mirror.root(TreeName::Private),
                spends[0].amount,
                spends[1].amount,
            ),
        )
    }

    fn account_witness(&self, slot: u64) -> Result<MerkleWitness, MirrorError> {
        self.mirror.witness(TreeName::Public, Selector::Index(slot))
    }

    /// Emptiness flag and balance of a slot about to be credited to `owner`.
    fn slot_balance(&self, slot: u64, owner: &PublicKey) -> Result<(bool, Amount), MirrorError> {
        match self.mirror.account(slot) {
            None => Ok((true, Amount::zero())),
            Some(r) if r.owner == *owner => Ok((false, r.balance)),
            Some(_) => Err(MirrorError::UnknownLeaf("account slot belongs to another owner")),
        }
    }

    fn owned_balance(&self, slot: u64, owner: &PublicKey) -> Result<Amount, MirrorError> {
        match self.mirror.account(slot) {
            Some(r) if r.owner == *owner => Ok(r.balance),
            _ => Err(MirrorError::UnknownLeaf("sender does not own account slot")),
        }
    }
}
