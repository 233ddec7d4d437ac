#![allow(dead_code)]

use k256::ecdsa::SigningKey;
use rand_core::OsRng;

use shade_core::*;
use shade_state::*;

pub fn keypair() -> (SigningKey, PublicKey) {
    let sk = SigningKey::random(&mut OsRng);
    let pk = PublicKey::from_signing_key(&sk);
    (sk, pk)
}

pub fn nonce(n: u8) -> Nonce {
    Hash32([n; 32])
}

/// Engine plus local full trees kept in step by replaying the engine's log.
pub struct World {
    pub engine: LedgerEngine,
    pub accounts: MerkleTree,
    pub utxos: MerkleTree,
    pub nullifiers: NullifierMap,
    cursor: u64,
    owner: Option<PublicKey>,
    balance: Option<Amount>,
    commitment: Option<Hash32>,
}

impl World {
    pub fn new(height: usize) -> Self {
        Self {
            engine: LedgerEngine::new(height).unwrap(),
            accounts: MerkleTree::new(height),
            utxos: MerkleTree::new(height),
            nullifiers: NullifierMap::new(),
            cursor: 0,
            owner: None,
            balance: None,
            commitment: None,
        }
    }

    pub fn apply(&mut self, op: &Operation) -> Result<Receipt, LedgerError> {
        let r = self.engine.apply(op);
        self.sync();
        r
    }

    pub fn sync(&mut self) {
        let fresh = self.engine.log().since(self.cursor, usize::MAX).to_vec();
        for e in fresh {
            match e.event {
                LedgerEvent::AccountAddress(pk) => self.owner = Some(pk),
                LedgerEvent::AccountBalance(b) => self.balance = Some(b),
                LedgerEvent::AccountLeafIndex(i) => {
                    let owner = self.owner.take().unwrap();
                    let balance = self.balance.take().unwrap();
                    self.accounts
                        .set_leaf(i, account_leaf(&owner, balance).unwrap())
                        .unwrap();
                }
                LedgerEvent::PrivateLeaf(h) => self.commitment = Some(h),
                LedgerEvent::PrivateLeafIndex(i) => {
                    let h = self.commitment.take().unwrap();
                    self.utxos.set_leaf(i, h).unwrap();
                }
                LedgerEvent::NullifierLeafIndex(k) => {
                    self.nullifiers.insert(k).unwrap();
                }
            }
            self.cursor = e.seq + 1;
        }
    }

    pub fn assert_in_sync(&self) {
        let st = self.engine.state();
        assert_eq!(st.account_root, self.accounts.root(), "account root");
        assert_eq!(st.utxo_root, self.utxos.root(), "utxo root");
        assert_eq!(st.nullifier_root, self.nullifiers.root(), "nullifier root");
    }

    pub fn mint(&self, slot: u64, owner: &PublicKey, current: Option<Amount>, amount: u64) -> Operation {
        Operation::Mint(Mint {
            witness: self.accounts.witness(slot).unwrap(),
            is_empty: current.is_none(),
            owner: *owner,
            current_balance: current.unwrap_or_default(),
            amount: Amount(amount),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn transfer(
        &self,
        sk: &SigningKey,
        from_slot: u64,
        from_balance: u64,
        to_slot: u64,
        to: &PublicKey,
        to_balance: Option<Amount>,
        amount: u64,
    ) -> Operation {
        let root = self.engine.state().account_root;
        Operation::Transfer(Transfer {
            sender_witness: self.accounts.witness(from_slot).unwrap(),
            sender: PublicKey::from_signing_key(sk),
            sender_balance: Amount(from_balance),
            signature: SpendSignature::create(sk, &transfer_message(&root, Amount(amount))),
            recipient_is_empty: to_balance.is_none(),
            recipient_witness: self.accounts.witness(to_slot).unwrap(),
            recipient: *to,
            recipient_balance: to_balance.unwrap_or_default(),
            amount: Amount(amount),
        })
    }

    pub fn shield(
        &self,
        sk: &SigningKey,
        from_slot: u64,
        from_balance: u64,
        recipient: &PublicKey,
        amount: u64,
        n: Nonce,
    ) -> Operation {
        let st = self.engine.state();
        Operation::Shield(Shield {
            sender_witness: self.accounts.witness(from_slot).unwrap(),
            sender: PublicKey::from_signing_key(sk),
            sender_balance: Amount(from_balance),
            signature: SpendSignature::create(
                sk,
                &shield_message(&st.account_root, &st.utxo_root, Amount(amount)),
            ),
            recipient: *recipient,
            nonce: n,
            utxo_witness: self.utxos.witness(st.next_utxo_index).unwrap(),
            amount: Amount(amount),
        })
    }

    /// Spend descriptor for the UTXO at `slot`, witnessed against current roots.
    pub fn spend(&self, sk: &SigningKey, slot: u64, amount: u64, n: Nonce) -> SpendDescriptor {
        let owner = PublicKey::from_signing_key(sk);
        let leaf = utxo_leaf(&owner, Amount(amount), &n).unwrap();
        let auth = NullifierAuth::create(sk, &leaf).unwrap();
        let key = nullifier_key(&auth, slot).unwrap();
        SpendDescriptor {
            auth,
            nullifier_witness: self.nullifiers.witness(&key).unwrap(),
            utxo_witness: self.utxos.witness(slot).unwrap(),
            amount: Amount(amount),
            nonce: n,
        }
    }

    /// Outputs appended in order from `nextUtxoIndex`, each witnessed after the previous.
    pub fn outputs<const N: usize>(&self, specs: [(PublicKey, u64, Nonce); N]) -> [PrivateOutput; N] {
        let mut tree = self.utxos.clone();
        let mut index = self.engine.state().next_utxo_index;
        specs.map(|(recipient, amount, n)| {
            let witness = tree.witness(index).unwrap();
            tree.set_leaf(index, utxo_leaf(&recipient, Amount(amount), &n).unwrap())
                .unwrap();
            index += 1;
            PrivateOutput {
                recipient,
                amount: Amount(amount),
                nonce: n,
                witness,
            }
        })
    }

    pub fn private_transfer(
        &self,
        sk: &SigningKey,
        spends: [SpendDescriptor; 2],
        outputs: [(PublicKey, u64, Nonce); 2],
    ) -> Operation {
        let root = self.engine.state().utxo_root;
        let signature = SpendSignature::create(
            sk,
            &spend_message(&root, spends[0].amount, spends[1].amount),
        );
        Operation::PrivateTransfer(PrivateTransfer {
            sender: PublicKey::from_signing_key(sk),
            spends,
            signature,
            outputs: self.outputs(outputs),
        })
    }

    pub fn unshield(
        &self,
        sk: &SigningKey,
        spends: [SpendDescriptor; 2],
        private: (PublicKey, u64, Nonce),
        public: (u64, PublicKey, Option<Amount>, u64),
    ) -> Operation {
        let root = self.engine.state().utxo_root;
        let signature = SpendSignature::create(
            sk,
            &spend_message(&root, spends[0].amount, spends[1].amount),
        );
        let [private_output] = self.outputs([private]);
        let (slot, recipient, balance, amount) = public;
        Operation::Unshield(Unshield {
            sender: PublicKey::from_signing_key(sk),
            spends,
            signature,
            private_output,
            public_output: PublicCredit {
                is_empty: balance.is_none(),
                witness: self.accounts.witness(slot).unwrap(),
                recipient,
                balance: balance.unwrap_or_default(),
                amount: Amount(amount),
            },
        })
    }
}
