mod common;

use common::{keypair, nonce, World};
use shade_core::*;
use shade_state::*;

#[test]
fn public_private_round_trip() {
    let mut w = World::new(TREE_HEIGHT);
    let (sk_a, a) = keypair();
    let (sk_b, b) = keypair();
    let (sk_c, c) = keypair();
    let (sk_d, d) = keypair();
    let genesis = w.engine.state();

    // mint 10 to A at slot 2
    w.apply(&w.mint(2, &a, None, 10)).unwrap();
    w.assert_in_sync();
    let r1 = w.engine.state().account_root;
    assert_ne!(r1, genesis.account_root);

    // A -> B (slot 6, empty), 7
    w.apply(&w.transfer(&sk_a, 2, 10, 6, &b, None, 7)).unwrap();
    w.assert_in_sync();
    assert_eq!(w.accounts.leaf(2), account_leaf(&a, Amount(3)).unwrap());
    assert_eq!(w.accounts.leaf(6), account_leaf(&b, Amount(7)).unwrap());
    let r2 = w.engine.state().account_root;
    assert_ne!(r2, r1);

    // B shields 5 to C at utxo 0
    w.apply(&w.shield(&sk_b, 6, 7, &c, 5, nonce(1))).unwrap();
    w.assert_in_sync();
    let st = w.engine.state();
    assert_eq!(st.next_utxo_index, 1);
    assert_eq!(w.accounts.leaf(6), account_leaf(&b, Amount(2)).unwrap());
    assert_eq!(w.utxos.leaf(0), utxo_leaf(&c, Amount(5), &nonce(1)).unwrap());
    assert_eq!(st.nullifier_root, genesis.nullifier_root);

    // C spends slot 0: 3 to D, 2 back to C
    let spend = w.spend(&sk_c, 0, 5, nonce(1));
    let op = w.private_transfer(
        &sk_c,
        [spend.clone(), spend],
        [(d, 3, nonce(2)), (c, 2, nonce(3))],
    );
    let receipt = w.apply(&op).unwrap();
    w.assert_in_sync();
    assert_eq!(receipt.state.next_utxo_index, 3);
    assert_eq!(receipt.state.account_root, st.account_root);
    assert_ne!(receipt.state.nullifier_root, genesis.nullifier_root);
    assert_eq!(w.nullifiers.len(), 1);
    assert_eq!(w.utxos.leaf(1), utxo_leaf(&d, Amount(3), &nonce(2)).unwrap());
    assert_eq!(w.utxos.leaf(2), utxo_leaf(&c, Amount(2), &nonce(3)).unwrap());

    // the literal 2 private + 2 public split does not balance a 3 input
    let spend = w.spend(&sk_d, 1, 3, nonce(2));
    let bad = w.unshield(
        &sk_d,
        [spend.clone(), spend.clone()],
        (d, 2, nonce(4)),
        (6, b, Some(Amount(2)), 2),
    );
    let before = w.engine.state();
    assert!(matches!(
        w.apply(&bad),
        Err(LedgerError::ConservationViolation { inputs: 3, outputs: 4 })
    ));
    assert_eq!(w.engine.state(), before);

    // D spends slot 1: 1 private to D at slot 3, 2 public to B
    let op = w.unshield(
        &sk_d,
        [spend.clone(), spend],
        (d, 1, nonce(4)),
        (6, b, Some(Amount(2)), 2),
    );
    let receipt = w.apply(&op).unwrap();
    w.assert_in_sync();
    assert_eq!(receipt.state.next_utxo_index, 4);
    assert_eq!(w.accounts.leaf(6), account_leaf(&b, Amount(4)).unwrap());
    assert_eq!(w.utxos.leaf(3), utxo_leaf(&d, Amount(1), &nonce(4)).unwrap());
    assert_eq!(w.nullifiers.len(), 2);
}

#[test]
fn events_follow_data_then_index_order() {
    let mut w = World::new(8);
    let (sk_a, a) = keypair();
    let (_, b) = keypair();
    w.apply(&w.mint(1, &a, None, 4)).unwrap();
    let r = w.apply(&w.shield(&sk_a, 1, 4, &b, 4, nonce(9))).unwrap();

    let kinds: Vec<&str> = w
        .engine
        .log()
        .since(r.events.start, r.events.len() as usize)
        .iter()
        .map(|e| e.event.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "account_address",
            "account_balance",
            "account_leaf_index",
            "private_leaf",
            "private_leaf_index",
        ]
    );
}

#[test]
fn two_input_spend_marks_both_keys() {
    let mut w = World::new(8);
    let (sk_a, a) = keypair();
    let (sk_c, c) = keypair();
    let (_, d) = keypair();
    w.apply(&w.mint(0, &a, None, 9)).unwrap();
    w.apply(&w.shield(&sk_a, 0, 9, &c, 4, nonce(1))).unwrap();
    w.apply(&w.shield(&sk_a, 0, 5, &c, 5, nonce(2))).unwrap();

    let s0 = w.spend(&sk_c, 0, 4, nonce(1));
    let s1 = w.spend(&sk_c, 1, 5, nonce(2));
    let op = w.private_transfer(&sk_c, [s0, s1], [(d, 8, nonce(3)), (c, 1, nonce(4))]);
    let r = w.apply(&op).unwrap();
    w.assert_in_sync();
    assert_eq!(w.nullifiers.len(), 2);
    assert_eq!(r.state.next_utxo_index, 4);
    assert_eq!(w.accounts.leaf(0), account_leaf(&a, Amount(0)).unwrap());
}

#[test]
fn stale_append_witness_rejected() {
    let mut w = World::new(8);
    let (sk_a, a) = keypair();
    let (_, c) = keypair();
    w.apply(&w.mint(0, &a, None, 9)).unwrap();
    let first = w.shield(&sk_a, 0, 9, &c, 4, nonce(1));
    let replay = first.clone();
    w.apply(&first).unwrap();
    let err = w.apply(&replay).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::RootMismatch(_) | LedgerError::IndexMismatch(_)
    ));
}

#[test]
fn shield_requires_sender_signature() {
    let mut w = World::new(8);
    let (_, a) = keypair();
    let (sk_b, _) = keypair();
    let (_, c) = keypair();
    w.apply(&w.mint(0, &a, None, 9)).unwrap();
    let forged = w.shield(&sk_b, 0, 9, &c, 4, nonce(1));
    let Operation::Shield(mut s) = forged else {
        panic!("expected shield");
    };
    s.sender = a;
    assert!(matches!(
        w.apply(&Operation::Shield(s)),
        Err(LedgerError::AuthorizationFailure(_))
    ));
}

#[test]
fn append_at_other_empty_slot_rejected() {
    let mut w = World::new(8);
    let (sk_a, a) = keypair();
    let (_, c) = keypair();
    w.apply(&w.mint(0, &a, None, 9)).unwrap();
    w.apply(&w.shield(&sk_a, 0, 9, &c, 4, nonce(1))).unwrap();
    assert_eq!(w.engine.state().next_utxo_index, 1);

    let Operation::Shield(mut s) = w.shield(&sk_a, 0, 5, &c, 2, nonce(2)) else {
        panic!("expected shield");
    };
    s.utxo_witness = w.utxos.witness(5).unwrap();
    let before = w.engine.state();
    assert!(matches!(
        w.apply(&Operation::Shield(s)),
        Err(LedgerError::IndexMismatch(_))
    ));
    assert_eq!(w.engine.state(), before);
}

#[test]
fn second_output_must_prove_after_first_append() {
    let mut w = World::new(8);
    let (sk_a, a) = keypair();
    let (sk_c, c) = keypair();
    let (_, d) = keypair();
    w.apply(&w.mint(0, &a, None, 9)).unwrap();
    w.apply(&w.shield(&sk_a, 0, 9, &c, 5, nonce(1))).unwrap();

    let spend = w.spend(&sk_c, 0, 5, nonce(1));
    let op = w.private_transfer(
        &sk_c,
        [spend.clone(), spend],
        [(d, 3, nonce(2)), (c, 2, nonce(3))],
    );
    let Operation::PrivateTransfer(mut pt) = op else {
        panic!("expected private transfer");
    };
    // witnessed against the tree before output 0 lands
    pt.outputs[1].witness = w.utxos.witness(2).unwrap();
    let before = w.engine.state();
    assert!(matches!(
        w.apply(&Operation::PrivateTransfer(pt)),
        Err(LedgerError::RootMismatch(_))
    ));
    assert_eq!(w.engine.state(), before);
    w.assert_in_sync();
}

#[test]
fn shield_overdraft_rejected() {
    let mut w = World::new(8);
    let (sk_a, a) = keypair();
    let (_, c) = keypair();
    w.apply(&w.mint(0, &a, None, 3)).unwrap();
    let before = w.engine.state();
    assert!(matches!(
        w.apply(&w.shield(&sk_a, 0, 3, &c, 4, nonce(1))),
        Err(LedgerError::InsufficientBalance)
    ));
    assert_eq!(w.engine.state(), before);
}
