#![allow(dead_code)]

use k256::ecdsa::SigningKey;
use rand_core::OsRng;

use shade_core::*;
use shade_mirror::*;
use shade_state::*;

pub struct Actor {
    pub sk: SigningKey,
    pub pk: PublicKey,
}

pub fn actor() -> Actor {
    let sk = SigningKey::random(&mut OsRng);
    let pk = PublicKey::from_signing_key(&sk);
    Actor { sk, pk }
}

pub fn nonce(n: u8) -> Nonce {
    Hash32([n; 32])
}

pub fn out(to: &Actor, amount: u64, n: u8) -> OutputSpec {
    OutputSpec {
        recipient: to.pk,
        amount: Amount(amount),
        nonce: nonce(n),
    }
}

/// Apply `op` on the engine, then bring the mirror up to date and compare.
pub fn submit(engine: &mut LedgerEngine, mirror: &mut Mirror, op: Operation) -> Receipt {
    let receipt = engine.apply(&op).unwrap();
    mirror
        .apply_all(engine.log().since(mirror.cursor(), usize::MAX))
        .unwrap();
    assert_eq!(mirror.state(), engine.state());
    receipt
}

/// Mint, transfer, shield, private transfer, unshield.
pub fn run_scenario(engine: &mut LedgerEngine, mirror: &mut Mirror) -> [Actor; 4] {
    let (a, b, c, d) = (actor(), actor(), actor(), actor());

    let op = Builder::new(mirror).mint(2, &a.pk, Amount(10)).unwrap();
    submit(engine, mirror, op);

    let op = Builder::new(mirror)
        .transfer(&a.sk, 2, 6, &b.pk, Amount(7))
        .unwrap();
    submit(engine, mirror, op);

    let op = Builder::new(mirror).shield(&b.sk, 6, out(&c, 5, 1)).unwrap();
    submit(engine, mirror, op);

    let builder = Builder::new(mirror);
    let s = builder.spend(&c.sk, 0, Amount(5), nonce(1)).unwrap();
    let op = builder
        .private_transfer(&c.sk, [s.clone(), s], [out(&d, 3, 2), out(&c, 2, 3)])
        .unwrap();
    submit(engine, mirror, op);

    let builder = Builder::new(mirror);
    let s = builder.spend(&d.sk, 1, Amount(3), nonce(2)).unwrap();
    let op = builder
        .unshield(&d.sk, [s.clone(), s], out(&d, 1, 4), 6, &b.pk, Amount(2))
        .unwrap();
    submit(engine, mirror, op);

    [a, b, c, d]
}
