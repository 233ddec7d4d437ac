mod common;

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use common::{actor, out};
use shade_core::*;
use shade_mirror::*;
use shade_state::*;

/// Engine shared with the follower thread, read through its log.
struct SharedEngine(Arc<Mutex<LedgerEngine>>);

impl EventSource for SharedEngine {
    fn fetch_since(&self, since: u64, limit: usize) -> Result<Vec<SequencedEvent>, MirrorError> {
        let engine = self
            .0
            .lock()
            .map_err(|_| MirrorError::Unavailable("engine lock poisoned".into()))?;
        Ok(engine.log().since(since, limit).to_vec())
    }
}

fn cfg() -> FollowerConfig {
    FollowerConfig {
        interval: Duration::from_millis(5),
        batch: 4,
    }
}

#[test]
fn follower_tracks_engine() {
    let engine = Arc::new(Mutex::new(LedgerEngine::new(16).unwrap()));
    let mirror = Arc::new(RwLock::new(Mirror::new(16)));
    let follower = Follower::spawn(
        Arc::clone(&mirror),
        SharedEngine(Arc::clone(&engine)),
        cfg(),
    );
    let (a, b) = (actor(), actor());

    let op = Builder::new(&mirror.read().unwrap())
        .mint(0, &a.pk, Amount(9))
        .unwrap();
    let r = engine.lock().unwrap().apply(&op).unwrap();
    assert!(wait_for_cursor(&mirror, r.events.end, Duration::from_secs(5)));

    // the next witness must come from a mirror that has seen the mint
    let op = Builder::new(&mirror.read().unwrap())
        .shield(&a.sk, 0, out(&b, 4, 1))
        .unwrap();
    let r = engine.lock().unwrap().apply(&op).unwrap();
    assert!(wait_for_cursor(&mirror, r.events.end, Duration::from_secs(5)));

    follower.stop();
    let engine_state = engine.lock().unwrap().state();
    assert_eq!(mirror.read().unwrap().state(), engine_state);
    assert_eq!(engine_state.next_utxo_index, 1);
}

#[test]
fn operation_built_on_stale_mirror_is_rejected() {
    let mut engine = LedgerEngine::new(16).unwrap();
    let mirror = RwLock::new(Mirror::new(16));
    let (a, b) = (actor(), actor());

    let op = Builder::new(&mirror.read().unwrap())
        .mint(0, &a.pk, Amount(9))
        .unwrap();
    engine.apply(&op).unwrap();
    catch_up(&mirror, engine.log(), 8).unwrap();
    let snapshot = mirror.read().unwrap().clone();

    let first = Builder::new(&snapshot)
        .transfer(&a.sk, 0, 1, &b.pk, Amount(2))
        .unwrap();
    let second = Builder::new(&snapshot)
        .transfer(&a.sk, 0, 2, &b.pk, Amount(3))
        .unwrap();
    engine.apply(&first).unwrap();
    assert!(matches!(
        engine.apply(&second),
        Err(LedgerError::RootMismatch(_))
    ));

    catch_up(&mirror, engine.log(), 8).unwrap();
    let retry = Builder::new(&mirror.read().unwrap())
        .transfer(&a.sk, 0, 2, &b.pk, Amount(3))
        .unwrap();
    engine.apply(&retry).unwrap();
    catch_up(&mirror, engine.log(), 8).unwrap();
    assert_eq!(mirror.read().unwrap().state(), engine.state());
    assert_eq!(mirror.read().unwrap().account(0).unwrap().balance, Amount(4));
}
