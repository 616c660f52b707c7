//! Rollup under concurrent updates.

use std::sync::Barrier;
use std::thread;

use querycost::cost::{ChainedEnforcer, Cost, Enforcer};
use tokio::sync::mpsc;

use super::{cur_cost, tree};

#[test]
fn test_concurrent_rollup_is_exact() {
    let root = tree(&[1e12, 1e12, 1e12]);
    let queries: Vec<_> = (0..4).map(|i| root.child(format!("query-{}", i))).collect();

    thread::scope(|s| {
        for query in &queries {
            for _ in 0..4 {
                let block = query.child("block");
                s.spawn(move || {
                    for _ in 0..500 {
                        block.add(Cost::new(2.0));
                    }
                    assert_eq!(cur_cost(block.as_ref()), Cost::new(1000.0));
                });
            }
        }
    });

    for query in &queries {
        assert_eq!(cur_cost(query.as_ref()), Cost::new(4000.0));
    }
    assert_eq!(cur_cost(root.as_ref()), Cost::new(16_000.0));
}

#[test]
fn test_concurrent_release_returns_to_zero() {
    let root = tree(&[1e12, 1e12, 1e12]);
    let query = root.child("query");

    thread::scope(|s| {
        for i in 0..8 {
            let block = query.child(format!("block-{}", i));
            s.spawn(move || {
                for _ in 0..100 {
                    block.add(Cost::new(1.5));
                }
                block.release().unwrap();
            });
        }
    });

    assert_eq!(cur_cost(query.as_ref()), Cost::ZERO);
    assert_eq!(cur_cost(root.as_ref()), Cost::ZERO);
}

#[test]
fn test_release_racing_block_adds_leaves_no_global_cost() {
    for _ in 0..2000 {
        let root = tree(&[1e12, 1e12, 1e12]);
        let query = root.child("query");
        let block = query.child("block");
        let start = Barrier::new(2);

        thread::scope(|s| {
            s.spawn(|| {
                start.wait();
                for _ in 0..20 {
                    block.add(Cost::new(1.0));
                }
            });
            s.spawn(|| {
                start.wait();
                query.release().unwrap();
            });
        });

        block.release().unwrap();
        assert_eq!(cur_cost(block.as_ref()), Cost::ZERO);
        assert_eq!(cur_cost(root.as_ref()), Cost::ZERO);
    }
}

#[test]
fn test_noop_accepts_concurrent_adds() {
    let noop = ChainedEnforcer::noop();
    let enforcer = Enforcer::noop();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..1000 {
                    assert!(noop.add(Cost::new(1e9)).is_ok());
                    assert_eq!(enforcer.add(Cost::new(1e9)).cost, Cost::ZERO);
                }
            });
        }
    });

    assert_eq!(cur_cost(noop.as_ref()), Cost::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rollup_across_tasks() {
    let root = tree(&[1e12, 1e12, 1e12]);
    let query = root.child("query");
    let (done_tx, mut done_rx) = mpsc::channel(16);

    for _ in 0..16 {
        let block = query.child("block");
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                block.add(Cost::new(1.0));
                tokio::task::yield_now().await;
            }
            done_tx.send(cur_cost(block.as_ref())).await.unwrap();
        });
    }
    drop(done_tx);

    let mut total = Cost::ZERO;
    while let Some(cost) = done_rx.recv().await {
        total += cost;
    }

    assert_eq!(total, Cost::new(800.0));
    assert_eq!(cur_cost(query.as_ref()), total);
    assert_eq!(cur_cost(root.as_ref()), total);
}
