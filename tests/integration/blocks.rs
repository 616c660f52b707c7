//! Accounted blocks and live limit updates.

use std::sync::Arc;

use querycost::block::{AccountedBlock, Block};
use querycost::cost::{
    AtomicTracker, ChainedEnforcer, Cost, CostConfig, CostError, DynamicLimitManager, Enforcer,
    EnforcerOptions, LevelConfig, Limit, LimitManagerOptions, BLOCK_LEVEL,
};
use tokio::sync::mpsc;

use super::cur_cost;

struct Series {
    datapoints: Vec<f64>,
}

impl Block for Series {
    type Error = std::convert::Infallible;

    fn close(&mut self) -> Result<(), Self::Error> {
        self.datapoints.clear();
        Ok(())
    }
}

fn process(block: &AccountedBlock<Series>, batch: usize) -> Result<usize, CostError> {
    let mut read = 0;
    for chunk in block.datapoints.chunks(batch) {
        block.add_cost(Cost::from(chunk.len() as u64)).into_result()?;
        read += chunk.len();
    }
    Ok(read)
}

#[test]
fn test_blocks_released_on_every_exit_path() {
    let governor = CostConfig::new()
        .with_block(LevelConfig::new().with_threshold(25.0).with_enabled(true))
        .build()
        .unwrap();
    let query = governor.query("query");

    let mut ok = AccountedBlock::new(Series { datapoints: vec![0.0; 20] }, query.child(BLOCK_LEVEL));
    assert_eq!(process(&ok, 5), Ok(20));

    let too_big = AccountedBlock::new(Series { datapoints: vec![0.0; 40] }, query.child(BLOCK_LEVEL));
    let err = process(&too_big, 5).unwrap_err();
    assert_eq!(err.scope(), Some(BLOCK_LEVEL));
    assert_eq!(cur_cost(query.as_ref()), Cost::new(45.0));

    // abandoned on error: dropped without close
    drop(too_big);
    assert_eq!(cur_cost(query.as_ref()), Cost::new(20.0));

    ok.close().unwrap();
    assert_eq!(cur_cost(query.as_ref()), Cost::ZERO);
    assert_eq!(cur_cost(governor.root().as_ref()), Cost::ZERO);
}

#[tokio::test]
async fn test_live_limit_feed_affects_existing_tree() {
    let query_limits = Arc::new(DynamicLimitManager::new(
        LimitManagerOptions::new().with_default_limit(Limit::enabled(Cost::new(100.0))),
    ));
    let root = ChainedEnforcer::new(
        "global",
        vec![
            Enforcer::with_limit(Limit::unlimited()),
            Enforcer::new(query_limits.clone(), Arc::new(AtomicTracker::new()), EnforcerOptions::new()),
        ],
    )
    .unwrap();
    let query = root.child("query");
    assert!(query.add(Cost::new(50.0)).is_ok());

    let (tx, rx) = mpsc::channel(1);
    let feed = query_limits.spawn_feed(rx);
    tx.send(Some(Limit::enabled(Cost::new(40.0)))).await.unwrap();
    drop(tx);
    feed.await.unwrap();

    let report = query.add(Cost::new(1.0));
    assert_eq!(
        report.error.unwrap().to_string(),
        "exceeded query limit: 51 exceeds limit of 40"
    );
}
