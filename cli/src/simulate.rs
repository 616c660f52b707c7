//! Synthetic query workload.
//!
//! Every query fans out into blocks processed on their own tasks. A block
//! reads its datapoints in batches, charging each batch to its enforcer,
//! and stops at the first limit violation.

use std::sync::Arc;

use futures::future::join_all;
use querycost::block::{AccountedBlock, Block};
use querycost::cost::{ChainedEnforcer, Cost, CostGovernor, BLOCK_LEVEL};
use querycost::metrics::EnforcerMetricsSnapshot;
use serde::Serialize;
use tracing::{debug, info};

/// Shape of the generated workload.
#[derive(Debug, Clone)]
pub struct Workload {
    pub queries: usize,
    pub blocks_per_query: usize,
    pub datapoints_per_block: usize,
    pub batch_size: usize,
}

/// Outcome of one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub query: String,
    pub blocks_completed: usize,
    pub blocks_rejected: usize,
    pub datapoints_read: u64,
    pub first_error: Option<String>,
}

/// Outcome of the whole run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub queries: Vec<QueryOutcome>,
    pub blocks_rejected: usize,
    pub global_cost: f64,
    pub metrics: Vec<EnforcerMetricsSnapshot>,
}

struct SeriesBlock {
    datapoints: Vec<f64>,
}

impl Block for SeriesBlock {
    type Error = std::convert::Infallible;

    fn close(&mut self) -> Result<(), Self::Error> {
        self.datapoints = Vec::new();
        Ok(())
    }
}

enum BlockOutcome {
    Completed(u64),
    Rejected(u64, String),
}

pub async fn run(governor: &CostGovernor, workload: &Workload) -> SimulationSummary {
    let queries = (0..workload.queries).map(|i| {
        let query = governor.query(format!("query-{}", i));
        run_query(query, workload.clone())
    });
    let queries = join_all(queries).await;

    let blocks_rejected = queries.iter().map(|q| q.blocks_rejected).sum();
    let global_cost = governor.root().state().0.cost.value();
    info!(blocks_rejected, global_cost, "simulation finished");

    SimulationSummary {
        queries,
        blocks_rejected,
        global_cost,
        metrics: governor.metrics(),
    }
}

async fn run_query(query: Arc<ChainedEnforcer>, workload: Workload) -> QueryOutcome {
    let blocks = (0..workload.blocks_per_query).map(|_| {
        let block = AccountedBlock::new(
            SeriesBlock {
                datapoints: vec![1.0; workload.datapoints_per_block],
            },
            query.child(BLOCK_LEVEL),
        );
        tokio::spawn(process_block(block, workload.batch_size.max(1)))
    });

    let mut outcome = QueryOutcome {
        query: query.resource_name().to_string(),
        blocks_completed: 0,
        blocks_rejected: 0,
        datapoints_read: 0,
        first_error: None,
    };

    for result in join_all(blocks).await {
        match result {
            Ok(BlockOutcome::Completed(read)) => {
                outcome.blocks_completed += 1;
                outcome.datapoints_read += read;
            }
            Ok(BlockOutcome::Rejected(read, err)) => {
                outcome.blocks_rejected += 1;
                outcome.datapoints_read += read;
                outcome.first_error.get_or_insert(err);
            }
            Err(err) => {
                outcome.blocks_rejected += 1;
                outcome.first_error.get_or_insert(err.to_string());
            }
        }
    }

    if let Err(err) = query.release() {
        debug!(%err, "query enforcer release failed");
    }
    outcome
}

async fn process_block(mut block: AccountedBlock<SeriesBlock>, batch_size: usize) -> BlockOutcome {
    let mut read = 0u64;
    let mut rejection = None;

    for len in block.datapoints.chunks(batch_size).map(<[f64]>::len).collect::<Vec<_>>() {
        let report = block.add_cost(Cost::from(len as u64));
        read += len as u64;
        if let Some(err) = report.error {
            rejection = Some(err.to_string());
            break;
        }
        tokio::task::yield_now().await;
    }

    match block.close() {
        Ok(()) => {}
        Err(never) => match never {},
    }

    match rejection {
        Some(err) => BlockOutcome::Rejected(read, err),
        None => BlockOutcome::Completed(read),
    }
}
