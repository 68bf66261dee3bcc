// src/operations/query.rs
//
// Query workloads share one execution path: issue the request, then either stop
// after the first page or follow continuation tokens until the result set is
// drained. Streaming mode only counts raw rows; typed mode deserializes every
// row so the client-side decode cost is part of the measured latency.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

use super::{
    BenchmarkOperation, OperationContext, OperationResult, Partitioning, PreparePolicy,
    WorkloadKind,
};
use crate::constants::{
    FILTER_FIELD, FILTER_QUERY_PAGE_SIZE, MULTI_ROW_QUERY_PAGE_SIZE, QUERY_SEED_BATCH,
};
use crate::store::QueryRequest;

/// How results are consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryMode {
    /// Rows are left as raw bytes instead of being decoded
    pub streaming: bool,
    /// Follow continuation tokens until exhausted
    pub paginated: bool,
}

impl QueryMode {
    pub const STREAM_SINGLE_PAGE: QueryMode = QueryMode { streaming: true, paginated: false };
    pub const TYPED_SINGLE_PAGE: QueryMode = QueryMode { streaming: false, paginated: false };
    pub const STREAM_PAGINATED: QueryMode = QueryMode { streaming: true, paginated: true };
    pub const TYPED_PAGINATED: QueryMode = QueryMode { streaming: false, paginated: true };
}

/// Rows seen and total cost of one logical query
#[derive(Debug)]
pub(crate) struct QueryOutcome {
    pub rows: usize,
    pub round_trips: usize,
    pub result: OperationResult,
}

/// Run `request` to completion according to `mode`
pub(crate) async fn execute_query(
    ctx: &OperationContext,
    mut request: QueryRequest,
    mode: QueryMode,
) -> Result<QueryOutcome> {
    let mut total_cost = 0.0;
    let mut rows = 0;
    let mut round_trips = 0;

    loop {
        let page = ctx.store.run_query(&ctx.container, &request).await?;
        round_trips += 1;
        total_cost += page.cost;
        rows += page.rows.len();

        if !mode.streaming {
            for raw in &page.rows {
                let _row: Value =
                    serde_json::from_slice(raw).context("query returned a row that is not JSON")?;
            }
        }

        match page.continuation {
            Some(token) if mode.paginated => request.continuation = Some(token),
            _ => {
                return Ok(QueryOutcome {
                    rows,
                    round_trips,
                    result: ctx.result(total_cost, page.diagnostics),
                })
            }
        }
    }
}

/// Equality-filter query over a batch of seeded documents that share one filter value
pub struct FilterQueryOperation {
    ctx: OperationContext,
    workload: WorkloadKind,
    partitioning: Partitioning,
    mode: QueryMode,
    filter_value: String,
    initialized: bool,
}

impl FilterQueryOperation {
    pub fn new(
        ctx: OperationContext,
        workload: WorkloadKind,
        partitioning: Partitioning,
        mode: QueryMode,
    ) -> Self {
        Self {
            ctx,
            workload,
            partitioning,
            mode,
            // Unique per worker so each worker's query targets its own batch
            filter_value: Uuid::new_v4().to_string(),
            initialized: false,
        }
    }

    fn request(&self) -> QueryRequest {
        let page_size = if self.mode.paginated {
            MULTI_ROW_QUERY_PAGE_SIZE
        } else {
            FILTER_QUERY_PAGE_SIZE
        };
        let partition_key = match self.partitioning {
            Partitioning::Cross => None,
            Partitioning::Single => Some(self.partitioning.next_key()),
        };
        QueryRequest::new(format!("select * from T where T.{} = @val", FILTER_FIELD))
            .with_parameter("@val", self.filter_value.as_str())
            .with_partition_key(partition_key)
            .with_page_size(page_size)
    }
}

#[async_trait]
impl BenchmarkOperation for FilterQueryOperation {
    fn workload(&self) -> WorkloadKind {
        self.workload
    }

    fn prepare_policy(&self) -> PreparePolicy {
        PreparePolicy::Once
    }

    async fn prepare(&mut self) -> Result<()> {
        self.ctx.set_field(FILTER_FIELD, self.filter_value.as_str());
        for _ in 0..QUERY_SEED_BATCH {
            let pk = self.partitioning.next_key();
            self.ctx.stamp_identity(&pk);
            self.ctx.seed_current(&pk).await?;
        }
        self.initialized = true;
        Ok(())
    }

    async fn execute_once(&mut self) -> Result<OperationResult> {
        if !self.initialized {
            bail!("{} executed before prepare", self.workload);
        }
        let outcome = execute_query(&self.ctx, self.request(), self.mode).await?;
        trace!(
            rows = outcome.rows,
            round_trips = outcome.round_trips,
            "{} drained",
            self.workload
        );
        Ok(outcome.result)
    }
}
