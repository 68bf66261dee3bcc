// src/operations/datetime.rs
//
// Date-range query: documents carry descending `UpdateTime` stamps inside one
// partition and the query asks for everything newer than a fixed look-back.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};

use super::query::{execute_query, QueryMode};
use super::{
    BenchmarkOperation, OperationContext, OperationResult, Partitioning, PreparePolicy,
    WorkloadKind,
};
use crate::constants::{
    DATETIME_LOOKBACK_DAYS, MULTI_ROW_QUERY_PAGE_SIZE, QUERY_SEED_BATCH, UPDATE_TIME_FIELD,
};
use crate::store::QueryRequest;

/// Fixed-width UTC rendering so string comparison matches time order
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct DatetimeRangeQueryOperation {
    ctx: OperationContext,
    partition_key: Option<String>,
}

impl DatetimeRangeQueryOperation {
    pub fn new(ctx: OperationContext) -> Self {
        Self {
            ctx,
            partition_key: None,
        }
    }

    fn request(&self, partition_key: &str, now: DateTime<Utc>) -> QueryRequest {
        let cutoff = now - ChronoDuration::days(DATETIME_LOOKBACK_DAYS);
        QueryRequest::new(format!("select * from c where c.{} > @updateTime", UPDATE_TIME_FIELD))
            .with_parameter("@updateTime", format_timestamp(cutoff))
            .with_partition_key(Some(partition_key.to_string()))
            .with_page_size(MULTI_ROW_QUERY_PAGE_SIZE)
    }
}

#[async_trait]
impl BenchmarkOperation for DatetimeRangeQueryOperation {
    fn workload(&self) -> WorkloadKind {
        WorkloadKind::QueryDatetimeRange
    }

    fn prepare_policy(&self) -> PreparePolicy {
        PreparePolicy::Once
    }

    async fn prepare(&mut self) -> Result<()> {
        let pk = Partitioning::Single.next_key();
        let now = Utc::now();
        for i in 0..QUERY_SEED_BATCH {
            let stamp = now - ChronoDuration::days(i as i64);
            self.ctx.set_field(UPDATE_TIME_FIELD, format_timestamp(stamp));
            self.ctx.stamp_identity(&pk);
            self.ctx.seed_current(&pk).await?;
        }
        self.partition_key = Some(pk);
        Ok(())
    }

    async fn execute_once(&mut self) -> Result<OperationResult> {
        let Some(pk) = self.partition_key.as_deref() else {
            bail!("QueryDatetimeRange executed before prepare");
        };
        let request = self.request(pk, Utc::now());
        let outcome = execute_query(&self.ctx, request, QueryMode::STREAM_SINGLE_PAGE).await?;
        Ok(outcome.result)
    }
}
