// src/operations/insert.rs
//
// Insert workload: one fresh document per execution.

use anyhow::Result;
use async_trait::async_trait;

use super::{
    expect_status, BenchmarkOperation, OperationContext, OperationResult, Partitioning,
    PreparePolicy, WorkloadKind,
};
use crate::store::STATUS_CREATED;

pub struct InsertOperation {
    ctx: OperationContext,
    partitioning: Partitioning,
    partition_key: Option<String>,
}

impl InsertOperation {
    pub fn new(ctx: OperationContext, partitioning: Partitioning) -> Self {
        Self {
            ctx,
            partitioning,
            partition_key: None,
        }
    }

    /// Partition key the next write will use
    pub fn partition_key(&self) -> Option<&str> {
        self.partition_key.as_deref()
    }
}

#[async_trait]
impl BenchmarkOperation for InsertOperation {
    fn workload(&self) -> WorkloadKind {
        match self.partitioning {
            Partitioning::Cross => WorkloadKind::Insert,
            Partitioning::Single => WorkloadKind::InsertSinglePk,
        }
    }

    fn prepare_policy(&self) -> PreparePolicy {
        PreparePolicy::EveryIteration
    }

    async fn prepare(&mut self) -> Result<()> {
        let pk = self.partitioning.next_key();
        self.ctx.stamp_identity(&pk);
        self.partition_key = Some(pk);
        Ok(())
    }

    async fn execute_once(&mut self) -> Result<OperationResult> {
        let Some(pk) = self.partition_key.as_deref() else {
            anyhow::bail!("insert executed before prepare");
        };
        let resp = self
            .ctx
            .store
            .create_document(&self.ctx.container, pk, self.ctx.payload()?)
            .await?;
        expect_status(resp.status, STATUS_CREATED, "CreateItem")?;
        Ok(self.ctx.result(resp.cost, resp.diagnostics))
    }
}
