// src/operations/read.rs
//
// Point-read workload: prepare seeds one document for this worker, every
// execution reads that same document back.

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{
    expect_status, BenchmarkOperation, OperationContext, OperationResult, Partitioning,
    PreparePolicy, WorkloadKind,
};
use crate::store::STATUS_OK;

pub struct ReadOperation {
    ctx: OperationContext,
    partitioning: Partitioning,
    /// (id, partition key) of the seeded document
    target: Option<(String, String)>,
}

impl ReadOperation {
    pub fn new(ctx: OperationContext, partitioning: Partitioning) -> Self {
        Self {
            ctx,
            partitioning,
            target: None,
        }
    }
}

#[async_trait]
impl BenchmarkOperation for ReadOperation {
    fn workload(&self) -> WorkloadKind {
        match self.partitioning {
            Partitioning::Cross => WorkloadKind::ReadStream,
            Partitioning::Single => WorkloadKind::ReadStreamSinglePk,
        }
    }

    fn prepare_policy(&self) -> PreparePolicy {
        PreparePolicy::Once
    }

    async fn prepare(&mut self) -> Result<()> {
        let pk = self.partitioning.next_key();
        let id = self.ctx.stamp_identity(&pk);
        self.ctx.seed_current(&pk).await?;
        self.target = Some((id, pk));
        Ok(())
    }

    async fn execute_once(&mut self) -> Result<OperationResult> {
        let Some((id, pk)) = &self.target else {
            bail!("read executed before prepare");
        };
        let resp = self.ctx.store.read_document(&self.ctx.container, id, pk).await?;
        expect_status(resp.status, STATUS_OK, "ReadItem")?;
        Ok(self.ctx.result(resp.cost, resp.diagnostics))
    }
}
