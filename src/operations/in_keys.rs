// src/operations/in_keys.rs
//
// IN-list query: prepare seeds a batch, keeps every other generated key, and
// builds the IN clause once. Cross-partition filters on the partition key
// itself; single-partition pins the fixed key and filters on a field value.

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::query::{execute_query, QueryMode};
use super::{
    BenchmarkOperation, OperationContext, OperationResult, Partitioning, PreparePolicy,
    WorkloadKind,
};
use crate::constants::{FILTER_FIELD, MULTI_ROW_QUERY_PAGE_SIZE, QUERY_SEED_BATCH};
use crate::store::QueryRequest;

/// `'a','b','c'` from the collected keys
pub fn build_in_clause(keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("'{}'", k))
        .collect::<Vec<_>>()
        .join(",")
}

pub struct InKeyQueryOperation {
    ctx: OperationContext,
    partitioning: Partitioning,
    in_keys: Vec<String>,
    in_clause: Option<String>,
}

impl InKeyQueryOperation {
    pub fn new(ctx: OperationContext, partitioning: Partitioning) -> Self {
        Self {
            ctx,
            partitioning,
            in_keys: Vec::with_capacity(QUERY_SEED_BATCH / 2),
            in_clause: None,
        }
    }

    /// IN clause built by the last prepare
    pub fn in_clause(&self) -> Option<&str> {
        self.in_clause.as_deref()
    }

    fn filtered_field(&self) -> &str {
        match self.partitioning {
            Partitioning::Cross => &self.ctx.partition_key_field,
            Partitioning::Single => FILTER_FIELD,
        }
    }
}

#[async_trait]
impl BenchmarkOperation for InKeyQueryOperation {
    fn workload(&self) -> WorkloadKind {
        match self.partitioning {
            Partitioning::Cross => WorkloadKind::QueryStreamCrossPkInKey,
            Partitioning::Single => WorkloadKind::QueryStreamSinglePkInKey,
        }
    }

    fn prepare_policy(&self) -> PreparePolicy {
        PreparePolicy::Once
    }

    async fn prepare(&mut self) -> Result<()> {
        self.in_keys.clear();
        for i in 0..QUERY_SEED_BATCH {
            let pk = self.partitioning.next_key();
            let key = match self.partitioning {
                Partitioning::Cross => pk.clone(),
                Partitioning::Single => {
                    let value = Uuid::new_v4().to_string();
                    self.ctx.set_field(FILTER_FIELD, value.as_str());
                    value
                }
            };
            self.ctx.stamp_identity(&pk);
            if i % 2 == 0 {
                self.in_keys.push(key);
            }
            self.ctx.seed_current(&pk).await?;
        }
        self.in_clause = Some(build_in_clause(&self.in_keys));
        Ok(())
    }

    async fn execute_once(&mut self) -> Result<OperationResult> {
        let Some(in_clause) = self.in_clause.as_deref() else {
            bail!("{} executed before prepare", self.workload());
        };
        let partition_key = match self.partitioning {
            Partitioning::Cross => None,
            Partitioning::Single => Some(self.partitioning.next_key()),
        };
        let request = QueryRequest::new(format!(
            "select * from c where c.{} in ({})",
            self.filtered_field(),
            in_clause
        ))
        .with_partition_key(partition_key)
        .with_page_size(MULTI_ROW_QUERY_PAGE_SIZE);
        let outcome = execute_query(&self.ctx, request, QueryMode::STREAM_SINGLE_PAGE).await?;
        Ok(outcome.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::tests::test_context;

    #[test]
    fn test_build_in_clause() {
        let keys: Vec<String> = vec!["a".into(), "b".into()];
        assert_eq!(build_in_clause(&keys), "'a','b'");
        assert_eq!(build_in_clause(&[]), "");
    }

    #[tokio::test]
    async fn test_collects_even_indexed_keys() {
        for partitioning in [Partitioning::Cross, Partitioning::Single] {
            let (store, ctx) = test_context("{}");
            let container = ctx.container.clone();
            let mut op = InKeyQueryOperation::new(ctx, partitioning);
            op.prepare().await.unwrap();

            assert_eq!(store.document_count(&container), QUERY_SEED_BATCH);
            assert_eq!(op.in_keys.len(), 5);
            let clause = op.in_clause().unwrap();
            assert_eq!(clause.split(',').count(), 5);

            let result = op.execute_once().await.unwrap();
            assert_eq!(result.diagnostics.row_count, Some(5));
        }
    }

    #[tokio::test]
    async fn test_reprepare_does_not_accumulate_keys() {
        let (_store, ctx) = test_context("{}");
        let mut op = InKeyQueryOperation::new(ctx, Partitioning::Cross);
        op.prepare().await.unwrap();
        op.prepare().await.unwrap();
        assert_eq!(op.in_clause().unwrap().split(',').count(), 5);
    }
}
