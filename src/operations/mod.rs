//! Benchmark operations: the unit of work a worker repeats
//!
//! Every workload implements [`BenchmarkOperation`], which separates setup
//! (`prepare`) from the measured call (`execute_once`). Workers build their own
//! instance through an [`OperationFactory`], so no operation state is shared
//! between workers.
//!
//! Workloads are registered explicitly in [`WorkloadKind`]; resolving a name
//! that is not registered fails before any worker starts.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::constants::FIXED_PARTITION_KEY;
use crate::store::{ContainerRef, Diagnostics, StoreClient, StoreError, STATUS_CREATED};

mod datetime;
mod in_keys;
mod insert;
mod query;
mod read;

pub use datetime::DatetimeRangeQueryOperation;
pub use in_keys::{build_in_clause, InKeyQueryOperation};
pub use insert::InsertOperation;
pub use query::{FilterQueryOperation, QueryMode};
pub use read::ReadOperation;

// -----------------------------------------------------------------------------
// Operation contract
// -----------------------------------------------------------------------------

/// Outcome of one successful `execute_once`
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub database: String,
    pub container: String,
    pub cost: f64,
    /// Raw backend diagnostics; see [`OperationResult::diagnostics_string`]
    pub diagnostics: Diagnostics,
}

impl OperationResult {
    /// Format the diagnostics payload. Nothing is rendered unless this is called.
    pub fn diagnostics_string(&self) -> String {
        self.diagnostics.to_string()
    }
}

/// When a worker must call `prepare`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparePolicy {
    /// Once before the first execution; the prepared state is reused afterwards
    Once,
    /// Before every execution (e.g. a fresh id for every write)
    EveryIteration,
}

#[async_trait]
pub trait BenchmarkOperation: Send {
    fn workload(&self) -> WorkloadKind;

    fn prepare_policy(&self) -> PreparePolicy;

    /// Seed or randomize whatever the next `execute_once` needs
    async fn prepare(&mut self) -> Result<()>;

    /// Issue exactly one logical operation. Non-success statuses come back as `Err`.
    async fn execute_once(&mut self) -> Result<OperationResult>;
}

pub type OperationFactory = Arc<dyn Fn() -> Box<dyn BenchmarkOperation> + Send + Sync>;

// -----------------------------------------------------------------------------
// Shared state every workload starts from
// -----------------------------------------------------------------------------

/// Cross- or single-partition key selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partitioning {
    /// Fresh random key per document
    Cross,
    /// Every document on [`FIXED_PARTITION_KEY`]
    Single,
}

impl Partitioning {
    pub fn next_key(&self) -> String {
        match self {
            Partitioning::Cross => Uuid::new_v4().to_string(),
            Partitioning::Single => FIXED_PARTITION_KEY.to_string(),
        }
    }
}

/// Container identity, partition-key field and the sample document template
#[derive(Clone)]
pub struct OperationContext {
    pub store: Arc<dyn StoreClient>,
    pub container: ContainerRef,
    /// Partition-key path without the leading '/'
    pub partition_key_field: String,
    pub sample: Map<String, Value>,
}

impl OperationContext {
    pub fn new(
        store: Arc<dyn StoreClient>,
        container: ContainerRef,
        partition_key_path: &str,
        sample_json: &str,
    ) -> Result<Self> {
        let sample: Value =
            serde_json::from_str(sample_json).context("item template is not valid JSON")?;
        let Value::Object(sample) = sample else {
            bail!("item template must be a JSON object");
        };
        let partition_key_field = partition_key_path.replace('/', "");
        if partition_key_field.is_empty() {
            bail!("partition key path '{}' names no field", partition_key_path);
        }
        Ok(Self {
            store,
            container,
            partition_key_field,
            sample,
        })
    }

    pub fn set_field(&mut self, field: &str, value: impl Into<Value>) {
        self.sample.insert(field.to_string(), value.into());
    }

    /// Give the sample a fresh id and the given partition key; returns the id
    pub fn stamp_identity(&mut self, partition_key: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.sample.insert("id".to_string(), Value::String(id.clone()));
        let field = self.partition_key_field.clone();
        self.set_field(&field, partition_key);
        id
    }

    pub fn payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.sample).context("serialize sample document")
    }

    /// Write the current sample as a seed document; any failure is fatal for the caller
    pub async fn seed_current(&self, partition_key: &str) -> Result<()> {
        let resp = self
            .store
            .create_document(&self.container, partition_key, self.payload()?)
            .await
            .with_context(|| format!("seed document in {}", self.container))?;
        expect_status(resp.status, STATUS_CREATED, "seed create")
    }

    pub fn result(&self, cost: f64, diagnostics: Diagnostics) -> OperationResult {
        OperationResult {
            database: self.container.database.clone(),
            container: self.container.container.clone(),
            cost,
            diagnostics,
        }
    }
}

/// Turn an unexpected-but-Ok status into the same error a failed call produces
pub(crate) fn expect_status(actual: u16, expected: u16, what: &str) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(StoreError::new(actual, format!("{} returned {} (expected {})", what, actual, expected)).into())
    }
}

// -----------------------------------------------------------------------------
// Workload registry
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Insert,
    InsertSinglePk,
    ReadStream,
    ReadStreamSinglePk,
    QueryStreamCrossPk,
    QueryStreamSinglePk,
    QueryTCrossPk,
    QueryStreamCrossPkWithPagination,
    QueryTSinglePkWithPagination,
    QueryDatetimeRange,
    QueryStreamCrossPkInKey,
    QueryStreamSinglePkInKey,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 12] = [
        WorkloadKind::Insert,
        WorkloadKind::InsertSinglePk,
        WorkloadKind::ReadStream,
        WorkloadKind::ReadStreamSinglePk,
        WorkloadKind::QueryStreamCrossPk,
        WorkloadKind::QueryStreamSinglePk,
        WorkloadKind::QueryTCrossPk,
        WorkloadKind::QueryStreamCrossPkWithPagination,
        WorkloadKind::QueryTSinglePkWithPagination,
        WorkloadKind::QueryDatetimeRange,
        WorkloadKind::QueryStreamCrossPkInKey,
        WorkloadKind::QueryStreamSinglePkInKey,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WorkloadKind::Insert => "Insert",
            WorkloadKind::InsertSinglePk => "InsertSinglePk",
            WorkloadKind::ReadStream => "ReadStream",
            WorkloadKind::ReadStreamSinglePk => "ReadStreamSinglePk",
            WorkloadKind::QueryStreamCrossPk => "QueryStreamCrossPk",
            WorkloadKind::QueryStreamSinglePk => "QueryStreamSinglePk",
            WorkloadKind::QueryTCrossPk => "QueryTCrossPk",
            WorkloadKind::QueryStreamCrossPkWithPagination => "QueryStreamCrossPkWithPagination",
            WorkloadKind::QueryTSinglePkWithPagination => "QueryTSinglePkWithPagination",
            WorkloadKind::QueryDatetimeRange => "QueryDatetimeRange",
            WorkloadKind::QueryStreamCrossPkInKey => "QueryStreamCrossPkInKey",
            WorkloadKind::QueryStreamSinglePkInKey => "QueryStreamSinglePkInKey",
        }
    }

    /// Fixed-signature constructor for this workload
    pub fn construct(&self, ctx: OperationContext) -> Box<dyn BenchmarkOperation> {
        use Partitioning::{Cross, Single};
        match self {
            WorkloadKind::Insert => Box::new(InsertOperation::new(ctx, Cross)),
            WorkloadKind::InsertSinglePk => Box::new(InsertOperation::new(ctx, Single)),
            WorkloadKind::ReadStream => Box::new(ReadOperation::new(ctx, Cross)),
            WorkloadKind::ReadStreamSinglePk => Box::new(ReadOperation::new(ctx, Single)),
            WorkloadKind::QueryStreamCrossPk => Box::new(FilterQueryOperation::new(
                ctx,
                *self,
                Cross,
                QueryMode::STREAM_SINGLE_PAGE,
            )),
            WorkloadKind::QueryStreamSinglePk => Box::new(FilterQueryOperation::new(
                ctx,
                *self,
                Single,
                QueryMode::STREAM_SINGLE_PAGE,
            )),
            WorkloadKind::QueryTCrossPk => Box::new(FilterQueryOperation::new(
                ctx,
                *self,
                Cross,
                QueryMode::TYPED_SINGLE_PAGE,
            )),
            WorkloadKind::QueryStreamCrossPkWithPagination => Box::new(FilterQueryOperation::new(
                ctx,
                *self,
                Cross,
                QueryMode::STREAM_PAGINATED,
            )),
            WorkloadKind::QueryTSinglePkWithPagination => Box::new(FilterQueryOperation::new(
                ctx,
                *self,
                Single,
                QueryMode::TYPED_PAGINATED,
            )),
            WorkloadKind::QueryDatetimeRange => Box::new(DatetimeRangeQueryOperation::new(ctx)),
            WorkloadKind::QueryStreamCrossPkInKey => Box::new(InKeyQueryOperation::new(ctx, Cross)),
            WorkloadKind::QueryStreamSinglePkInKey => Box::new(InKeyQueryOperation::new(ctx, Single)),
        }
    }

    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WorkloadKind {
    type Err = anyhow::Error;

    /// Case-insensitive; a trailing "BenchmarkOperation" is accepted
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        let lower = wanted.to_ascii_lowercase();
        let stripped = lower.strip_suffix("benchmarkoperation").unwrap_or(&lower);
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(stripped))
            .ok_or_else(|| {
                anyhow!(
                    "Unsupported workload type '{}'. Available ones are: {}",
                    wanted,
                    Self::available()
                )
            })
    }
}

/// Build the per-worker factory for `workload`
///
/// The template is parsed once here; each call of the returned factory clones
/// the prototype context into a brand-new operation.
pub fn resolve_factory(workload: WorkloadKind, prototype: OperationContext) -> OperationFactory {
    Arc::new(move || workload.construct(prototype.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated_store::{SimulatedStore, SimulatedStoreSettings};

    pub(crate) fn test_context(template: &str) -> (Arc<SimulatedStore>, OperationContext) {
        let store = Arc::new(SimulatedStore::new(SimulatedStoreSettings::instant()));
        let container = ContainerRef::new("db", "items");
        store.add_container_without_throughput(&container, "/partitionKey");
        let ctx = OperationContext::new(store.clone(), container, "/partitionKey", template).unwrap();
        (store, ctx)
    }

    #[test]
    fn test_workload_names_round_trip() {
        for kind in WorkloadKind::ALL {
            assert_eq!(kind.name().parse::<WorkloadKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_workload_name_variants_accepted() {
        assert_eq!("insert".parse::<WorkloadKind>().unwrap(), WorkloadKind::Insert);
        assert_eq!(
            "ReadStreamBenchmarkOperation".parse::<WorkloadKind>().unwrap(),
            WorkloadKind::ReadStream
        );
        assert_eq!(
            " queryDatetimeRange ".parse::<WorkloadKind>().unwrap(),
            WorkloadKind::QueryDatetimeRange
        );
    }

    #[test]
    fn test_unknown_workload_lists_available() {
        let err = "Upsert".parse::<WorkloadKind>().unwrap_err().to_string();
        assert!(err.contains("Unsupported workload type 'Upsert'"));
        assert!(err.contains("QueryStreamSinglePkInKey"));
    }

    #[test]
    fn test_context_rejects_bad_templates() {
        let store: Arc<dyn StoreClient> = Arc::new(SimulatedStore::new(SimulatedStoreSettings::instant()));
        let c = ContainerRef::new("db", "items");
        assert!(OperationContext::new(store.clone(), c.clone(), "/pk", "[1,2]").is_err());
        assert!(OperationContext::new(store.clone(), c.clone(), "/pk", "{not json").is_err());
        assert!(OperationContext::new(store.clone(), c.clone(), "/", "{}").is_err());
        let ctx = OperationContext::new(store, c, "/pk", "{}").unwrap();
        assert_eq!(ctx.partition_key_field, "pk");
    }

    #[test]
    fn test_stamp_identity_sets_fields() {
        let (_store, mut ctx) = test_context(r#"{"name":"sample"}"#);
        let id1 = ctx.stamp_identity("p1");
        let id2 = ctx.stamp_identity("p1");
        assert_ne!(id1, id2);
        assert_eq!(ctx.sample["id"], Value::String(id2));
        assert_eq!(ctx.sample["partitionKey"], "p1");
        // Template field order is preserved, new fields are appended
        assert_eq!(ctx.sample.keys().next().map(String::as_str), Some("name"));
    }

    #[test]
    fn test_factory_builds_independent_operations() {
        let (_store, ctx) = test_context("{}");
        let factory = resolve_factory(WorkloadKind::InsertSinglePk, ctx);
        let a = factory();
        let b = factory();
        assert_eq!(a.workload(), WorkloadKind::InsertSinglePk);
        assert_eq!(b.prepare_policy(), PreparePolicy::EveryIteration);
    }

    #[test]
    fn test_partitioning_keys() {
        assert_eq!(Partitioning::Single.next_key(), FIXED_PARTITION_KEY);
        assert_ne!(Partitioning::Cross.next_key(), Partitioning::Cross.next_key());
    }

    #[test]
    fn test_expect_status() {
        assert!(expect_status(201, 201, "create").is_ok());
        let err = expect_status(200, 201, "create").unwrap_err();
        assert_eq!(crate::store::error_status(&err), Some(200));
    }
}
