// tests/scheduler_tests.rs
//
// Accounting properties of the execution scheduler: attempted totals, warm-up
// exclusion, failure isolation and fatal prepare errors.

use anyhow::{bail, Result};
use async_trait::async_trait;
use docstore_bench::executor::{self, warmup_operations, SchedulerOptions};
use docstore_bench::operations::{
    resolve_factory, BenchmarkOperation, OperationContext, OperationFactory, OperationResult,
    PreparePolicy, WorkloadKind,
};
use docstore_bench::simulated_store::{SimulatedStore, SimulatedStoreSettings};
use docstore_bench::store::{
    ContainerRef, Diagnostics, QueryPage, QueryRequest, StoreClient, StoreError, StoreResponse,
    STATUS_OK, STATUS_TOO_MANY_REQUESTS,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Deterministic operation: fails when `iteration % fail_modulus == fail_at`
struct ScriptedOp {
    iteration: u64,
    fail_modulus: u64,
    fail_at: Option<u64>,
    fail_prepare: bool,
    policy: PreparePolicy,
    prepares: Arc<AtomicU64>,
}

#[async_trait]
impl BenchmarkOperation for ScriptedOp {
    fn workload(&self) -> WorkloadKind {
        WorkloadKind::Insert
    }

    fn prepare_policy(&self) -> PreparePolicy {
        self.policy
    }

    async fn prepare(&mut self) -> Result<()> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        if self.fail_prepare {
            bail!("seed document could not be created");
        }
        Ok(())
    }

    async fn execute_once(&mut self) -> Result<OperationResult> {
        let i = self.iteration;
        self.iteration += 1;
        tokio::task::yield_now().await;
        if self.fail_at == Some(i % self.fail_modulus) {
            bail!("scripted failure at iteration {}", i);
        }
        Ok(OperationResult {
            database: "db".into(),
            container: "scripted".into(),
            cost: 1.0,
            diagnostics: Diagnostics::new("Scripted", STATUS_OK, 1.0),
        })
    }
}

fn scripted_factory(
    fail_modulus: u64,
    fail_at: Option<u64>,
    policy: PreparePolicy,
    prepares: Arc<AtomicU64>,
) -> OperationFactory {
    Arc::new(move || {
        Box::new(ScriptedOp {
            iteration: 0,
            fail_modulus,
            fail_at,
            fail_prepare: false,
            policy,
            prepares: prepares.clone(),
        }) as Box<dyn BenchmarkOperation>
    })
}

fn quiet() -> SchedulerOptions {
    SchedulerOptions {
        progress_interval: Duration::ZERO,
        ..SchedulerOptions::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_attempted_equals_workers_times_ops() {
    let prepares = Arc::new(AtomicU64::new(0));
    let factory = scripted_factory(1, None, PreparePolicy::Once, prepares.clone());

    let summary = executor::run(factory, 8, 50, 0.0, quiet()).await.unwrap();

    assert_eq!(summary.attempted, 400);
    assert_eq!(summary.succeeded, 400);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.latency.unwrap().count, 400);
    assert_eq!(summary.total_cost, 400.0);
    assert_eq!(summary.database, "db");
    assert_eq!(summary.container, "scripted");
    assert_eq!(summary.workload_type, "Insert");
    // Once-policy operations are prepared a single time per worker
    assert_eq!(prepares.load(Ordering::SeqCst), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_warmup_window_scenario() {
    let factory = scripted_factory(1, None, PreparePolicy::Once, Arc::new(AtomicU64::new(0)));

    let summary = executor::run(factory, 4, 100, 0.1, quiet()).await.unwrap();

    assert_eq!(summary.attempted, 400);
    assert_eq!(summary.warmup_operations, 40);
    assert_eq!(summary.succeeded, 400);
    let latency = summary.latency.unwrap();
    assert_eq!(latency.count, 360);
    // Warm-up calls carry no cost
    assert_eq!(summary.total_cost, 360.0);
    assert_eq!(summary.cost_per_operation, 1.0);
    // Throughput counts only measured successes over the full wall clock
    let expected = 360.0 / summary.duration.as_secs_f64().max(1e-9);
    assert!((summary.throughput - expected).abs() < 1e-6 * expected);
}

#[tokio::test]
async fn test_warmup_window_uses_exact_decimal_fraction() {
    let factory = scripted_factory(1, None, PreparePolicy::Once, Arc::new(AtomicU64::new(0)));

    let summary = executor::run(factory, 2, 100, 0.29, quiet()).await.unwrap();

    assert_eq!(summary.warmup_operations, 58);
    assert_eq!(summary.latency.unwrap().count, 142);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_histogram_count_excludes_warmup_and_failures() {
    let workers = 4usize;
    let ops = 100u64;
    let fraction = 0.1;
    // Fails at iterations 3, 13, 23, ... : one inside the warm-up window, nine outside
    let factory = scripted_factory(10, Some(3), PreparePolicy::Once, Arc::new(AtomicU64::new(0)));

    let summary = executor::run(factory, workers, ops, fraction, quiet()).await.unwrap();

    let warmup = warmup_operations(ops, fraction);
    let measured_failures = 9 * workers as u64;
    assert_eq!(summary.attempted, workers as u64 * ops);
    assert_eq!(summary.failed, 10 * workers as u64);
    assert!(summary.succeeded <= summary.attempted);
    assert_eq!(
        summary.latency.unwrap().count,
        summary.attempted - workers as u64 * warmup - measured_failures
    );
    assert_eq!(summary.failures.len(), 20);
    assert!(summary.failures[0].contains("scripted failure"));
}

#[tokio::test]
async fn test_every_iteration_policy_prepares_each_call() {
    let prepares = Arc::new(AtomicU64::new(0));
    let factory = scripted_factory(1, None, PreparePolicy::EveryIteration, prepares.clone());

    executor::run(factory, 3, 20, 0.0, quiet()).await.unwrap();
    assert_eq!(prepares.load(Ordering::SeqCst), 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_prepare_failure_aborts_run() {
    let built = Arc::new(AtomicU64::new(0));
    let prepares = Arc::new(AtomicU64::new(0));
    let factory: OperationFactory = {
        let built = built.clone();
        let prepares = prepares.clone();
        Arc::new(move || {
            let n = built.fetch_add(1, Ordering::SeqCst);
            Box::new(ScriptedOp {
                iteration: 0,
                fail_modulus: 1,
                fail_at: None,
                fail_prepare: n == 1,
                policy: PreparePolicy::Once,
                prepares: prepares.clone(),
            }) as Box<dyn BenchmarkOperation>
        })
    };

    let err = executor::run(factory, 4, 1000, 0.0, quiet()).await.unwrap_err();
    let msg = format!("{:#}", err);
    assert!(msg.contains("prepare failed"), "{}", msg);
    assert!(msg.contains("seed document could not be created"), "{}", msg);
    assert_eq!(built.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_invalid_run_parameters_rejected() {
    let factory = scripted_factory(1, None, PreparePolicy::Once, Arc::new(AtomicU64::new(0)));
    assert!(executor::run(factory.clone(), 0, 10, 0.0, quiet()).await.is_err());
    assert!(executor::run(factory.clone(), 1, 0, 0.0, quiet()).await.is_err());
    assert!(executor::run(factory.clone(), 1, 10, 1.0, quiet()).await.is_err());
    assert!(executor::run(factory, 1, 10, f64::NAN, quiet()).await.is_err());
}

#[tokio::test]
async fn test_slow_operations_capture_diagnostics() {
    let factory = scripted_factory(1, None, PreparePolicy::Once, Arc::new(AtomicU64::new(0)));
    let options = SchedulerOptions {
        diagnostics_threshold: Duration::ZERO,
        max_diagnostics: 3,
        ..quiet()
    };
    let summary = executor::run(factory, 2, 10, 0.0, options).await.unwrap();
    assert_eq!(summary.diagnostics.len(), 3);
    assert!(summary.diagnostics[0].contains("Scripted"));
}

#[tokio::test]
async fn test_progress_reporter_does_not_disturb_counts() {
    let factory = scripted_factory(1, None, PreparePolicy::Once, Arc::new(AtomicU64::new(0)));
    let options = SchedulerOptions {
        progress_interval: Duration::from_millis(1),
        ..SchedulerOptions::default()
    };
    let summary = executor::run(factory, 2, 200, 0.0, options).await.unwrap();
    assert_eq!(summary.attempted, 400);
}

// -----------------------------------------------------------------------------
// Real workloads against the simulated store
// -----------------------------------------------------------------------------

/// Passes everything through to the simulated store but throttles the Nth write
struct FaultyStore {
    inner: SimulatedStore,
    creates: AtomicU64,
    fail_on_create: u64,
}

#[async_trait]
impl StoreClient for FaultyStore {
    async fn ensure_container(&self, c: &ContainerRef, pk_path: &str, throughput: u64) -> Result<bool> {
        self.inner.ensure_container(c, pk_path, throughput).await
    }

    async fn delete_container(&self, c: &ContainerRef) -> Result<()> {
        self.inner.delete_container(c).await
    }

    async fn read_throughput(&self, c: &ContainerRef) -> Result<Option<u64>> {
        self.inner.read_throughput(c).await
    }

    async fn default_consistency(&self) -> Result<String> {
        self.inner.default_consistency().await
    }

    async fn create_document(&self, c: &ContainerRef, pk: &str, payload: Vec<u8>) -> Result<StoreResponse> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on_create {
            return Err(StoreError::new(STATUS_TOO_MANY_REQUESTS, "request rate is large").into());
        }
        self.inner.create_document(c, pk, payload).await
    }

    async fn read_document(&self, c: &ContainerRef, id: &str, pk: &str) -> Result<StoreResponse> {
        self.inner.read_document(c, id, pk).await
    }

    async fn run_query(&self, c: &ContainerRef, query: &QueryRequest) -> Result<QueryPage> {
        self.inner.run_query(c, query).await
    }
}

async fn insert_context(store: Arc<dyn StoreClient>) -> OperationContext {
    let container = ContainerRef::new("db", "items");
    store.ensure_container(&container, "/partitionKey", 10_000).await.unwrap();
    OperationContext::new(store, container, "/partitionKey", r#"{"payload":"x"}"#).unwrap()
}

#[tokio::test]
async fn test_single_failure_at_call_fifty_does_not_abort() {
    let store = Arc::new(FaultyStore {
        inner: SimulatedStore::new(SimulatedStoreSettings::instant()),
        creates: AtomicU64::new(0),
        fail_on_create: 50,
    });
    let ctx = insert_context(store.clone()).await;
    let factory = resolve_factory(WorkloadKind::Insert, ctx);

    let summary = executor::run(factory, 1, 100, 0.0, quiet()).await.unwrap();

    assert_eq!(summary.attempted, 100);
    assert_eq!(summary.succeeded, 99);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.latency.unwrap().count, 99);
    assert!(summary.failures[0].contains("429"), "{:?}", summary.failures);
    assert_eq!(store.inner.document_count(&ContainerRef::new("db", "items")), 99);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_insert_partitioning_across_workers() {
    for (kind, distinct) in [(WorkloadKind::Insert, 100usize), (WorkloadKind::InsertSinglePk, 1)] {
        let store = Arc::new(SimulatedStore::new(SimulatedStoreSettings::instant()));
        let ctx = insert_context(store.clone()).await;
        let container = ctx.container.clone();

        let summary = executor::run(resolve_factory(kind, ctx), 4, 25, 0.0, quiet())
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 100);

        let docs = store.documents(&container);
        assert_eq!(docs.len(), 100);
        let pks: HashSet<String> = docs.iter().map(|d| d["partitionKey"].to_string()).collect();
        assert_eq!(pks.len(), distinct, "{}", kind);
        let ids: HashSet<String> = docs.iter().map(|d| d["id"].to_string()).collect();
        assert_eq!(ids.len(), 100);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failing_backend_counts_every_failure() {
    let store = Arc::new(SimulatedStore::new(SimulatedStoreSettings {
        failure_rate: 1.0,
        ..SimulatedStoreSettings::instant()
    }));
    let ctx = insert_context(store).await;

    let summary = executor::run(resolve_factory(WorkloadKind::Insert, ctx), 4, 10, 0.0, quiet())
        .await
        .unwrap();
    assert_eq!(summary.attempted, 40);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.total_cost, 0.0);
    assert_eq!(summary.latency.unwrap().count, 0);
}
