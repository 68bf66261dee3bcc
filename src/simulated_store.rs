// src/simulated_store.rs
//
// In-process document store used by the CLI's simulated backend and by tests.
//
// Documents live in memory keyed by (partition key, id). Latency is drawn from an
// exponential distribution around the configured mean and a configurable share of
// requests fail with 503, so the engine's failure accounting can be exercised
// without a real service. Queries understand the three predicate shapes the
// workloads issue: `<alias>.<field> = @p`, `<alias>.<field> > @p` and
// `<alias>.<field> in ('a','b',...)`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

use crate::constants::{
    DEFAULT_SIM_LATENCY_MICROS, SIM_QUERY_BASE_COST, SIM_QUERY_ROW_COST, SIM_READ_COST,
    SIM_WRITE_COST,
};
use crate::store::{
    ContainerRef, Diagnostics, QueryPage, QueryRequest, StoreClient, StoreError, StoreResponse,
    STATUS_CONFLICT, STATUS_CREATED, STATUS_NOT_FOUND, STATUS_OK, STATUS_SERVICE_UNAVAILABLE,
};

const STATUS_BAD_REQUEST: u16 = 400;

/// Behaviour knobs for the simulated backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatedStoreSettings {
    /// Mean round-trip latency; zero disables sleeping entirely
    #[serde(default = "default_latency", with = "humantime_serde")]
    pub latency: Duration,

    /// Share of data-plane requests answered with 503, in [0, 1]
    #[serde(default)]
    pub failure_rate: f64,

    /// Account default consistency reported to the driver
    #[serde(default = "default_consistency")]
    pub consistency: String,
}

fn default_latency() -> Duration {
    Duration::from_micros(DEFAULT_SIM_LATENCY_MICROS)
}

fn default_consistency() -> String {
    "Session".to_string()
}

impl Default for SimulatedStoreSettings {
    fn default() -> Self {
        Self {
            latency: default_latency(),
            failure_rate: 0.0,
            consistency: default_consistency(),
        }
    }
}

impl SimulatedStoreSettings {
    /// Zero latency, no failures: handy for deterministic tests
    pub fn instant() -> Self {
        Self {
            latency: Duration::ZERO,
            ..Default::default()
        }
    }
}

struct ContainerState {
    partition_key_field: String,
    throughput: Option<u64>,
    docs: BTreeMap<(String, String), Value>,
}

pub struct SimulatedStore {
    settings: SimulatedStoreSettings,
    latency_dist: Option<Exp<f64>>,
    containers: RwLock<HashMap<ContainerRef, ContainerState>>,
}

impl SimulatedStore {
    pub fn new(settings: SimulatedStoreSettings) -> Self {
        let mean_micros = settings.latency.as_micros() as f64;
        let latency_dist = if mean_micros > 0.0 {
            Exp::new(1.0 / mean_micros).ok()
        } else {
            None
        };
        Self {
            settings,
            latency_dist,
            containers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a container without provisioned throughput (shared-throughput setup)
    pub fn add_container_without_throughput(&self, container: &ContainerRef, partition_key_path: &str) {
        self.containers.write().insert(
            container.clone(),
            ContainerState {
                partition_key_field: partition_key_path.trim_start_matches('/').to_string(),
                throughput: None,
                docs: BTreeMap::new(),
            },
        );
    }

    /// Number of documents currently stored in `container`
    pub fn document_count(&self, container: &ContainerRef) -> usize {
        self.containers
            .read()
            .get(container)
            .map(|c| c.docs.len())
            .unwrap_or(0)
    }

    /// All stored documents of `container`, ordered by (partition key, id)
    pub fn documents(&self, container: &ContainerRef) -> Vec<Value> {
        self.containers
            .read()
            .get(container)
            .map(|c| c.docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Sleep for one simulated round trip and return the server-side duration
    async fn round_trip(&self) -> Duration {
        let delay = match &self.latency_dist {
            Some(dist) => {
                let micros = dist.sample(&mut rand::rng());
                Duration::from_micros(micros as u64)
            }
            None => Duration::ZERO,
        };
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
        delay
    }

    fn should_fail(&self) -> bool {
        self.settings.failure_rate > 0.0 && rand::rng().random::<f64>() < self.settings.failure_rate
    }

    fn unavailable(&self, operation: &str) -> anyhow::Error {
        StoreError::new(STATUS_SERVICE_UNAVAILABLE, "simulated service unavailable")
            .with_diagnostics(Diagnostics::new(operation, STATUS_SERVICE_UNAVAILABLE, 0.0))
            .into()
    }
}

fn missing_container(container: &ContainerRef) -> anyhow::Error {
    StoreError::new(STATUS_NOT_FOUND, format!("container {} does not exist", container)).into()
}

#[async_trait]
impl StoreClient for SimulatedStore {
    async fn ensure_container(
        &self,
        container: &ContainerRef,
        partition_key_path: &str,
        throughput: u64,
    ) -> Result<bool> {
        let mut containers = self.containers.write();
        if containers.contains_key(container) {
            return Ok(false);
        }
        containers.insert(
            container.clone(),
            ContainerState {
                partition_key_field: partition_key_path.trim_start_matches('/').to_string(),
                throughput: Some(throughput),
                docs: BTreeMap::new(),
            },
        );
        debug!("Simulated store created container {} ({} units/s)", container, throughput);
        Ok(true)
    }

    async fn delete_container(&self, container: &ContainerRef) -> Result<()> {
        self.containers.write().remove(container);
        Ok(())
    }

    async fn read_throughput(&self, container: &ContainerRef) -> Result<Option<u64>> {
        self.containers
            .read()
            .get(container)
            .map(|c| c.throughput)
            .ok_or_else(|| missing_container(container))
    }

    async fn default_consistency(&self) -> Result<String> {
        Ok(self.settings.consistency.clone())
    }

    async fn create_document(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        payload: Vec<u8>,
    ) -> Result<StoreResponse> {
        let fail = self.should_fail();
        let server_duration = self.round_trip().await;
        if fail {
            return Err(self.unavailable("CreateItem"));
        }

        let doc: Value = serde_json::from_slice(&payload).context("payload is not valid JSON")?;
        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::new(STATUS_BAD_REQUEST, "document has no string id"))?
            .to_string();

        let mut containers = self.containers.write();
        let state = containers
            .get_mut(container)
            .ok_or_else(|| missing_container(container))?;

        match doc.get(&state.partition_key_field) {
            Some(Value::String(pk)) if pk == partition_key => {}
            _ => {
                return Err(StoreError::new(
                    STATUS_BAD_REQUEST,
                    format!(
                        "partition key '{}' does not match document field '{}'",
                        partition_key, state.partition_key_field
                    ),
                )
                .into())
            }
        }

        let key = (partition_key.to_string(), id.clone());
        if state.docs.contains_key(&key) {
            return Err(StoreError::new(STATUS_CONFLICT, format!("document {} already exists", id)).into());
        }
        state.docs.insert(key, doc);

        let cost = SIM_WRITE_COST + (payload.len() / 1024) as f64;
        let mut diagnostics = Diagnostics::new("CreateItem", STATUS_CREATED, cost);
        diagnostics.server_duration = server_duration;
        diagnostics.partition_key = Some(partition_key.to_string());
        Ok(StoreResponse {
            status: STATUS_CREATED,
            cost,
            diagnostics,
        })
    }

    async fn read_document(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> Result<StoreResponse> {
        let fail = self.should_fail();
        let server_duration = self.round_trip().await;
        if fail {
            return Err(self.unavailable("ReadItem"));
        }

        let containers = self.containers.read();
        let state = containers
            .get(container)
            .ok_or_else(|| missing_container(container))?;
        if !state.docs.contains_key(&(partition_key.to_string(), id.to_string())) {
            return Err(StoreError::new(STATUS_NOT_FOUND, format!("document {} not found", id)).into());
        }

        let mut diagnostics = Diagnostics::new("ReadItem", STATUS_OK, SIM_READ_COST);
        diagnostics.server_duration = server_duration;
        diagnostics.partition_key = Some(partition_key.to_string());
        Ok(StoreResponse {
            status: STATUS_OK,
            cost: SIM_READ_COST,
            diagnostics,
        })
    }

    async fn run_query(&self, container: &ContainerRef, query: &QueryRequest) -> Result<QueryPage> {
        let fail = self.should_fail();
        let server_duration = self.round_trip().await;
        if fail {
            return Err(self.unavailable("Query"));
        }

        let predicate = Predicate::parse(query)?;
        let offset: usize = match &query.continuation {
            Some(token) => token
                .parse()
                .map_err(|_| StoreError::new(STATUS_BAD_REQUEST, "malformed continuation token"))?,
            None => 0,
        };

        let containers = self.containers.read();
        let state = containers
            .get(container)
            .ok_or_else(|| missing_container(container))?;

        let mut matched = state
            .docs
            .iter()
            .filter(|((pk, _), _)| query.partition_key.as_deref().map_or(true, |want| want == pk))
            .filter(|(_, doc)| predicate.matches(doc))
            .skip(offset);

        let mut rows = Vec::with_capacity(query.page_size);
        for (_, doc) in matched.by_ref().take(query.page_size) {
            rows.push(serde_json::to_vec(doc)?);
        }
        let has_more = matched.next().is_some();
        let continuation = has_more.then(|| (offset + rows.len()).to_string());

        let cost = SIM_QUERY_BASE_COST + SIM_QUERY_ROW_COST * rows.len() as f64;
        let mut diagnostics = Diagnostics::new("Query", STATUS_OK, cost);
        diagnostics.server_duration = server_duration;
        diagnostics.partition_key = query.partition_key.clone();
        diagnostics.row_count = Some(rows.len());
        diagnostics.has_more_results = has_more;

        Ok(QueryPage {
            rows,
            continuation,
            cost,
            diagnostics,
        })
    }
}

// -----------------------------------------------------------------------------
// Minimal predicate evaluation
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    All,
    Eq { field: String, value: Value },
    Gt { field: String, value: Value },
    In { field: String, values: Vec<Value> },
}

impl Predicate {
    fn parse(query: &QueryRequest) -> Result<Self> {
        let text = query.text.trim();
        let lower = text.to_ascii_lowercase();
        let Some(pos) = lower.find(" where ") else {
            return Ok(Predicate::All);
        };
        let clause = text[pos + " where ".len()..].trim();
        let clause_lower = clause.to_ascii_lowercase();

        if let Some(in_pos) = clause_lower.find(" in ") {
            let field = field_name(&clause[..in_pos])?;
            let list = clause[in_pos + " in ".len()..]
                .trim()
                .trim_start_matches('(')
                .trim_end_matches(')');
            let values = list
                .split(',')
                .map(|v| v.trim().trim_matches('\'').trim_matches('"'))
                .filter(|v| !v.is_empty())
                .map(|v| Value::String(v.to_string()))
                .collect();
            return Ok(Predicate::In { field, values });
        }

        let (op_pos, is_gt) = match (clause.find('>'), clause.find('=')) {
            (Some(p), _) => (p, true),
            (None, Some(p)) => (p, false),
            (None, None) => {
                return Err(StoreError::new(STATUS_BAD_REQUEST, format!("unsupported predicate: {}", clause)).into())
            }
        };
        let field = field_name(&clause[..op_pos])?;
        let value = resolve_operand(clause[op_pos + 1..].trim(), query)?;
        Ok(if is_gt {
            Predicate::Gt { field, value }
        } else {
            Predicate::Eq { field, value }
        })
    }

    fn matches(&self, doc: &Value) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Eq { field, value } => doc.get(field) == Some(value),
            Predicate::Gt { field, value } => doc
                .get(field)
                .and_then(|v| compare_values(v, value))
                .map_or(false, |o| o == Ordering::Greater),
            Predicate::In { field, values } => doc.get(field).map_or(false, |v| values.contains(v)),
        }
    }
}

/// `T.fieldValue` -> `fieldValue`
fn field_name(lhs: &str) -> Result<String> {
    let lhs = lhs.trim();
    let field = lhs.rsplit('.').next().unwrap_or(lhs).trim();
    if field.is_empty() {
        return Err(StoreError::new(STATUS_BAD_REQUEST, "empty field reference").into());
    }
    Ok(field.to_string())
}

fn resolve_operand(rhs: &str, query: &QueryRequest) -> Result<Value> {
    if rhs.starts_with('@') {
        query.parameter(rhs).cloned().ok_or_else(|| {
            StoreError::new(STATUS_BAD_REQUEST, format!("query parameter {} was not supplied", rhs)).into()
        })
    } else {
        Ok(Value::String(rhs.trim_matches('\'').to_string()))
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
