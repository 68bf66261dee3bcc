// src/store.rs
//
// Store client capability consumed by the benchmark operations.
//
// The engine never talks to a backend directly: every operation goes through
// `StoreClient`, so connection pooling, retries and consistency stay with the
// client implementation. `SimulatedStore` (see simulated_store.rs) is the
// in-process implementation used by the CLI and the test suite.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;
pub const STATUS_SERVICE_UNAVAILABLE: u16 = 503;

/// Database + container pair an operation targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    pub database: String,
    pub container: String,
}

impl ContainerRef {
    pub fn new(database: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database, self.container)
    }
}

/// Raw diagnostics payload reported by the backend for one request
///
/// Kept unformatted on the hot path; `OperationResult::diagnostics_string`
/// renders it only when somebody asks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub operation: String,
    pub status: u16,
    pub request_charge: f64,
    pub server_duration: Duration,
    pub activity_id: Uuid,
    pub partition_key: Option<String>,
    pub row_count: Option<usize>,
    pub has_more_results: bool,
}

impl Diagnostics {
    pub fn new(operation: &str, status: u16, request_charge: f64) -> Self {
        Self {
            operation: operation.to_string(),
            status,
            request_charge,
            server_duration: Duration::ZERO,
            activity_id: Uuid::new_v4(),
            partition_key: None,
            row_count: None,
            has_more_results: false,
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\"operation\":\"{}\",\"status\":{},\"requestCharge\":{:.2},\"serverDurationUs\":{},\"activityId\":\"{}\"",
            self.operation,
            self.status,
            self.request_charge,
            self.server_duration.as_micros(),
            self.activity_id
        )?;
        if let Some(pk) = &self.partition_key {
            write!(f, ",\"partitionKey\":\"{}\"", pk)?;
        }
        if let Some(rows) = self.row_count {
            write!(f, ",\"rowCount\":{}", rows)?;
        }
        write!(f, ",\"hasMoreResults\":{}}}", self.has_more_results)
    }
}

/// Successful point operation (create / read)
#[derive(Debug, Clone)]
pub struct StoreResponse {
    pub status: u16,
    pub cost: f64,
    pub diagnostics: Diagnostics,
}

/// One page of query results
#[derive(Debug, Clone)]
pub struct QueryPage {
    /// Raw JSON rows as returned on the wire
    pub rows: Vec<Vec<u8>>,
    pub continuation: Option<String>,
    pub cost: f64,
    pub diagnostics: Diagnostics,
}

/// Parameterised query plus its request options
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub text: String,
    pub parameters: Vec<(String, Value)>,
    /// `None` means the query fans out across partitions
    pub partition_key: Option<String>,
    pub page_size: usize,
    pub continuation: Option<String>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page_size: 1,
            ..Default::default()
        }
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.push((name.to_string(), value.into()));
        self
    }

    pub fn with_partition_key(mut self, partition_key: Option<String>) -> Self {
        self.partition_key = partition_key;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Non-success status reported by the backend
///
/// Travels inside `anyhow::Error`; use `downcast_ref::<StoreError>()` to
/// inspect the status code.
#[derive(Debug, Clone)]
pub struct StoreError {
    pub status: u16,
    pub message: String,
    pub diagnostics: Option<Diagnostics>,
}

impl StoreError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store returned status {}: {}", self.status, self.message)
    }
}

impl std::error::Error for StoreError {}

/// Capability set the benchmark needs from a document store
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Create the container if missing. Returns true when it was created.
    async fn ensure_container(
        &self,
        container: &ContainerRef,
        partition_key_path: &str,
        throughput: u64,
    ) -> Result<bool>;

    async fn delete_container(&self, container: &ContainerRef) -> Result<()>;

    /// Provisioned cost units per second, `None` when the container has none
    async fn read_throughput(&self, container: &ContainerRef) -> Result<Option<u64>>;

    /// Account-level default consistency label
    async fn default_consistency(&self) -> Result<String>;

    async fn create_document(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        payload: Vec<u8>,
    ) -> Result<StoreResponse>;

    async fn read_document(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> Result<StoreResponse>;

    /// Execute one round trip of a query; follow `continuation` for more pages
    async fn run_query(&self, container: &ContainerRef, query: &QueryRequest) -> Result<QueryPage>;
}

/// Status code of a failed store call, if the failure came from the backend
pub fn error_status(err: &anyhow::Error) -> Option<u16> {
    err.downcast_ref::<StoreError>().map(|e| e.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_display_is_json_like() {
        let mut d = Diagnostics::new("ReadItem", STATUS_OK, 1.0);
        d.partition_key = Some("fixed".into());
        let s = d.to_string();
        let parsed: Value = serde_json::from_str(&s).expect("diagnostics render as JSON");
        assert_eq!(parsed["operation"], "ReadItem");
        assert_eq!(parsed["partitionKey"], "fixed");
        assert_eq!(parsed["hasMoreResults"], false);
    }

    #[test]
    fn test_store_error_downcast() {
        let err: anyhow::Error = StoreError::new(STATUS_CONFLICT, "duplicate id").into();
        assert_eq!(error_status(&err), Some(STATUS_CONFLICT));
        assert!(err.to_string().contains("409"));

        let other = anyhow::anyhow!("not a store error");
        assert_eq!(error_status(&other), None);
    }

    #[test]
    fn test_query_request_builder() {
        let q = QueryRequest::new("select * from c")
            .with_parameter("@val", "x")
            .with_partition_key(Some("pk".into()))
            .with_page_size(0);
        assert_eq!(q.page_size, 1);
        assert_eq!(q.parameter("@val"), Some(&Value::from("x")));
        assert_eq!(q.parameter("@missing"), None);
        assert_eq!(q.partition_key.as_deref(), Some("pk"));
    }
}
