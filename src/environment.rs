//! Environment metadata attached to every run summary
//!
//! Only local facts are collected; cloud instance metadata endpoints are not queried.

use serde::{Deserialize, Serialize};

/// Where and with what a benchmark ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub hostname: String,
    pub os: String,
    pub arch: String,
    pub logical_cpus: usize,
    pub tool_version: String,
    pub process_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl EnvironmentInfo {
    pub fn collect(location: Option<String>) -> Self {
        let hostname = hostname::get()
            .unwrap_or_else(|_| "unknown".into())
            .to_string_lossy()
            .to_string();

        Self {
            hostname,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            logical_cpus: num_cpus::get(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            process_id: std::process::id(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_fills_local_facts() {
        let env = EnvironmentInfo::collect(Some("westus2".into()));
        assert!(!env.hostname.is_empty());
        assert!(env.logical_cpus >= 1);
        assert_eq!(env.os, std::env::consts::OS);
        assert_eq!(env.tool_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(env.location.as_deref(), Some("westus2"));
    }

    #[test]
    fn test_location_omitted_when_absent() {
        let env = EnvironmentInfo::collect(None);
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("location").is_none());
        assert!(json.get("logicalCpus").is_some());
    }
}
