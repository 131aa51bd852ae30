//! Subset of the Elasticsearch response shapes the CLI reads itself.

use serde::Deserialize;

/// One row of `GET /_cat/indices` when the server answers with JSON.
/// Other columns (health, status, docs.count, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexRecord {
    pub index: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
    #[serde(other)]
    Unknown,
}

/// Response of `GET /_cluster/health`, reduced to what the prompt needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterHealth {
    pub status: HealthStatus,
}
