//! Wire types exchanged with the lakehouse platform.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A result row: column name → value.
pub type Row = Map<String, Value>;

#[derive(Debug, Serialize)]
pub struct AuthRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub instance_id: &'a str,
    pub instance_name: &'a str,
}

/// `token` is optional here so a payload without it can be reported as
/// malformed instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    pub token: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmitQueryRequest {
    pub catalog: String,
    pub schema: String,
    pub sql: String,
    pub engine: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitQueryResponse {
    pub query_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryStatusResponse {
    pub status: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
    pub row_count: Option<u64>,
    pub error: Option<String>,
    pub progress: Option<Value>,
}

/// How a single poll response moves the query state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformPhase {
    Completed,
    Failed,
    Cancelled,
    /// Any other status (`running`, `queued`, ...).
    Pending,
}

impl QueryStatusResponse {
    pub fn phase(&self) -> PlatformPhase {
        match self.status.to_ascii_lowercase().as_str() {
            "completed" => PlatformPhase::Completed,
            "failed" => PlatformPhase::Failed,
            "cancelled" | "canceled" => PlatformPhase::Cancelled,
            _ => PlatformPhase::Pending,
        }
    }
}
