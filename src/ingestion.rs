//! Ingestion jobs: validation, default engine settings and job lifecycle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::auth::CredentialManager;
use crate::config::{BucketDefaults, EngineDefaults};
use crate::errors::AppError;
use crate::lakehouse::client::INGESTIONS_PATH;
use crate::lakehouse::LakehouseClient;

pub const SUPPORTED_FILE_TYPES: [&str; 5] = ["json", "csv", "parquet", "avro", "orc"];
pub const DEFAULT_JOB_LIMIT: u32 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestionJobRequest {
    pub target: Option<Value>,
    pub source: Option<Value>,
    pub job_id: Option<String>,
    pub engine_id: Option<String>,
    #[serde(default)]
    pub execute_config: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobFilters {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for JobFilters {
    fn default() -> Self {
        Self {
            status: None,
            limit: DEFAULT_JOB_LIMIT,
            offset: 0,
        }
    }
}

fn default_limit() -> u32 {
    DEFAULT_JOB_LIMIT
}

impl JobFilters {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("limit", self.limit.to_string()), ("offset", self.offset.to_string())];
        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
            query.push(("status", status.to_string()));
        }
        query
    }
}

/// Missing, null, false, zero and empty strings all count as absent.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

pub fn validate_job(req: &IngestionJobRequest) -> ValidationReport {
    let mut errors = Vec::new();

    match req.target.as_ref().filter(|t| !is_blank(Some(*t))) {
        None => errors.push("Target configuration is required".to_string()),
        Some(target) => {
            for (field, label) in [("catalog", "catalog"), ("schema", "schema"), ("table", "table")] {
                if is_blank(target.get(field)) {
                    errors.push(format!("Target {} is required", label));
                }
            }
        }
    }

    match req.source.as_ref().filter(|s| !is_blank(Some(*s))) {
        None => errors.push("Source configuration is required".to_string()),
        Some(source) => {
            if is_blank(source.get("file_paths")) {
                errors.push("Source file paths are required".to_string());
            }
            let file_type = source.get("file_type");
            if is_blank(file_type) {
                errors.push("Source file type is required".to_string());
            } else {
                let supported = file_type
                    .and_then(Value::as_str)
                    .map(|t| SUPPORTED_FILE_TYPES.contains(&t.to_ascii_lowercase().as_str()))
                    .unwrap_or(false);
                if !supported {
                    errors.push(format!(
                        "Invalid file type. Must be one of: {}",
                        SUPPORTED_FILE_TYPES.join(", ")
                    ));
                }
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

pub struct IngestionService {
    client: Arc<LakehouseClient>,
    credentials: CredentialManager,
    engine: EngineDefaults,
    bucket: BucketDefaults,
}

impl IngestionService {
    pub fn new(
        client: Arc<LakehouseClient>,
        credentials: CredentialManager,
        engine: EngineDefaults,
        bucket: BucketDefaults,
    ) -> Self {
        Self {
            client,
            credentials,
            engine,
            bucket,
        }
    }

    fn default_execute_config(&self) -> Map<String, Value> {
        let mut cfg = Map::new();
        cfg.insert("driver_memory".into(), json!(self.engine.driver_memory));
        cfg.insert("driver_cores".into(), json!(self.engine.driver_cores));
        cfg.insert("executor_memory".into(), json!(self.engine.executor_memory));
        cfg.insert("executor_cores".into(), json!(self.engine.executor_cores));
        cfg.insert("num_executors".into(), json!(self.engine.num_executors));
        cfg
    }

    pub fn default_config(&self) -> Value {
        json!({
            "engine_id": self.engine.engine_id,
            "execute_config": self.default_execute_config(),
            "bucket_details": {
                "bucket_name": self.bucket.bucket_name,
                "bucket_type": self.bucket.bucket_type,
            },
        })
    }

    /// Request body sent to the platform: defaults filled in, caller's
    /// `execute_config` keys take precedence.
    pub fn build_payload(&self, req: IngestionJobRequest) -> Value {
        let mut execute_config = self.default_execute_config();
        execute_config.extend(req.execute_config);

        let job_id = req
            .job_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("ingestion-{}", chrono::Utc::now().timestamp_millis()));

        json!({
            "target": req.target,
            "source": req.source,
            "job_id": job_id,
            "engine_id": req.engine_id.filter(|id| !id.is_empty()).unwrap_or_else(|| self.engine.engine_id.clone()),
            "execute_config": execute_config,
        })
    }

    pub async fn create_job(&self, req: IngestionJobRequest) -> Result<Value, AppError> {
        let report = validate_job(&req);
        if !report.valid {
            return Err(AppError::Validation(report.errors.join("; ")));
        }

        let token = self.credentials.acquire_token().await?;
        let payload = self.build_payload(req);
        info!(job_id = %payload["job_id"], "creating ingestion job");

        let created = self
            .client
            .post_json(&token, INGESTIONS_PATH, &payload)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to create ingestion job");
                AppError::Submission(e.to_string())
            })?;

        let job_id = created.get("job_id").unwrap_or(&serde_json::Value::Null);
        let status = created.get("status").unwrap_or(&serde_json::Value::Null);
        info!(job_id = %job_id, status = %status, "ingestion job created");
        Ok(created)
    }

    pub async fn list_jobs(&self, filters: &JobFilters) -> Result<Value, AppError> {
        let token = self.credentials.acquire_token().await?;
        self.client.get_json(&token, INGESTIONS_PATH, &filters.to_query()).await
    }

    pub async fn job_status(&self, job_id: &str) -> Result<Value, AppError> {
        let path = job_path(job_id)?;
        let token = self.credentials.acquire_token().await?;
        self.client.get_json(&token, &path, &[]).await
    }

    pub async fn cancel_job(&self, job_id: &str) -> Result<Value, AppError> {
        let path = job_path(job_id)?;
        let token = self.credentials.acquire_token().await?;
        info!(job_id, "cancelling ingestion job");
        self.client.delete(&token, &path).await
    }
}

fn job_path(job_id: &str) -> Result<String, AppError> {
    if job_id.trim().is_empty() {
        return Err(AppError::Validation("job_id is required".into()));
    }
    Ok(format!("{}/{}", INGESTIONS_PATH, urlencoding::encode(job_id)))
}
