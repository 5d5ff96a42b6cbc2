//! Submit, poll and record SQL executions against the platform.
//!
//! A query moves through `Submitted -> Polling -> {Completed | Failed |
//! Cancelled | TimedOut}`. Every poll asks the credential manager for a
//! current token, so a renewal during a long poll is picked up transparently.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backoff::PollPolicy;
use super::history::{HistoryEntry, HistoryStatus, QueryHistory};
use super::validation::{sanitize_for_log, validate_identifier, validate_sql};
use crate::auth::CredentialManager;
use crate::errors::AppError;
use crate::lakehouse::{Column, LakehouseApi, PlatformPhase, QueryStatusResponse, Row, SubmitQueryRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    Submitted,
    Polling,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl QueryState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, QueryState::Submitted | QueryState::Polling)
    }

    pub fn can_transition_to(self, next: QueryState) -> bool {
        match (self, next) {
            (QueryState::Submitted, QueryState::Polling) => true,
            (QueryState::Submitted, QueryState::Failed) => true,
            (QueryState::Polling, next) => next.is_terminal(),
            _ => false,
        }
    }

    fn advance(self, next: QueryState, query_id: &str) -> QueryState {
        debug_assert!(self.can_transition_to(next), "{:?} -> {:?}", self, next);
        debug!(query_id, from = ?self, to = ?next, "query state change");
        next
    }
}

/// A poll loop that ended without a result, with the terminal state it reached.
#[derive(Debug)]
struct PollFailure {
    state: QueryState,
    error: AppError,
}

impl PollFailure {
    fn failed(error: AppError) -> Self {
        PollFailure { state: QueryState::Failed, error }
    }
}

/// Result of a completed execution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExecution {
    pub query_id: String,
    pub sql: String,
    pub catalog: String,
    pub schema: String,
    pub status: QueryState,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub row_count: u64,
    pub execution_time_ms: u64,
}

/// Single poll of a query's platform status, no retries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStatusView {
    pub query_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct QueryCoordinator {
    api: Arc<dyn LakehouseApi>,
    credentials: CredentialManager,
    policy: PollPolicy,
    engine: String,
    history: QueryHistory,
}

impl QueryCoordinator {
    pub fn new(api: Arc<dyn LakehouseApi>, credentials: CredentialManager, engine: impl Into<String>) -> Self {
        Self {
            api,
            credentials,
            policy: PollPolicy::default(),
            engine: engine.into(),
            history: QueryHistory::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Validate, submit and poll a statement until it reaches a terminal state.
    ///
    /// Validation failures return before any network call and leave history
    /// untouched. Every other outcome is recorded.
    pub async fn execute(&self, sql: &str, catalog: &str, schema: &str) -> Result<QueryExecution, AppError> {
        let sql = validate_sql(sql)?;
        let catalog = validate_identifier(catalog, "catalog")?;
        let schema = validate_identifier(schema, "schema")?;

        let started = Instant::now();
        let mut query_id = None;
        let outcome = self.run(sql, catalog, schema, started, &mut query_id).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let entry = match &outcome {
            Ok(exec) => {
                info!(
                    query_id = %exec.query_id,
                    row_count = exec.row_count,
                    execution_time_ms = elapsed_ms,
                    "query completed"
                );
                HistoryEntry {
                    id: exec.query_id.clone(),
                    sql: sql.to_string(),
                    catalog: catalog.to_string(),
                    schema: schema.to_string(),
                    timestamp: Utc::now(),
                    status: HistoryStatus::Completed,
                    row_count: Some(exec.row_count),
                    execution_time_ms: elapsed_ms,
                    error: None,
                    error_kind: None,
                }
            }
            Err(e) => {
                error!(
                    query_id = query_id.as_deref().unwrap_or("-"),
                    kind = e.kind(),
                    error = %e,
                    execution_time_ms = elapsed_ms,
                    "query execution failed"
                );
                HistoryEntry {
                    id: query_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    sql: sql.to_string(),
                    catalog: catalog.to_string(),
                    schema: schema.to_string(),
                    timestamp: Utc::now(),
                    status: HistoryStatus::Failed,
                    row_count: None,
                    execution_time_ms: elapsed_ms,
                    error: Some(e.to_string()),
                    error_kind: Some(e.kind().to_string()),
                }
            }
        };
        self.history.record(entry).await;

        outcome
    }

    async fn run(
        &self,
        sql: &str,
        catalog: &str,
        schema: &str,
        started: Instant,
        query_id: &mut Option<String>,
    ) -> Result<QueryExecution, AppError> {
        let token = self.credentials.acquire_token().await?;

        info!(catalog, schema, sql = %sanitize_for_log(sql), "submitting query");
        let request = SubmitQueryRequest {
            catalog: catalog.to_string(),
            schema: schema.to_string(),
            sql: sql.to_string(),
            engine: self.engine.clone(),
        };

        let submitted = self
            .api
            .submit_query(&token, &request)
            .await
            .map_err(|e| AppError::Submission(e.to_string()))?;
        let id = submitted
            .query_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Submission("platform response did not include a query_id".into()))?;
        *query_id = Some(id.clone());

        let state = QueryState::Submitted.advance(QueryState::Polling, &id);
        let result = match self.poll(&id).await {
            Ok(resp) => resp,
            Err(failure) => {
                state.advance(failure.state, &id);
                return Err(failure.error);
            }
        };
        let status = state.advance(QueryState::Completed, &id);

        let row_count = result.row_count.unwrap_or(result.rows.len() as u64);
        Ok(QueryExecution {
            query_id: id,
            sql: sql.to_string(),
            catalog: catalog.to_string(),
            schema: schema.to_string(),
            status,
            columns: result.columns,
            rows: result.rows,
            row_count,
            execution_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Poll with backoff until a terminal status or the attempt budget runs out.
    ///
    /// 4xx responses abort at once. Other transport errors are retried; on the
    /// final attempt the error itself is returned.
    async fn poll(&self, query_id: &str) -> Result<QueryStatusResponse, PollFailure> {
        let attempts = self.policy.max_attempts;
        let mut last_error: Option<AppError> = None;

        for attempt in 0..attempts {
            let is_last = attempt + 1 >= attempts;
            let token = self
                .credentials
                .acquire_token()
                .await
                .map_err(PollFailure::failed)?;

            match self.api.query_status(&token, query_id).await {
                Ok(resp) => match resp.phase() {
                    PlatformPhase::Completed => return Ok(resp),
                    phase @ (PlatformPhase::Failed | PlatformPhase::Cancelled) => {
                        let reason = resp.error.as_deref().unwrap_or("Unknown error");
                        let error = AppError::QueryExecution(format!(
                            "Query {}: {}",
                            resp.status.to_ascii_lowercase(),
                            reason
                        ));
                        let state = if phase == PlatformPhase::Cancelled {
                            QueryState::Cancelled
                        } else {
                            QueryState::Failed
                        };
                        return Err(PollFailure { state, error });
                    }
                    PlatformPhase::Pending => {
                        debug!(query_id, attempt = attempt + 1, status = %resp.status, "query still running");
                    }
                },
                Err(e) if e.is_client_error() => {
                    warn!(query_id, error = %e, "query polling rejected by platform");
                    return Err(PollFailure::failed(e));
                }
                Err(e) if is_last => return Err(PollFailure::failed(e)),
                Err(e) => {
                    warn!(query_id, attempt = attempt + 1, error = %e, "query polling error (will retry)");
                    last_error = Some(e);
                }
            }

            if !is_last {
                tokio::time::sleep(self.policy.delay_for(attempt)).await;
            }
        }

        Err(PollFailure {
            state: QueryState::TimedOut,
            error: AppError::QueryTimeout(format!(
                "Query timeout: exceeded maximum polling attempts ({}). Last error: {}",
                attempts,
                last_error.map_or_else(|| "none".to_string(), |e| e.to_string())
            )),
        })
    }

    /// Ask the platform to cancel. A local poll loop for the same id keeps
    /// running until it observes the cancelled status.
    pub async fn cancel(&self, query_id: &str) -> Result<(), AppError> {
        let query_id = non_empty_id(query_id)?;
        let token = self.credentials.acquire_token().await?;
        self.api.cancel_query(&token, query_id).await.map_err(|e| {
            error!(query_id, error = %e, "failed to cancel query");
            e
        })?;
        info!(query_id, "query cancelled");
        Ok(())
    }

    pub async fn status(&self, query_id: &str) -> Result<QueryStatusView, AppError> {
        let query_id = non_empty_id(query_id)?;
        let token = self.credentials.acquire_token().await?;
        let resp = self.api.query_status(&token, query_id).await?;
        Ok(QueryStatusView {
            query_id: query_id.to_string(),
            status: resp.status,
            progress: resp.progress,
            row_count: resp.row_count,
            error: resp.error,
        })
    }

    pub async fn clear_history(&self) {
        self.history.clear().await;
        info!("query history cleared");
    }
}

fn non_empty_id(query_id: &str) -> Result<&str, AppError> {
    let trimmed = query_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("query_id is required".into()));
    }
    Ok(trimmed)
}
