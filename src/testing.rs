//! In-memory `LakehouseApi` used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::errors::AppError;
use crate::lakehouse::*;

/// Scripted fake platform. Poll responses are consumed in order; once the
/// script runs out, `fallback_status` is returned forever.
pub struct FakeLakehouse {
    pub auth_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub expires_in: Option<u64>,
    pub auth_delay: Duration,
    pub auth_fails: bool,
    pub submit_result: Mutex<Option<Result<String, AppError>>>,
    pub polls: Mutex<VecDeque<Result<QueryStatusResponse, AppError>>>,
    pub fallback_status: String,
    pub submitted: Mutex<Vec<SubmitQueryRequest>>,
}

impl Default for FakeLakehouse {
    fn default() -> Self {
        Self {
            auth_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            expires_in: Some(3600),
            auth_delay: Duration::ZERO,
            auth_fails: false,
            submit_result: Mutex::new(None),
            polls: Mutex::new(VecDeque::new()),
            fallback_status: "running".into(),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

impl FakeLakehouse {
    pub fn with_polls(polls: Vec<Result<QueryStatusResponse, AppError>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Self::default()
        }
    }

    pub fn auth_count(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
            + self.submit_calls.load(Ordering::SeqCst)
            + self.poll_calls.load(Ordering::SeqCst)
            + self.cancel_calls.load(Ordering::SeqCst)
    }
}

pub fn status(value: serde_json::Value) -> Result<QueryStatusResponse, AppError> {
    Ok(serde_json::from_value(value).expect("valid status fixture"))
}

pub fn completed_select_one() -> Result<QueryStatusResponse, AppError> {
    status(json!({
        "status": "completed",
        "columns": [{"name": "x", "type": "int"}],
        "rows": [{"x": 1}],
        "row_count": 1,
    }))
}

#[async_trait]
impl LakehouseApi for FakeLakehouse {
    async fn authenticate(&self) -> Result<AuthResponse, AppError> {
        let n = self.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.auth_delay.is_zero() {
            tokio::time::sleep(self.auth_delay).await;
        }
        if self.auth_fails {
            return Err(AppError::transport(Some(401), "bad credentials"));
        }
        Ok(AuthResponse {
            token: Some(format!("token-{}", n)),
            expires_in: self.expires_in,
        })
    }

    async fn submit_query(
        &self,
        _token: &str,
        request: &SubmitQueryRequest,
    ) -> Result<SubmitQueryResponse, AppError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(request.clone());
        match self.submit_result.lock().unwrap().take() {
            Some(Ok(id)) => Ok(SubmitQueryResponse { query_id: Some(id) }),
            Some(Err(e)) => Err(e),
            None => Ok(SubmitQueryResponse {
                query_id: Some("q-1".into()),
            }),
        }
    }

    async fn query_status(
        &self,
        _token: &str,
        _query_id: &str,
    ) -> Result<QueryStatusResponse, AppError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        match self.polls.lock().unwrap().pop_front() {
            Some(next) => next,
            None => Ok(QueryStatusResponse {
                status: self.fallback_status.clone(),
                ..Default::default()
            }),
        }
    }

    async fn cancel_query(&self, _token: &str, _query_id: &str) -> Result<(), AppError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
