//! Lakehouse platform boundary.
//!
//! `LakehouseApi` is the narrow transport seam used by the credential manager
//! and the query coordinator; tests substitute an in-memory implementation.
//! Catalog, ingestion and health calls go through `LakehouseClient` directly.

use async_trait::async_trait;

use crate::errors::AppError;

pub mod client;
pub mod types;

pub use client::LakehouseClient;
pub use types::*;

#[async_trait]
pub trait LakehouseApi: Send + Sync {
    /// Exchange the configured credentials for a bearer token.
    async fn authenticate(&self) -> Result<AuthResponse, AppError>;

    async fn submit_query(
        &self,
        token: &str,
        request: &SubmitQueryRequest,
    ) -> Result<SubmitQueryResponse, AppError>;

    async fn query_status(&self, token: &str, query_id: &str)
        -> Result<QueryStatusResponse, AppError>;

    async fn cancel_query(&self, token: &str, query_id: &str) -> Result<(), AppError>;
}
