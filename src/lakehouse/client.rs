/// HTTP client for the lakehouse platform REST API.
/// Every authenticated call carries the bearer token plus the instance header.
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::types::*;
use super::LakehouseApi;
use crate::config::LakehouseConfig;
use crate::errors::AppError;

pub const AUTH_PATH: &str = "/lakehouse/api/v3/auth/authenticate";
pub const QUERIES_PATH: &str = "/lakehouse/api/v2/queries";
pub const CATALOGS_PATH: &str = "/lakehouse/api/v2/catalogs";
pub const INGESTIONS_PATH: &str = "/lakehouse/api/v3/lhingestion/api/v1/ingestions";
pub const HEALTH_PATH: &str = "/lakehouse/api/v3/health";

const INSTANCE_HEADER: &str = "AuthInstanceId";
/// Status / cancel / browse calls are short; submissions use the configured timeout.
const SHORT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on how much of an error body is echoed back to callers.
const MAX_ERROR_BODY: usize = 512;

pub struct LakehouseClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    instance_id: String,
    instance_name: String,
}

impl LakehouseClient {
    pub fn new(cfg: &LakehouseConfig) -> anyhow::Result<Self> {
        url::Url::parse(&cfg.base_url)
            .with_context(|| format!("invalid lakehouse base URL: {}", cfg.base_url))?;

        let http = Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(!cfg.verify_tls)
            .timeout(cfg.request_timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("failed to build lakehouse HTTP client")?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            instance_id: cfg.instance_id.clone(),
            instance_name: cfg.instance_name.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(token)
            .header(INSTANCE_HEADER, &self.instance_id)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Send a request and decode the JSON body. Empty bodies decode as `null`.
    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, AppError> {
        let resp = req.send().await.map_err(|e| {
            tracing::warn!("lakehouse request failed: {}", e);
            AppError::transport(None, e.to_string())
        })?;

        let status = resp.status();
        let url = resp.url().path().to_string();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AppError::transport(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
            tracing::warn!(status = status.as_u16(), path = %url, "lakehouse returned error status");
            return Err(AppError::transport(
                Some(status.as_u16()),
                format!("platform returned {} for {}: {}", status, url, snippet.trim()),
            ));
        }

        let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(body).map_err(|e| {
            AppError::transport(
                Some(status.as_u16()),
                format!("invalid response body from {}: {}", url, e),
            )
        })
    }

    pub async fn get_json(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, AppError> {
        self.send(
            self.authed(Method::GET, path, token)
                .query(query)
                .timeout(SHORT_TIMEOUT),
        )
        .await
    }

    pub async fn post_json(&self, token: &str, path: &str, body: &Value) -> Result<Value, AppError> {
        self.send(self.authed(Method::POST, path, token).json(body)).await
    }

    pub async fn patch_json(&self, token: &str, path: &str, body: &Value) -> Result<Value, AppError> {
        self.send(self.authed(Method::PATCH, path, token).json(body)).await
    }

    pub async fn delete(&self, token: &str, path: &str) -> Result<Value, AppError> {
        self.send(self.authed(Method::DELETE, path, token)).await
    }

    pub async fn health(&self, token: &str) -> Result<Value, AppError> {
        self.get_json(token, HEALTH_PATH, &[]).await
    }
}

fn query_path(query_id: &str) -> String {
    format!("{}/{}", QUERIES_PATH, urlencoding::encode(query_id))
}

#[async_trait]
impl LakehouseApi for LakehouseClient {
    async fn authenticate(&self) -> Result<AuthResponse, AppError> {
        let body = AuthRequest {
            username: &self.username,
            password: &self.password,
            instance_id: &self.instance_id,
            instance_name: &self.instance_name,
        };
        tracing::info!(url = %self.url(AUTH_PATH), "requesting bearer token");
        self.send(self.http.post(self.url(AUTH_PATH)).json(&body))
            .await
    }

    async fn submit_query(
        &self,
        token: &str,
        request: &SubmitQueryRequest,
    ) -> Result<SubmitQueryResponse, AppError> {
        self.send(self.authed(Method::POST, QUERIES_PATH, token).json(request))
            .await
    }

    async fn query_status(
        &self,
        token: &str,
        query_id: &str,
    ) -> Result<QueryStatusResponse, AppError> {
        self.send(
            self.authed(Method::GET, &query_path(query_id), token)
                .timeout(SHORT_TIMEOUT),
        )
        .await
    }

    async fn cancel_query(&self, token: &str, query_id: &str) -> Result<(), AppError> {
        let _: Value = self
            .send(
                self.authed(Method::DELETE, &query_path(query_id), token)
                    .timeout(SHORT_TIMEOUT),
            )
            .await?;
        Ok(())
    }
}
