//! Request metrics, host resources and platform reachability.

pub mod metrics;
pub mod system;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::auth::CredentialManager;
use crate::errors::AppError;
use crate::lakehouse::LakehouseClient;
use metrics::{RequestMetrics, RequestSnapshot};
use system::{SystemSampler, SystemSnapshot};

/// Memory usage at or above this percentage marks the host as degraded.
const MEMORY_WARN_PERCENT: f64 = 90.0;
/// Request success rate below this percentage marks the API as degraded.
const API_HEALTHY_SUCCESS_RATE: f64 = 95.0;

#[derive(Debug, Clone, Serialize)]
pub struct PlatformHealth {
    pub status: &'static str,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    #[serde(flatten)]
    pub requests: RequestSnapshot,
    pub system: SystemSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub api: &'static str,
    pub memory: &'static str,
    pub platform: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSummary {
    pub overall: &'static str,
    pub components: ComponentHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub report: MetricsReport,
    pub platform: PlatformHealth,
    pub health: HealthSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeRequests {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Realtime {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub cpu: f32,
    pub memory: f64,
    pub requests: RealtimeRequests,
    pub avg_response_time: f64,
}

pub struct MonitoringService {
    pub metrics: RequestMetrics,
    system: SystemSampler,
    client: Arc<LakehouseClient>,
    credentials: CredentialManager,
}

impl MonitoringService {
    pub fn new(client: Arc<LakehouseClient>, credentials: CredentialManager) -> anyhow::Result<Self> {
        Ok(Self {
            metrics: RequestMetrics::new()?,
            system: SystemSampler::new(),
            client,
            credentials,
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.system.uptime_secs()
    }

    pub fn system(&self) -> SystemSnapshot {
        self.system.snapshot()
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            timestamp: Utc::now(),
            uptime: self.system.uptime_secs(),
            requests: self.metrics.snapshot(),
            system: self.system.snapshot(),
        }
    }

    pub fn realtime(&self) -> Realtime {
        let snap = self.metrics.snapshot();
        let sys = self.system.snapshot();
        Realtime {
            timestamp: Utc::now().timestamp_millis(),
            cpu: sys.cpu.usage,
            memory: sys.memory.usage_percent,
            requests: RealtimeRequests {
                total: snap.requests.total,
                success: snap.requests.success,
                failed: snap.requests.failed,
            },
            avg_response_time: snap.performance.avg_response_time,
        }
    }

    /// Probe the platform health endpoint. Failures are reported, never returned.
    pub async fn platform_health(&self) -> PlatformHealth {
        let probe = async {
            let token = self.credentials.acquire_token().await?;
            let details = self.client.health(&token).await?;
            Ok::<_, AppError>(details)
        };
        match probe.await {
            Ok(details) => PlatformHealth {
                status: "healthy",
                connected: true,
                details: Some(details),
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "platform health check failed");
                PlatformHealth {
                    status: "unhealthy",
                    connected: false,
                    details: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn dashboard(&self) -> Dashboard {
        let report = self.report();
        let platform = self.platform_health().await;
        let health = summarize(&report, &platform);
        Dashboard {
            report,
            platform,
            health,
        }
    }
}

fn summarize(report: &MetricsReport, platform: &PlatformHealth) -> HealthSummary {
    let memory_ok = report.system.memory.usage_percent < MEMORY_WARN_PERCENT;
    HealthSummary {
        overall: if platform.connected && memory_ok {
            "healthy"
        } else {
            "degraded"
        },
        components: ComponentHealth {
            api: if report.requests.requests.success_rate > API_HEALTHY_SUCCESS_RATE {
                "healthy"
            } else {
                "degraded"
            },
            memory: if memory_ok { "healthy" } else { "warning" },
            platform: platform.status,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenSettings;
    use crate::config::LakehouseConfig;
    use crate::lakehouse::client::{AUTH_PATH, HEALTH_PATH};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(base_url: String) -> MonitoringService {
        let cfg = LakehouseConfig {
            base_url,
            ..LakehouseConfig::default()
        };
        let client = Arc::new(LakehouseClient::new(&cfg).unwrap());
        let creds = CredentialManager::new(client.clone(), TokenSettings::from(&cfg));
        MonitoringService::new(client, creds).unwrap()
    }

    #[tokio::test]
    async fn test_platform_health_connected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(AUTH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(HEALTH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "up"})))
            .mount(&server)
            .await;

        let health = service(server.uri()).platform_health().await;
        assert!(health.connected);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.details, Some(json!({"state": "up"})));
    }

    #[tokio::test]
    async fn test_platform_health_never_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(AUTH_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let svc = service(server.uri());
        svc.metrics.record("/api/query/execute", true, Duration::from_millis(10));
        let dash = svc.dashboard().await;
        assert!(!dash.platform.connected);
        assert_eq!(dash.platform.status, "unhealthy");
        assert_eq!(dash.health.overall, "degraded");
        assert_eq!(dash.health.components.api, "healthy");

        let v = serde_json::to_value(&dash).unwrap();
        assert_eq!(v["requests"]["total"], 1);
        assert!(v["system"]["memory"].is_object());
    }
}
