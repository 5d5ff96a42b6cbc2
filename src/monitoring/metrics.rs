//! Per-request counters and response times.
//!
//! Aggregates are kept in memory for the JSON monitoring endpoints and
//! mirrored into a private Prometheus registry for `/metrics` scraping.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use prometheus::{
    histogram_opts, opts, Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder,
};
use serde::Serialize;

use crate::errors::AppError;

/// Response-time samples kept, globally and per endpoint.
const RESPONSE_TIME_WINDOW: usize = 100;
/// Samples included in the `recentResponseTimes` field.
const RECENT_SAMPLES: usize = 20;

#[derive(Default)]
struct EndpointStats {
    total: u64,
    success: u64,
    failed: u64,
    response_times: VecDeque<f64>,
}

#[derive(Default)]
struct Counters {
    total: u64,
    success: u64,
    failed: u64,
    response_times: VecDeque<f64>,
    by_endpoint: BTreeMap<String, EndpointStats>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestTotals {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub avg_response_time: f64,
    pub recent_response_times: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSnapshot {
    pub endpoint: String,
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub avg_response_time: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub requests: RequestTotals,
    pub performance: Performance,
    pub endpoints: Vec<EndpointSnapshot>,
}

pub struct RequestMetrics {
    counters: Mutex<Counters>,
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
}

impl RequestMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            opts!("lakehouse_relay_requests_total", "Total HTTP requests handled"),
            &["endpoint", "outcome"],
        )?;
        let request_duration_seconds = HistogramVec::new(
            histogram_opts!(
                "lakehouse_relay_request_duration_seconds",
                "Request latency in seconds",
                // Queries can poll for several minutes.
                vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]
            ),
            &["endpoint"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            counters: Mutex::new(Counters::default()),
            registry,
            requests_total,
            request_duration_seconds,
        })
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, endpoint: &str, success: bool, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        {
            let mut c = self.counters();
            c.total += 1;
            if success {
                c.success += 1;
            } else {
                c.failed += 1;
            }
            push_sample(&mut c.response_times, ms);

            let ep = c.by_endpoint.entry(endpoint.to_string()).or_default();
            ep.total += 1;
            if success {
                ep.success += 1;
            } else {
                ep.failed += 1;
            }
            push_sample(&mut ep.response_times, ms);
        }

        let outcome = if success { "success" } else { "failure" };
        self.requests_total.with_label_values(&[endpoint, outcome]).inc();
        self.request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(elapsed.as_secs_f64());
    }

    pub fn snapshot(&self) -> RequestSnapshot {
        let c = self.counters();
        RequestSnapshot {
            requests: RequestTotals {
                total: c.total,
                success: c.success,
                failed: c.failed,
                success_rate: success_rate(c.success, c.total),
            },
            performance: Performance {
                avg_response_time: average(&c.response_times),
                recent_response_times: c
                    .response_times
                    .iter()
                    .skip(c.response_times.len().saturating_sub(RECENT_SAMPLES))
                    .copied()
                    .collect(),
            },
            endpoints: c
                .by_endpoint
                .iter()
                .map(|(endpoint, ep)| EndpointSnapshot {
                    endpoint: endpoint.clone(),
                    total: ep.total,
                    success: ep.success,
                    failed: ep.failed,
                    avg_response_time: average(&ep.response_times),
                    success_rate: success_rate(ep.success, ep.total),
                })
                .collect(),
        }
    }

    /// Clears the JSON aggregates. Prometheus counters stay monotonic.
    pub fn reset(&self) {
        *self.counters() = Counters::default();
        tracing::info!("request metrics reset");
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render_prometheus(&self) -> Result<String, AppError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|e| AppError::Internal(e.into()))?;
        String::from_utf8(buf).map_err(|e| AppError::Internal(e.into()))
    }
}

fn push_sample(window: &mut VecDeque<f64>, ms: f64) {
    window.push_back(ms);
    if window.len() > RESPONSE_TIME_WINDOW {
        window.pop_front();
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn average(samples: &VecDeque<f64>) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    round2(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Percentage with two decimals. No traffic counts as fully successful.
fn success_rate(success: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    round2(success as f64 / total as f64 * 100.0)
}
