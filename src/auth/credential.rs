//! Bearer-token lifecycle for the lakehouse platform.
//!
//! One `CredentialManager` is built per process and shared by every caller.
//! It holds at most one token and at most one scheduled renewal; the timer
//! fires `lead_time` before expiry and runs the same procedure as
//! `force_renew`. Concurrent callers that find the token expired are
//! coalesced behind a single renewal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::LakehouseConfig;
use crate::errors::AppError;
use crate::jobs::timer::TimerSlot;
use crate::lakehouse::LakehouseApi;

#[derive(Debug, Clone, Copy)]
pub struct TokenSettings {
    /// Renew this long before expiry.
    pub lead_time: Duration,
    /// Used when the platform does not send `expires_in`.
    pub default_lifetime: Duration,
}

impl From<&LakehouseConfig> for TokenSettings {
    fn from(cfg: &LakehouseConfig) -> Self {
        Self {
            lead_time: cfg.token_lead_time,
            default_lifetime: cfg.default_token_lifetime,
        }
    }
}

/// Read-only snapshot returned by `describe()`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub present: bool,
    pub expired: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_ms: u64,
}

struct HeldToken {
    token: String,
    expires_at: Instant,
    expires_at_utc: DateTime<Utc>,
}

#[derive(Default)]
struct CredentialState {
    held: Option<HeldToken>,
    timer: TimerSlot,
    /// Bumped by `invalidate`; renewals started under an older epoch are not stored.
    epoch: u64,
}

struct Inner {
    api: Arc<dyn LakehouseApi>,
    settings: TokenSettings,
    state: Mutex<CredentialState>,
    renew_lock: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<Inner>,
}

impl CredentialManager {
    pub fn new(api: Arc<dyn LakehouseApi>, settings: TokenSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                settings,
                state: Mutex::new(CredentialState::default()),
                renew_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Return the held token, renewing first if it is absent or expired.
    pub async fn acquire_token(&self) -> Result<String, AppError> {
        if let Some(token) = self.inner.current() {
            return Ok(token);
        }

        let _renewing = self.inner.renew_lock.lock().await;
        // Another caller may have finished a renewal while we waited.
        if let Some(token) = self.inner.current() {
            return Ok(token);
        }
        let epoch = self.inner.epoch();
        self.inner.renew(epoch).await
    }

    /// Renew unconditionally, replacing the held token and any pending timer.
    pub async fn force_renew(&self) -> Result<String, AppError> {
        let _renewing = self.inner.renew_lock.lock().await;
        tracing::info!("renewing bearer token on request");
        let epoch = self.inner.epoch();
        self.inner.renew(epoch).await
    }

    /// Drop the held token and cancel the scheduled renewal.
    pub fn invalidate(&self) {
        let mut state = self.inner.state();
        state.held = None;
        state.timer.cancel();
        state.epoch += 1;
        tracing::info!("bearer token invalidated");
    }

    pub fn describe(&self) -> TokenInfo {
        let state = self.inner.state();
        let now = Instant::now();
        match &state.held {
            Some(held) => TokenInfo {
                present: true,
                expired: now >= held.expires_at,
                expires_at: Some(held.expires_at_utc),
                remaining_ms: held.expires_at.saturating_duration_since(now).as_millis() as u64,
            },
            None => TokenInfo {
                present: false,
                expired: true,
                expires_at: None,
                remaining_ms: 0,
            },
        }
    }

    pub fn has_scheduled_renewal(&self) -> bool {
        self.inner.state().timer.is_armed()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, CredentialState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Option<String> {
        let state = self.state();
        state
            .held
            .as_ref()
            .filter(|held| Instant::now() < held.expires_at)
            .map(|held| held.token.clone())
    }

    fn epoch(&self) -> u64 {
        self.state().epoch
    }

    /// Callers must hold `renew_lock`. The result is stored only if no
    /// `invalidate` happened since `epoch` was read.
    async fn renew(self: &Arc<Self>, epoch: u64) -> Result<String, AppError> {
        let resp = self.api.authenticate().await.map_err(|e| {
            tracing::error!(error = %e, "failed to obtain bearer token");
            AppError::Authentication(e.to_string())
        })?;

        let token = resp.token.filter(|t| !t.is_empty()).ok_or_else(|| {
            tracing::error!("authentication response did not contain a token");
            AppError::Authentication("invalid response from authentication endpoint".into())
        })?;

        let lifetime = resp
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(self.settings.default_lifetime);
        let expires_at = Instant::now().checked_add(lifetime);
        let expires_at_utc = chrono::Duration::from_std(lifetime)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        let (Some(expires_at), Some(expires_at_utc)) = (expires_at, expires_at_utc) else {
            tracing::error!(expires_in = ?resp.expires_in, "authentication response has an unusable expires_in");
            return Err(AppError::Authentication(format!(
                "invalid expires_in from authentication endpoint: {}s",
                lifetime.as_secs()
            )));
        };

        let mut state = self.state();
        if state.epoch != epoch {
            tracing::warn!("credential invalidated during renewal; new token not stored");
            return Ok(token);
        }

        state.held = Some(HeldToken {
            token: token.clone(),
            expires_at,
            expires_at_utc,
        });

        match lifetime.checked_sub(self.settings.lead_time).filter(|d| !d.is_zero()) {
            Some(delay) => {
                let weak = Arc::downgrade(self);
                state.timer.arm(delay, move |id| async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.scheduled_renewal(id).await;
                    }
                });
                tracing::debug!(renew_in_secs = delay.as_secs(), "scheduled token renewal");
            }
            None => {
                // Lifetime no longer than the lead time: renew on demand only.
                state.timer.cancel();
            }
        }

        tracing::info!(expires_in_secs = lifetime.as_secs(), "bearer token issued");
        Ok(token)
    }

    fn scheduled_renewal(self: Arc<Self>, id: u64) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            // Read the epoch together with the release: once released, the
            // timer can no longer be cancelled by `invalidate`.
            let epoch = {
                let mut state = self.state();
                if !state.timer.release(id) {
                    return;
                }
                state.epoch
            };
            let _renewing = self.renew_lock.lock().await;
            if self.epoch() != epoch {
                tracing::debug!("credential invalidated before scheduled renewal ran");
                return;
            }
            tracing::info!("auto-renewing bearer token");
            if let Err(e) = self.renew(epoch).await {
                tracing::error!(error = %e, "scheduled token renewal failed; next request will retry");
            }
        })
    }
}
