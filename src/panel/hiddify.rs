//! Client for the key-auth panel backend (Hiddify).
//!
//! Authenticates with a static per-server API key header, no token exchange.
//! The wire format speaks GB floats and day counts; this client converts
//! to/from bytes and UTC timestamps at the contract boundary so callers see
//! the same units as the token-auth backend.
//!
//! Accounts on this backend are addressed by uuid, not username.

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;

use crate::panel::base_url;
use crate::panel::types::{
    AccountSpec, AccountStats, AccountUpdate, HealthStatus, PanelAccount, ServerHealth,
};

const API_KEY_HEADER: &str = "Hiddify-API-Key";
const BYTES_PER_GB: f64 = (1024u64 * 1024 * 1024) as f64;

pub fn gb_to_bytes(gb: f64) -> i64 {
    (gb * BYTES_PER_GB).round() as i64
}

pub fn bytes_to_gb(bytes: i64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// Whole days from `now` to `until`, rounding any partial day up so a
/// 30-day expiry always buys 30 package days.
fn days_until(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (until - now).num_seconds();
    (secs + 86_399).div_euclid(86_400)
}

#[derive(Clone)]
pub struct HiddifyClient {
    http: reqwest::Client,
}

impl HiddifyClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn user_base(&self, server: &entity::server::Model) -> String {
        format!("{}/api/v2/admin/user", base_url(server))
    }

    fn api_key(&self, server: &entity::server::Model) -> Option<String> {
        let key = server.api_key.clone();
        if key.is_none() {
            tracing::warn!("Server {} has no API key configured", server.id);
        }
        key
    }

    /// Sends one keyed request; `None` on missing key or transport failure.
    async fn send(
        &self,
        server: &entity::server::Model,
        builder: reqwest::RequestBuilder,
    ) -> Option<reqwest::Response> {
        let key = self.api_key(server)?;

        match builder.header(API_KEY_HEADER, key).send().await {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!("Request to server {} failed: {}", server.id, e);
                None
            }
        }
    }

    async fn fetch_raw(
        &self,
        server: &entity::server::Model,
        uuid: &str,
    ) -> Option<serde_json::Value> {
        let url = format!("{}/{}/", self.user_base(server), uuid);
        let response = self.send(server, self.http.get(&url)).await?;

        if !response.status().is_success() {
            return None;
        }

        response.json().await.ok()
    }

    async fn patch(
        &self,
        server: &entity::server::Model,
        uuid: &str,
        body: &serde_json::Value,
    ) -> Option<serde_json::Value> {
        let url = format!("{}/{}/", self.user_base(server), uuid);
        let response = self.send(server, self.http.patch(&url).json(body)).await?;

        if !response.status().is_success() {
            tracing::warn!(
                "Account update for {} on server {} rejected: {}",
                uuid,
                server.id,
                response.status()
            );
            return None;
        }

        response.json().await.ok()
    }

    pub async fn create_account(
        &self,
        server: &entity::server::Model,
        spec: &AccountSpec,
    ) -> Option<PanelAccount> {
        let package_days = spec
            .expire_at
            .map(|t| days_until(t, Utc::now()).max(1))
            .unwrap_or(0);

        let mut body = serde_json::json!({
            "uuid": spec.uuid,
            "name": spec.username,
            "usage_limit_GB": bytes_to_gb(spec.traffic_limit),
            "package_days": package_days,
            "mode": "no_reset",
            "enable": true,
            "comment": spec.note.clone().unwrap_or_default(),
        });
        if let (serde_json::Value::Object(map), Some(serde_json::Value::Object(extra))) =
            (&mut body, spec.extra.as_ref())
        {
            for (key, value) in extra {
                map.insert(key.clone(), value.clone());
            }
        }

        let url = format!("{}/", self.user_base(server));
        let response = self.send(server, self.http.post(&url).json(&body)).await?;

        if !response.status().is_success() {
            tracing::warn!(
                "Account create for {} on server {} rejected: {}",
                spec.username,
                server.id,
                response.status()
            );
            return None;
        }

        // The panel returns no connection URI; the caller synthesizes one.
        Some(PanelAccount {
            username: spec.username.clone(),
            uuid: spec.uuid.clone(),
            links: Vec::new(),
        })
    }

    pub async fn delete_account(&self, server: &entity::server::Model, uuid: &str) -> bool {
        let url = format!("{}/{}/", self.user_base(server), uuid);
        let response = self.send(server, self.http.delete(&url)).await;

        match response {
            Some(r) => r.status().is_success() || r.status() == StatusCode::NOT_FOUND,
            None => false,
        }
    }

    pub async fn get_account_stats(
        &self,
        server: &entity::server::Model,
        uuid: &str,
    ) -> Option<AccountStats> {
        let json = self.fetch_raw(server, uuid).await?;
        Some(parse_stats(&json))
    }

    pub async fn update_account(
        &self,
        server: &entity::server::Model,
        uuid: &str,
        update: &AccountUpdate,
    ) -> Option<AccountStats> {
        let mut body = serde_json::Map::new();
        if let Some(limit) = update.traffic_limit {
            body.insert("usage_limit_GB".to_string(), bytes_to_gb(limit).into());
        }
        if let Some(expire_at) = update.expire_at {
            let days = days_until(expire_at, Utc::now()).max(0);
            body.insert("package_days".to_string(), days.into());
            // Re-anchor the package window so the day count means "from today".
            body.insert(
                "start_date".to_string(),
                Utc::now().format("%Y-%m-%d").to_string().into(),
            );
        }
        if let Some(enabled) = update.enabled {
            body.insert("enable".to_string(), enabled.into());
        }
        if let Some(max_devices) = update.max_devices {
            body.insert("max_ips".to_string(), max_devices.into());
        }
        if body.is_empty() {
            return self.get_account_stats(server, uuid).await;
        }

        let json = self.patch(server, uuid, &serde_json::Value::Object(body)).await?;
        Some(parse_stats(&json))
    }

    pub async fn set_enabled(
        &self,
        server: &entity::server::Model,
        uuid: &str,
        enabled: bool,
    ) -> bool {
        self.patch(server, uuid, &serde_json::json!({ "enable": enabled }))
            .await
            .is_some()
    }

    pub async fn reset_traffic(&self, server: &entity::server::Model, uuid: &str) -> bool {
        self.patch(server, uuid, &serde_json::json!({ "current_usage_GB": 0.0 }))
            .await
            .is_some()
    }

    pub async fn set_traffic_limit(
        &self,
        server: &entity::server::Model,
        uuid: &str,
        bytes: i64,
    ) -> bool {
        self.patch(
            server,
            uuid,
            &serde_json::json!({ "usage_limit_GB": bytes_to_gb(bytes) }),
        )
        .await
        .is_some()
    }

    /// Adds days on top of the current package window.
    pub async fn extend_expiry(
        &self,
        server: &entity::server::Model,
        uuid: &str,
        days: i64,
    ) -> bool {
        let current = match self.fetch_raw(server, uuid).await {
            Some(json) => json
                .get("package_days")
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            None => return false,
        };

        self.patch(
            server,
            uuid,
            &serde_json::json!({ "package_days": current + days }),
        )
        .await
        .is_some()
    }

    /// Supported on this backend: overwrites the panel-side usage counter.
    pub async fn sync_used_traffic(
        &self,
        server: &entity::server::Model,
        uuid: &str,
        bytes: i64,
    ) -> bool {
        self.patch(
            server,
            uuid,
            &serde_json::json!({ "current_usage_GB": bytes_to_gb(bytes) }),
        )
        .await
        .is_some()
    }

    pub async fn get_all_accounts(
        &self,
        server: &entity::server::Model,
        offset: u64,
        limit: u64,
    ) -> Option<Vec<PanelAccount>> {
        let url = format!("{}/?offset={}&limit={}", self.user_base(server), offset, limit);
        let response = self.send(server, self.http.get(&url)).await?;

        if !response.status().is_success() {
            return None;
        }

        let json: serde_json::Value = response.json().await.ok()?;
        let users = json.as_array()?;

        Some(
            users
                .iter()
                .map(|user| PanelAccount {
                    username: user
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    uuid: user
                        .get("uuid")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    links: Vec::new(),
                })
                .collect(),
        )
    }

    /// Inbound listing is not part of this backend's admin API.
    pub async fn get_inbounds(&self, server: &entity::server::Model) -> Option<serde_json::Value> {
        tracing::debug!("Inbound listing unsupported on server {}", server.id);
        None
    }

    /// Core restart is not exposed by this backend.
    pub async fn restart_panel(&self, server: &entity::server::Model) -> bool {
        tracing::debug!("Panel restart unsupported on server {}", server.id);
        false
    }

    /// Never fails: any problem comes back as an offline/error health value.
    pub async fn server_health(&self, server: &entity::server::Model) -> ServerHealth {
        let url = format!("{}/api/v2/admin/server_status/", base_url(server));
        let response = match self.send(server, self.http.get(&url)).await {
            Some(r) => r,
            None => return ServerHealth::offline("unreachable"),
        };

        if !response.status().is_success() {
            return ServerHealth::error(format!("status {}", response.status()));
        }

        let json: serde_json::Value = match response.json().await {
            Ok(json) => json,
            Err(e) => return ServerHealth::error(format!("bad health payload: {}", e)),
        };

        ServerHealth {
            status: HealthStatus::Online,
            cpu_percent: json.pointer("/stats/system/cpu_percent").and_then(|v| v.as_f64()),
            ram_percent: json.pointer("/stats/system/ram_percent").and_then(|v| v.as_f64()),
            total_users: json.pointer("/stats/usage/total").and_then(|v| v.as_i64()),
            active_users: json.pointer("/stats/usage/active").and_then(|v| v.as_i64()),
            online_users: json.pointer("/stats/usage/online").and_then(|v| v.as_i64()),
            version: json
                .pointer("/stats/system/version")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            uptime_secs: json.pointer("/stats/system/uptime").and_then(|v| v.as_i64()),
            message: None,
        }
    }
}

fn parse_stats(json: &serde_json::Value) -> AccountStats {
    let enabled = json.get("enable").and_then(|v| v.as_bool()).unwrap_or(false);
    let package_days = json.get("package_days").and_then(|v| v.as_i64()).unwrap_or(0);

    // Expiry is derived: the package window starts at start_date (set on first
    // connect) and runs package_days. No start date means the window has not
    // begun, so there is no concrete expiry yet.
    let expire_at = json
        .get("start_date")
        .and_then(|v| v.as_str())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .map(|start| start + chrono::Duration::days(package_days));

    AccountStats {
        status: if enabled { "active" } else { "disabled" }.to_string(),
        used_traffic: json
            .get("current_usage_GB")
            .and_then(|v| v.as_f64())
            .map(gb_to_bytes)
            .unwrap_or(0),
        total_traffic: json
            .get("usage_limit_GB")
            .and_then(|v| v.as_f64())
            .map(gb_to_bytes)
            .unwrap_or(0),
        expire_at,
        online: json.get("is_active").and_then(|v| v.as_bool()).unwrap_or(false),
    }
}
