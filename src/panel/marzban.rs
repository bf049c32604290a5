//! Client for the token-auth panel backend (Marzban).
//!
//! Authenticates with an OAuth2 password exchange and caches the bearer token
//! per server (see `TokenStore`). On a 401 the cached token is invalidated and
//! the original request is retried exactly once with a freshly obtained token.
//! Wire units are already native: bytes and unix timestamps.
//!
//! Every operation absorbs transport and non-success failures into
//! `Option`/`bool` returns so batch callers degrade per-server.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use crate::panel::base_url;
use crate::panel::token::TokenStore;
use crate::panel::types::{AccountSpec, AccountStats, AccountUpdate, PanelAccount, ServerHealth};

#[derive(Clone)]
pub struct MarzbanClient {
    http: reqwest::Client,
    tokens: TokenStore,
}

impl MarzbanClient {
    pub fn new(http: reqwest::Client, tokens: TokenStore) -> Self {
        Self { http, tokens }
    }

    /// Exchanges the server's admin credentials for a fresh bearer token and
    /// caches it. Returns `None` when credentials are missing or the exchange
    /// fails.
    async fn authenticate(&self, server: &entity::server::Model) -> Option<String> {
        let (username, password) = match (&server.admin_user, &server.admin_pass) {
            (Some(u), Some(p)) => (u.clone(), p.clone()),
            _ => {
                tracing::warn!("Server {} has no admin credentials configured", server.id);
                return None;
            }
        };

        let url = format!("{}/api/admin/token", base_url(server));
        let result = self
            .http
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await;

        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!("Token exchange for server {} rejected: {}", server.id, r.status());
                return None;
            }
            Err(e) => {
                tracing::warn!("Token exchange for server {} failed: {}", server.id, e);
                return None;
            }
        };

        let body: serde_json::Value = response.json().await.ok()?;
        let token = body.get("access_token")?.as_str()?.to_string();

        self.tokens.put(server.id, token.clone());
        Some(token)
    }

    async fn token(&self, server: &entity::server::Model) -> Option<String> {
        match self.tokens.get(server.id) {
            Some(token) => Some(token),
            None => self.authenticate(server).await,
        }
    }

    /// Sends an authorized request, retrying exactly once with a fresh token
    /// when the panel answers 401. Returns the final response even when it is
    /// a non-success status; `None` only on transport failure or when no token
    /// could be obtained.
    async fn send_authorized<F>(
        &self,
        server: &entity::server::Model,
        build: F,
    ) -> Option<reqwest::Response>
    where
        F: Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    {
        let token = self.token(server).await?;

        let response = match build(&self.http, &token).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Request to server {} failed: {}", server.id, e);
                return None;
            }
        };

        if response.status() != StatusCode::UNAUTHORIZED {
            return Some(response);
        }

        self.tokens.invalidate(server.id);
        let token = self.authenticate(server).await?;

        match build(&self.http, &token).send().await {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!("Retry against server {} failed: {}", server.id, e);
                None
            }
        }
    }

    pub async fn create_account(
        &self,
        server: &entity::server::Model,
        spec: &AccountSpec,
    ) -> Option<PanelAccount> {
        let mut body = serde_json::json!({
            "username": spec.username,
            "proxies": { "vless": { "id": spec.uuid } },
            "inbounds": {},
            "status": "active",
            "data_limit": spec.traffic_limit,
            "expire": spec.expire_at.map(|t| t.timestamp()).unwrap_or(0),
            "note": spec.note.clone().unwrap_or_default(),
        });
        merge_extra(&mut body, spec.extra.as_ref());

        let url = format!("{}/api/user", base_url(server));
        let response = self
            .send_authorized(server, |http, token| {
                http.post(&url).bearer_auth(token).json(&body)
            })
            .await?;

        if !response.status().is_success() {
            tracing::warn!(
                "Account create for {} on server {} rejected: {}",
                spec.username,
                server.id,
                response.status()
            );
            return None;
        }

        let json: serde_json::Value = response.json().await.ok()?;
        let links = json
            .get("links")
            .and_then(|l| l.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Some(PanelAccount {
            username: spec.username.clone(),
            uuid: spec.uuid.clone(),
            links,
        })
    }

    pub async fn delete_account(&self, server: &entity::server::Model, username: &str) -> bool {
        let url = format!("{}/api/user/{}", base_url(server), username);
        let response = self
            .send_authorized(server, |http, token| http.delete(&url).bearer_auth(token))
            .await;

        match response {
            // Already gone counts as deleted.
            Some(r) => r.status().is_success() || r.status() == StatusCode::NOT_FOUND,
            None => false,
        }
    }

    pub async fn get_account_stats(
        &self,
        server: &entity::server::Model,
        username: &str,
    ) -> Option<AccountStats> {
        let url = format!("{}/api/user/{}", base_url(server), username);
        let response = self
            .send_authorized(server, |http, token| http.get(&url).bearer_auth(token))
            .await?;

        if !response.status().is_success() {
            return None;
        }

        let json: serde_json::Value = response.json().await.ok()?;
        Some(parse_stats(&json))
    }

    pub async fn update_account(
        &self,
        server: &entity::server::Model,
        username: &str,
        update: &AccountUpdate,
    ) -> Option<AccountStats> {
        let mut body = serde_json::Map::new();
        if let Some(limit) = update.traffic_limit {
            body.insert("data_limit".to_string(), limit.into());
        }
        if let Some(expire_at) = update.expire_at {
            body.insert("expire".to_string(), expire_at.timestamp().into());
        }
        if let Some(enabled) = update.enabled {
            let status = if enabled { "active" } else { "disabled" };
            body.insert("status".to_string(), status.into());
        }
        // Marzban has no device cap field; the cap is advisory on this backend.
        if body.is_empty() {
            return self.get_account_stats(server, username).await;
        }

        let body = serde_json::Value::Object(body);
        let url = format!("{}/api/user/{}", base_url(server), username);
        let response = self
            .send_authorized(server, |http, token| {
                http.put(&url).bearer_auth(token).json(&body)
            })
            .await?;

        if !response.status().is_success() {
            tracing::warn!(
                "Account update for {} on server {} rejected: {}",
                username,
                server.id,
                response.status()
            );
            return None;
        }

        let json: serde_json::Value = response.json().await.ok()?;
        Some(parse_stats(&json))
    }

    pub async fn set_enabled(
        &self,
        server: &entity::server::Model,
        username: &str,
        enabled: bool,
    ) -> bool {
        self.update_account(
            server,
            username,
            &AccountUpdate {
                enabled: Some(enabled),
                ..Default::default()
            },
        )
        .await
        .is_some()
    }

    pub async fn reset_traffic(&self, server: &entity::server::Model, username: &str) -> bool {
        let url = format!("{}/api/user/{}/reset", base_url(server), username);
        let response = self
            .send_authorized(server, |http, token| http.post(&url).bearer_auth(token))
            .await;

        matches!(response, Some(r) if r.status().is_success())
    }

    pub async fn set_traffic_limit(
        &self,
        server: &entity::server::Model,
        username: &str,
        bytes: i64,
    ) -> bool {
        self.update_account(
            server,
            username,
            &AccountUpdate {
                traffic_limit: Some(bytes),
                ..Default::default()
            },
        )
        .await
        .is_some()
    }

    /// Reads current stats and writes back `(future expiry or now) + days`.
    pub async fn extend_expiry(
        &self,
        server: &entity::server::Model,
        username: &str,
        days: i64,
    ) -> bool {
        let stats = match self.get_account_stats(server, username).await {
            Some(stats) => stats,
            None => return false,
        };

        let now = Utc::now();
        let base = stats.expire_at.filter(|t| *t > now).unwrap_or(now);
        let new_expiry = base + chrono::Duration::days(days);

        self.update_account(
            server,
            username,
            &AccountUpdate {
                expire_at: Some(new_expiry),
                ..Default::default()
            },
        )
        .await
        .is_some()
    }

    /// This backend exposes no settable used-traffic field; the discrepancy is
    /// logged for manual review and the call reports unsupported.
    pub async fn sync_used_traffic(
        &self,
        server: &entity::server::Model,
        username: &str,
        bytes: i64,
    ) -> bool {
        tracing::info!(
            "No used-traffic write path on server {}; account {} diverges by target {} bytes",
            server.id,
            username,
            bytes
        );
        false
    }

    pub async fn get_all_accounts(
        &self,
        server: &entity::server::Model,
        offset: u64,
        limit: u64,
    ) -> Option<Vec<PanelAccount>> {
        let url = format!(
            "{}/api/users?offset={}&limit={}",
            base_url(server),
            offset,
            limit
        );
        let response = self
            .send_authorized(server, |http, token| http.get(&url).bearer_auth(token))
            .await?;

        if !response.status().is_success() {
            return None;
        }

        let json: serde_json::Value = response.json().await.ok()?;
        let users = json.get("users")?.as_array()?;

        Some(
            users
                .iter()
                .map(|user| PanelAccount {
                    username: user
                        .get("username")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    uuid: user
                        .pointer("/proxies/vless/id")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    links: Vec::new(),
                })
                .collect(),
        )
    }

    pub async fn get_inbounds(&self, server: &entity::server::Model) -> Option<serde_json::Value> {
        let url = format!("{}/api/inbounds", base_url(server));
        let response = self
            .send_authorized(server, |http, token| http.get(&url).bearer_auth(token))
            .await?;

        if !response.status().is_success() {
            return None;
        }

        response.json().await.ok()
    }

    pub async fn restart_panel(&self, server: &entity::server::Model) -> bool {
        let url = format!("{}/api/core/restart", base_url(server));
        let response = self
            .send_authorized(server, |http, token| http.post(&url).bearer_auth(token))
            .await;

        matches!(response, Some(r) if r.status().is_success())
    }

    /// Never fails: any problem comes back as an offline/error health value.
    pub async fn server_health(&self, server: &entity::server::Model) -> ServerHealth {
        let url = format!("{}/api/system", base_url(server));
        let response = match self
            .send_authorized(server, |http, token| http.get(&url).bearer_auth(token))
            .await
        {
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

        let mem_total = json.get("mem_total").and_then(|v| v.as_f64());
        let mem_used = json.get("mem_used").and_then(|v| v.as_f64());
        let ram_percent = match (mem_total, mem_used) {
            (Some(total), Some(used)) if total > 0.0 => Some(used / total * 100.0),
            _ => None,
        };

        ServerHealth {
            status: crate::panel::types::HealthStatus::Online,
            cpu_percent: json.get("cpu_usage").and_then(|v| v.as_f64()),
            ram_percent,
            total_users: json.get("total_user").and_then(|v| v.as_i64()),
            active_users: json.get("users_active").and_then(|v| v.as_i64()),
            online_users: json.get("online_users").and_then(|v| v.as_i64()),
            version: json
                .get("version")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            uptime_secs: None,
            message: None,
        }
    }
}

fn parse_stats(json: &serde_json::Value) -> AccountStats {
    AccountStats {
        status: json
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        used_traffic: json.get("used_traffic").and_then(|v| v.as_i64()).unwrap_or(0),
        total_traffic: json.get("data_limit").and_then(|v| v.as_i64()).unwrap_or(0),
        expire_at: json
            .get("expire")
            .and_then(|v| v.as_i64())
            .filter(|ts| *ts > 0)
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        online: json.get("online_at").map(|v| v.is_string()).unwrap_or(false),
    }
}

fn merge_extra(body: &mut serde_json::Value, extra: Option<&serde_json::Value>) {
    if let (serde_json::Value::Object(map), Some(serde_json::Value::Object(extra))) = (body, extra)
    {
        for (key, value) in extra {
            map.insert(key.clone(), value.clone());
        }
    }
}
