//! Shared types for the panel client contract.
//!
//! All panel backends speak bytes and UTC timestamps through these types; any
//! wire-format unit conversion (GB floats, day counts) happens inside the
//! concrete client so callers see one set of units.

use chrono::{DateTime, Utc};

/// Everything needed to create a panel account.
///
/// `traffic_limit` is bytes with `0` meaning unlimited; `expire_at` of `None`
/// means no time limit. `extra` is a backend-specific JSON fragment merged
/// into the create request by the caller (e.g. protocol inbound selection) so
/// the contract itself stays protocol-agnostic.
#[derive(Clone, Debug)]
pub struct AccountSpec {
    pub username: String,
    pub uuid: String,
    pub traffic_limit: i64,
    pub expire_at: Option<DateTime<Utc>>,
    pub max_devices: i32,
    pub note: Option<String>,
    pub extra: Option<serde_json::Value>,
}

/// Partial account update. `None` fields are left untouched on the panel.
#[derive(Clone, Debug, Default)]
pub struct AccountUpdate {
    pub traffic_limit: Option<i64>,
    pub expire_at: Option<DateTime<Utc>>,
    pub max_devices: Option<i32>,
    pub enabled: Option<bool>,
}

/// Identity of a created or listed panel account, plus any connection URIs
/// the panel handed back. An empty `links` vector means the caller must
/// synthesize a URI from its per-backend template.
#[derive(Clone, Debug)]
pub struct PanelAccount {
    pub username: String,
    pub uuid: String,
    pub links: Vec<String>,
}

/// Live usage snapshot for one account.
#[derive(Clone, Debug)]
pub struct AccountStats {
    pub status: String,
    pub used_traffic: i64,
    pub total_traffic: i64,
    pub expire_at: Option<DateTime<Utc>>,
    pub online: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
    Online,
    Offline,
    Error,
}

/// Structured server health. `server_health` never fails: transport problems
/// come back as an `Offline`/`Error` value with a message instead of an error.
#[derive(Clone, Debug)]
pub struct ServerHealth {
    pub status: HealthStatus,
    pub cpu_percent: Option<f64>,
    pub ram_percent: Option<f64>,
    pub total_users: Option<i64>,
    pub active_users: Option<i64>,
    pub online_users: Option<i64>,
    pub version: Option<String>,
    pub uptime_secs: Option<i64>,
    pub message: Option<String>,
}

impl ServerHealth {
    pub fn offline(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Offline,
            cpu_percent: None,
            ram_percent: None,
            total_users: None,
            active_users: None,
            online_users: None,
            version: None,
            uptime_secs: None,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            message: Some(message.into()),
            ..Self::offline(String::new())
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == HealthStatus::Online
    }
}
