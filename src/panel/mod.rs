//! Panel backend abstraction.
//!
//! One capability contract over heterogeneous VPN panel APIs. Orchestration
//! and reconciliation code depends only on `PanelClient`; the concrete
//! backend is picked once, in `PanelRegistry::resolve`, from the server row's
//! declared kind. No other call site branches on backend type, so adding a
//! third backend touches the registry and a new client module only.

pub mod hiddify;
pub mod marzban;
pub mod token;
pub mod types;

#[cfg(test)]
mod test;

use crate::error::{config::ConfigError, AppError};
use crate::panel::hiddify::HiddifyClient;
use crate::panel::marzban::MarzbanClient;
use crate::panel::token::TokenStore;
use crate::panel::types::{AccountSpec, AccountStats, AccountUpdate, PanelAccount, ServerHealth};

/// Builds the panel API base URL for a server.
///
/// `api_domain` may carry an explicit scheme (tests point it at local mock
/// servers); without one it defaults to https.
pub fn base_url(server: &entity::server::Model) -> String {
    let domain = server.api_domain.trim_end_matches('/');
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    }
}

/// Tagged dispatch over the supported panel backends.
#[derive(Clone)]
pub enum PanelClient {
    Marzban(MarzbanClient),
    Hiddify(HiddifyClient),
}

impl PanelClient {
    /// The identifier this backend addresses accounts by: username for the
    /// token-auth backend, uuid for the key-auth backend.
    pub fn account_id<'a>(&self, subscription: &'a entity::subscription::Model) -> &'a str {
        match self {
            Self::Marzban(_) => &subscription.username,
            Self::Hiddify(_) => &subscription.uuid,
        }
    }

    pub async fn create_account(
        &self,
        server: &entity::server::Model,
        spec: &AccountSpec,
    ) -> Option<PanelAccount> {
        match self {
            Self::Marzban(client) => client.create_account(server, spec).await,
            Self::Hiddify(client) => client.create_account(server, spec).await,
        }
    }

    pub async fn delete_account(&self, server: &entity::server::Model, id: &str) -> bool {
        match self {
            Self::Marzban(client) => client.delete_account(server, id).await,
            Self::Hiddify(client) => client.delete_account(server, id).await,
        }
    }

    pub async fn get_account_stats(
        &self,
        server: &entity::server::Model,
        id: &str,
    ) -> Option<AccountStats> {
        match self {
            Self::Marzban(client) => client.get_account_stats(server, id).await,
            Self::Hiddify(client) => client.get_account_stats(server, id).await,
        }
    }

    pub async fn update_account(
        &self,
        server: &entity::server::Model,
        id: &str,
        update: &AccountUpdate,
    ) -> Option<AccountStats> {
        match self {
            Self::Marzban(client) => client.update_account(server, id, update).await,
            Self::Hiddify(client) => client.update_account(server, id, update).await,
        }
    }

    pub async fn set_enabled(
        &self,
        server: &entity::server::Model,
        id: &str,
        enabled: bool,
    ) -> bool {
        match self {
            Self::Marzban(client) => client.set_enabled(server, id, enabled).await,
            Self::Hiddify(client) => client.set_enabled(server, id, enabled).await,
        }
    }

    pub async fn reset_traffic(&self, server: &entity::server::Model, id: &str) -> bool {
        match self {
            Self::Marzban(client) => client.reset_traffic(server, id).await,
            Self::Hiddify(client) => client.reset_traffic(server, id).await,
        }
    }

    pub async fn set_traffic_limit(
        &self,
        server: &entity::server::Model,
        id: &str,
        bytes: i64,
    ) -> bool {
        match self {
            Self::Marzban(client) => client.set_traffic_limit(server, id, bytes).await,
            Self::Hiddify(client) => client.set_traffic_limit(server, id, bytes).await,
        }
    }

    pub async fn extend_expiry(
        &self,
        server: &entity::server::Model,
        id: &str,
        days: i64,
    ) -> bool {
        match self {
            Self::Marzban(client) => client.extend_expiry(server, id, days).await,
            Self::Hiddify(client) => client.extend_expiry(server, id, days).await,
        }
    }

    /// Pushes an observed used-traffic value down to the panel. Returns
    /// `false` on backends without a write path for usage.
    pub async fn sync_used_traffic(
        &self,
        server: &entity::server::Model,
        id: &str,
        bytes: i64,
    ) -> bool {
        match self {
            Self::Marzban(client) => client.sync_used_traffic(server, id, bytes).await,
            Self::Hiddify(client) => client.sync_used_traffic(server, id, bytes).await,
        }
    }

    pub async fn get_all_accounts(
        &self,
        server: &entity::server::Model,
        offset: u64,
        limit: u64,
    ) -> Option<Vec<PanelAccount>> {
        match self {
            Self::Marzban(client) => client.get_all_accounts(server, offset, limit).await,
            Self::Hiddify(client) => client.get_all_accounts(server, offset, limit).await,
        }
    }

    pub async fn get_inbounds(&self, server: &entity::server::Model) -> Option<serde_json::Value> {
        match self {
            Self::Marzban(client) => client.get_inbounds(server).await,
            Self::Hiddify(client) => client.get_inbounds(server).await,
        }
    }

    /// Optional capability: `false` where the backend lacks the feature.
    pub async fn restart_panel(&self, server: &entity::server::Model) -> bool {
        match self {
            Self::Marzban(client) => client.restart_panel(server).await,
            Self::Hiddify(client) => client.restart_panel(server).await,
        }
    }

    /// Never fails; see the concrete clients.
    pub async fn server_health(&self, server: &entity::server::Model) -> ServerHealth {
        match self {
            Self::Marzban(client) => client.server_health(server).await,
            Self::Hiddify(client) => client.server_health(server).await,
        }
    }
}

/// Resolves a server's declared backend kind to its client.
#[derive(Clone)]
pub struct PanelRegistry {
    marzban: PanelClient,
    hiddify: PanelClient,
}

impl PanelRegistry {
    pub fn new(http: reqwest::Client, tokens: TokenStore) -> Self {
        Self {
            marzban: PanelClient::Marzban(MarzbanClient::new(http.clone(), tokens)),
            hiddify: PanelClient::Hiddify(HiddifyClient::new(http)),
        }
    }

    /// Pure lookup by the server's declared kind; an unrecognized kind is a
    /// configuration defect surfaced immediately, never retried.
    pub fn resolve(&self, server: &entity::server::Model) -> Result<&PanelClient, AppError> {
        match server.panel_kind.as_str() {
            "marzban" => Ok(&self.marzban),
            "hiddify" => Ok(&self.hiddify),
            other => Err(ConfigError::UnsupportedPanelKind(other.to_string()).into()),
        }
    }
}
