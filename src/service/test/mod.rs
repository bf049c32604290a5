mod aeza;
mod lifecycle;
mod selection;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::LinkConfig;
use crate::panel::token::TokenStore;
use crate::panel::PanelRegistry;
use crate::service::lifecycle::WarningMarkers;
use crate::service::provisioning::ProvisioningService;

fn link_config() -> LinkConfig {
    LinkConfig {
        reality_public_key: "pbk-test".to_string(),
        reality_sni: "cdn.example.com".to_string(),
        reality_short_id: "ab12".to_string(),
        reality_port: 443,
    }
}

fn registry() -> Arc<PanelRegistry> {
    Arc::new(PanelRegistry::new(reqwest::Client::new(), TokenStore::new()))
}

fn provisioning(db: &DatabaseConnection) -> ProvisioningService {
    ProvisioningService::new(
        db.clone(),
        registry(),
        link_config(),
        WarningMarkers::new(),
    )
}
