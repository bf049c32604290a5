use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::LinkConfig;
use crate::notify::Notifier;
use crate::panel::PanelRegistry;
use crate::service::lifecycle::WarningMarkers;

/// Shared application state handed to the scheduler and long-lived tasks.
///
/// Everything here is cheap to clone: connection pools, channels and Arcs.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub http_client: reqwest::Client,
    pub registry: Arc<PanelRegistry>,
    pub notifier: Notifier,
    pub markers: WarningMarkers,
    pub links: LinkConfig,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        http_client: reqwest::Client,
        registry: Arc<PanelRegistry>,
        notifier: Notifier,
        markers: WarningMarkers,
        links: LinkConfig,
    ) -> Self {
        Self {
            db,
            http_client,
            registry,
            notifier,
            markers,
            links,
        }
    }
}
