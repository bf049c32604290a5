use sea_orm::DatabaseConnection;

use crate::data::server::ServerRepository;
use crate::error::AppError;

/// Picks servers for new accounts: least-loaded first among active servers
/// with free capacity, optionally narrowed by location and routing category.
#[derive(Clone)]
pub struct ServerSelectionService {
    db: DatabaseConnection,
}

impl ServerSelectionService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The single best candidate for a new account.
    ///
    /// # Returns
    /// - `Ok(Model)`: Least-loaded eligible server
    /// - `Err(AppError::NotFound)`: Nothing matches the filters with free capacity
    pub async fn select_best_server(
        &self,
        location: Option<&str>,
        category: Option<&str>,
    ) -> Result<entity::server::Model, AppError> {
        ServerRepository::new(&self.db)
            .least_loaded(location, category)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("No server with free capacity matches the request".to_string())
            })
    }

    /// All eligible candidates, least-loaded first.
    pub async fn available_servers(
        &self,
        location: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<entity::server::Model>, AppError> {
        Ok(ServerRepository::new(&self.db)
            .available_servers(location, category)
            .await?)
    }

    /// Locations that can currently take new accounts.
    pub async fn available_locations(&self) -> Result<Vec<String>, AppError> {
        Ok(ServerRepository::new(&self.db).available_locations().await?)
    }
}
