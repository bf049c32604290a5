//! Server factory for creating test panel server entities.
//!
//! This module provides factory methods for creating server entities with
//! sensible defaults, reducing boilerplate in tests. The factory supports
//! customization through a builder pattern.

use crate::factory::helpers::next_id;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Factory for creating test servers with customizable fields.
///
/// Provides a builder pattern for creating server entities with default
/// values that can be overridden as needed for specific test scenarios.
///
/// # Example
///
/// ```rust,ignore
/// use test_utils::factory::server::ServerFactory;
///
/// let server = ServerFactory::new(&db)
///     .panel_kind("hiddify")
///     .api_domain("http://127.0.0.1:9999")
///     .capacity(5)
///     .build()
///     .await?;
/// ```
pub struct ServerFactory<'a> {
    db: &'a DatabaseConnection,
    name: String,
    flag_emoji: Option<String>,
    ip_address: String,
    api_domain: String,
    admin_user: Option<String>,
    admin_pass: Option<String>,
    api_key: Option<String>,
    panel_kind: String,
    capacity: i32,
    active_users_count: i32,
    location_tag: String,
    region: String,
    server_category: String,
    is_active: bool,
    is_central: bool,
}

impl<'a> ServerFactory<'a> {
    /// Creates a new ServerFactory with default values.
    ///
    /// Defaults:
    /// - name: `"Server {id}"` where id is auto-incremented
    /// - ip_address: `"192.0.2.{id}"` (TEST-NET-1 range)
    /// - api_domain: `"panel-{id}.example.com"`
    /// - admin_user/admin_pass: `Some("admin")` / `Some("secret")`
    /// - panel_kind: `"marzban"`
    /// - capacity: `100`, active_users_count: `0`
    /// - location_tag: `"loc-{id}"`, region: `"foreign"`, category: `"direct"`
    /// - is_active: `true`, is_central: `false`
    ///
    /// # Arguments
    /// - `db` - Database connection for inserting the entity
    ///
    /// # Returns
    /// - `ServerFactory` - New factory instance with defaults
    pub fn new(db: &'a DatabaseConnection) -> Self {
        let id = next_id();
        Self {
            db,
            name: format!("Server {}", id),
            flag_emoji: None,
            ip_address: format!("192.0.2.{}", id % 250 + 1),
            api_domain: format!("panel-{}.example.com", id),
            admin_user: Some("admin".to_string()),
            admin_pass: Some("secret".to_string()),
            api_key: None,
            panel_kind: "marzban".to_string(),
            capacity: 100,
            active_users_count: 0,
            location_tag: format!("loc-{}", id),
            region: "foreign".to_string(),
            server_category: "direct".to_string(),
            is_active: true,
            is_central: false,
        }
    }

    /// Sets the server name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the panel API base domain. May carry an explicit scheme.
    pub fn api_domain(mut self, api_domain: impl Into<String>) -> Self {
        self.api_domain = api_domain.into();
        self
    }

    /// Sets the panel admin username.
    pub fn admin_user(mut self, admin_user: Option<String>) -> Self {
        self.admin_user = admin_user;
        self
    }

    /// Sets the panel admin password.
    pub fn admin_pass(mut self, admin_pass: Option<String>) -> Self {
        self.admin_pass = admin_pass;
        self
    }

    /// Sets the panel API key (hiddify-style auth).
    pub fn api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Sets the panel backend kind (`"marzban"` or `"hiddify"`).
    pub fn panel_kind(mut self, panel_kind: impl Into<String>) -> Self {
        self.panel_kind = panel_kind.into();
        self
    }

    /// Sets the capacity limit.
    pub fn capacity(mut self, capacity: i32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the advisory active user count.
    pub fn active_users_count(mut self, count: i32) -> Self {
        self.active_users_count = count;
        self
    }

    /// Sets the location tag grouping interchangeable servers.
    pub fn location_tag(mut self, location_tag: impl Into<String>) -> Self {
        self.location_tag = location_tag.into();
        self
    }

    /// Sets the region (`"iran"` or `"foreign"`).
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Sets the routing category (`"direct"`, `"tunnel_entry"` or `"tunnel_exit"`).
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.server_category = category.into();
        self
    }

    /// Sets whether the server participates in selection.
    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Sets whether the server is the central traffic reference.
    pub fn central(mut self, central: bool) -> Self {
        self.is_central = central;
        self
    }

    /// Builds and inserts the server entity into the database.
    ///
    /// # Returns
    /// - `Ok(entity::server::Model)` - Created server entity
    /// - `Err(DbErr)` - Database error during insert
    pub async fn build(self) -> Result<entity::server::Model, DbErr> {
        let now = Utc::now();
        entity::server::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(self.name),
            flag_emoji: ActiveValue::Set(self.flag_emoji),
            ip_address: ActiveValue::Set(self.ip_address),
            api_domain: ActiveValue::Set(self.api_domain),
            admin_user: ActiveValue::Set(self.admin_user),
            admin_pass: ActiveValue::Set(self.admin_pass),
            api_key: ActiveValue::Set(self.api_key),
            panel_kind: ActiveValue::Set(self.panel_kind),
            capacity: ActiveValue::Set(self.capacity),
            active_users_count: ActiveValue::Set(self.active_users_count),
            location_tag: ActiveValue::Set(self.location_tag),
            region: ActiveValue::Set(self.region),
            server_category: ActiveValue::Set(self.server_category),
            is_active: ActiveValue::Set(self.is_active),
            is_central: ActiveValue::Set(self.is_central),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
        .insert(self.db)
        .await
    }
}

/// Creates a server with default values.
///
/// Shorthand for `ServerFactory::new(db).build().await`.
///
/// # Arguments
/// - `db` - Database connection
///
/// # Returns
/// - `Ok(entity::server::Model)` - Created server entity
/// - `Err(DbErr)` - Database error during insert
pub async fn create_server(db: &DatabaseConnection) -> Result<entity::server::Model, DbErr> {
    ServerFactory::new(db).build().await
}

/// Creates a server running the given panel backend.
///
/// Hiddify servers get a default API key since that backend authenticates
/// with one instead of admin credentials.
///
/// # Arguments
/// - `db` - Database connection
/// - `panel_kind` - Panel backend kind (`"marzban"` or `"hiddify"`)
///
/// # Returns
/// - `Ok(entity::server::Model)` - Created server entity
/// - `Err(DbErr)` - Database error during insert
pub async fn create_server_with_panel(
    db: &DatabaseConnection,
    panel_kind: impl Into<String>,
) -> Result<entity::server::Model, DbErr> {
    let panel_kind = panel_kind.into();
    let factory = if panel_kind == "hiddify" {
        ServerFactory::new(db).api_key(Some("test-api-key".to_string()))
    } else {
        ServerFactory::new(db)
    };
    factory.panel_kind(panel_kind).build().await
}
