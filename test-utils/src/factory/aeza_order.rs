//! VPS marketplace order factory for creating test order entities.

use crate::factory::helpers::next_id;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Factory for creating test VPS orders with customizable fields.
///
/// # Example
///
/// ```rust,ignore
/// use test_utils::factory::aeza_order::AezaOrderFactory;
///
/// let order = AezaOrderFactory::new(&db)
///     .status("ready")
///     .ip_address(Some("203.0.113.7".to_string()))
///     .build()
///     .await?;
/// ```
pub struct AezaOrderFactory<'a> {
    db: &'a DatabaseConnection,
    order_id: String,
    status: String,
    aeza_server_id: Option<String>,
    ip_address: Option<String>,
    root_password: Option<String>,
    error_message: Option<String>,
    meta: Option<serde_json::Value>,
}

impl<'a> AezaOrderFactory<'a> {
    /// Creates a new AezaOrderFactory with default values.
    ///
    /// Defaults:
    /// - order_id: `"order-{id}"` where id is auto-incremented
    /// - status: `"pending"`
    /// - everything else unset
    ///
    /// # Arguments
    /// - `db` - Database connection for inserting the entity
    ///
    /// # Returns
    /// - `AezaOrderFactory` - New factory instance with defaults
    pub fn new(db: &'a DatabaseConnection) -> Self {
        let id = next_id();
        Self {
            db,
            order_id: format!("order-{}", id),
            status: "pending".to_string(),
            aeza_server_id: None,
            ip_address: None,
            root_password: None,
            error_message: None,
            meta: None,
        }
    }

    /// Sets the provider-side order id.
    pub fn order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = order_id.into();
        self
    }

    /// Sets the order status (`"pending"`, `"ready"` or `"failed"`).
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Sets the provisioned instance id.
    pub fn aeza_server_id(mut self, aeza_server_id: Option<String>) -> Self {
        self.aeza_server_id = aeza_server_id;
        self
    }

    /// Sets the provisioned instance IP address.
    pub fn ip_address(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    /// Sets the one-time root password.
    pub fn root_password(mut self, root_password: Option<String>) -> Self {
        self.root_password = root_password;
        self
    }

    /// Sets the failure message.
    pub fn error_message(mut self, error_message: Option<String>) -> Self {
        self.error_message = error_message;
        self
    }

    /// Sets the raw provider payload kept for debugging.
    pub fn meta(mut self, meta: Option<serde_json::Value>) -> Self {
        self.meta = meta;
        self
    }

    /// Builds and inserts the order entity into the database.
    ///
    /// # Returns
    /// - `Ok(entity::aeza_order::Model)` - Created order entity
    /// - `Err(DbErr)` - Database error during insert
    pub async fn build(self) -> Result<entity::aeza_order::Model, DbErr> {
        let now = Utc::now();
        entity::aeza_order::ActiveModel {
            id: ActiveValue::NotSet,
            order_id: ActiveValue::Set(self.order_id),
            status: ActiveValue::Set(self.status),
            aeza_server_id: ActiveValue::Set(self.aeza_server_id),
            ip_address: ActiveValue::Set(self.ip_address),
            root_password: ActiveValue::Set(self.root_password),
            error_message: ActiveValue::Set(self.error_message),
            meta: ActiveValue::Set(self.meta),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
        .insert(self.db)
        .await
    }
}

/// Creates a pending order with default values.
///
/// Shorthand for `AezaOrderFactory::new(db).build().await`.
///
/// # Arguments
/// - `db` - Database connection
///
/// # Returns
/// - `Ok(entity::aeza_order::Model)` - Created order entity
/// - `Err(DbErr)` - Database error during insert
pub async fn create_aeza_order(
    db: &DatabaseConnection,
) -> Result<entity::aeza_order::Model, DbErr> {
    AezaOrderFactory::new(db).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TestBuilder;
    use entity::prelude::*;

    #[tokio::test]
    async fn creates_pending_order_by_default() -> Result<(), DbErr> {
        let test = TestBuilder::new()
            .with_table(AezaOrder)
            .build()
            .await
            .unwrap();
        let db = test.db.as_ref().unwrap();

        let order = create_aeza_order(db).await?;

        assert!(order.is_pending());
        assert!(order.ip_address.is_none());
        assert!(order.root_password.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn creates_ready_order_with_instance_details() -> Result<(), DbErr> {
        let test = TestBuilder::new()
            .with_table(AezaOrder)
            .build()
            .await
            .unwrap();
        let db = test.db.as_ref().unwrap();

        let order = AezaOrderFactory::new(db)
            .status("ready")
            .aeza_server_id(Some("vps-42".to_string()))
            .ip_address(Some("203.0.113.7".to_string()))
            .root_password(Some("one-time-secret".to_string()))
            .meta(Some(serde_json::json!({"plan": "small"})))
            .build()
            .await?;

        assert!(order.is_ready());
        assert_eq!(order.ip_address.as_deref(), Some("203.0.113.7"));

        Ok(())
    }
}
