//! Subscription factory for creating test subscription entities.
//!
//! This module provides factory methods for creating subscription entities
//! with sensible defaults, reducing boilerplate in tests. The factory
//! supports customization through a builder pattern.

use crate::factory::helpers::next_id;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

const GIB: i64 = 1024 * 1024 * 1024;

/// Factory for creating test subscriptions with customizable fields.
///
/// Provides a builder pattern for creating subscription entities with
/// default values that can be overridden as needed for specific test
/// scenarios.
///
/// # Example
///
/// ```rust,ignore
/// use test_utils::factory::subscription::SubscriptionFactory;
///
/// let subscription = SubscriptionFactory::new(&db, user.id, plan.id)
///     .server_id(Some(server.id))
///     .used_traffic(40 * 1024 * 1024 * 1024)
///     .build()
///     .await?;
/// ```
pub struct SubscriptionFactory<'a> {
    db: &'a DatabaseConnection,
    user_id: i32,
    plan_id: i32,
    server_id: Option<i32>,
    uuid: String,
    username: String,
    status: String,
    total_traffic: i64,
    used_traffic: i64,
    expire_at: Option<chrono::DateTime<Utc>>,
    max_devices: i32,
}

impl<'a> SubscriptionFactory<'a> {
    /// Creates a new SubscriptionFactory with default values.
    ///
    /// Defaults:
    /// - server_id: `None` (multi-server shape, no pinned server)
    /// - uuid: stable unique string per factory call
    /// - username: `"rb_test{id}"`
    /// - status: `"active"`
    /// - total_traffic: 50 GiB, used_traffic: 0
    /// - expire_at: 30 days from now
    /// - max_devices: `1`
    ///
    /// # Arguments
    /// - `db` - Database connection for inserting the entity
    /// - `user_id` - Owning user id
    /// - `plan_id` - Purchased plan id
    ///
    /// # Returns
    /// - `SubscriptionFactory` - New factory instance with defaults
    pub fn new(db: &'a DatabaseConnection, user_id: i32, plan_id: i32) -> Self {
        let id = next_id();
        Self {
            db,
            user_id,
            plan_id,
            server_id: None,
            uuid: format!("00000000-0000-4000-8000-{:012}", id),
            username: format!("rb_test{}", id),
            status: "active".to_string(),
            total_traffic: 50 * GIB,
            used_traffic: 0,
            expire_at: Some(Utc::now() + chrono::Duration::days(30)),
            max_devices: 1,
        }
    }

    /// Pins the subscription to a single server, or clears the pin.
    pub fn server_id(mut self, server_id: Option<i32>) -> Self {
        self.server_id = server_id;
        self
    }

    /// Sets the panel account uuid.
    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    /// Sets the panel account username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets the lifecycle status (`"active"`, `"disabled"`, `"expired"`, `"deleted"`).
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Sets the traffic allowance in bytes. Zero means unlimited.
    pub fn total_traffic(mut self, total_traffic: i64) -> Self {
        self.total_traffic = total_traffic;
        self
    }

    /// Sets the consumed traffic in bytes.
    pub fn used_traffic(mut self, used_traffic: i64) -> Self {
        self.used_traffic = used_traffic;
        self
    }

    /// Sets the expiry timestamp, or `None` for no time limit.
    pub fn expire_at(mut self, expire_at: Option<chrono::DateTime<Utc>>) -> Self {
        self.expire_at = expire_at;
        self
    }

    /// Sets the device cap.
    pub fn max_devices(mut self, max_devices: i32) -> Self {
        self.max_devices = max_devices;
        self
    }

    /// Builds and inserts the subscription entity into the database.
    ///
    /// # Returns
    /// - `Ok(entity::subscription::Model)` - Created subscription entity
    /// - `Err(DbErr)` - Database error during insert
    pub async fn build(self) -> Result<entity::subscription::Model, DbErr> {
        let now = Utc::now();
        entity::subscription::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(self.user_id),
            plan_id: ActiveValue::Set(self.plan_id),
            server_id: ActiveValue::Set(self.server_id),
            uuid: ActiveValue::Set(self.uuid),
            username: ActiveValue::Set(self.username),
            status: ActiveValue::Set(self.status),
            total_traffic: ActiveValue::Set(self.total_traffic),
            used_traffic: ActiveValue::Set(self.used_traffic),
            expire_at: ActiveValue::Set(self.expire_at),
            max_devices: ActiveValue::Set(self.max_devices),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
        .insert(self.db)
        .await
    }
}

/// Creates a subscription with default values for the given user and plan.
///
/// Shorthand for `SubscriptionFactory::new(db, user_id, plan_id).build().await`.
///
/// # Arguments
/// - `db` - Database connection
/// - `user_id` - Owning user id
/// - `plan_id` - Purchased plan id
///
/// # Returns
/// - `Ok(entity::subscription::Model)` - Created subscription entity
/// - `Err(DbErr)` - Database error during insert
pub async fn create_subscription(
    db: &DatabaseConnection,
    user_id: i32,
    plan_id: i32,
) -> Result<entity::subscription::Model, DbErr> {
    SubscriptionFactory::new(db, user_id, plan_id).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TestBuilder;
    use crate::factory::helpers::create_subscription_with_dependencies;
    use crate::factory::plan::create_plan;
    use crate::factory::user::create_user;

    #[tokio::test]
    async fn creates_subscription_with_defaults() -> Result<(), DbErr> {
        let test = TestBuilder::new()
            .with_provisioning_tables()
            .build()
            .await
            .unwrap();
        let db = test.db.as_ref().unwrap();

        let user = create_user(db).await?;
        let plan = create_plan(db).await?;
        let subscription = create_subscription(db, user.id, plan.id).await?;

        assert_eq!(subscription.user_id, user.id);
        assert_eq!(subscription.plan_id, plan.id);
        assert_eq!(subscription.server_id, None);
        assert!(subscription.is_active());
        assert!(subscription.is_multi_server());
        assert!(!subscription.is_exhausted());

        Ok(())
    }

    #[tokio::test]
    async fn creates_pinned_subscription_with_dependencies() -> Result<(), DbErr> {
        let test = TestBuilder::new()
            .with_provisioning_tables()
            .build()
            .await
            .unwrap();
        let db = test.db.as_ref().unwrap();

        let (user, plan, server, subscription) =
            create_subscription_with_dependencies(db).await?;

        assert_eq!(subscription.user_id, user.id);
        assert_eq!(subscription.plan_id, plan.id);
        assert_eq!(subscription.server_id, Some(server.id));
        assert!(!subscription.is_multi_server());

        Ok(())
    }

    #[tokio::test]
    async fn creates_multiple_unique_subscriptions() -> Result<(), DbErr> {
        let test = TestBuilder::new()
            .with_provisioning_tables()
            .build()
            .await
            .unwrap();
        let db = test.db.as_ref().unwrap();

        let user = create_user(db).await?;
        let plan = create_plan(db).await?;

        let sub1 = create_subscription(db, user.id, plan.id).await?;
        let sub2 = create_subscription(db, user.id, plan.id).await?;

        assert_ne!(sub1.uuid, sub2.uuid);
        assert_ne!(sub1.username, sub2.username);

        Ok(())
    }
}
