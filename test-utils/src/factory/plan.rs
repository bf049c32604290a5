//! Plan factory for creating test plan entities.
//!
//! This module provides factory methods for creating plan entities with
//! sensible defaults, reducing boilerplate in tests.

use crate::factory::helpers::next_id;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

const GIB: i64 = 1024 * 1024 * 1024;

/// Factory for creating test plans with customizable fields.
///
/// # Example
///
/// ```rust,ignore
/// use test_utils::factory::plan::PlanFactory;
///
/// let plan = PlanFactory::new(&db)
///     .duration_days(90)
///     .traffic_bytes(100 * 1024 * 1024 * 1024)
///     .max_devices(3)
///     .build()
///     .await?;
/// ```
pub struct PlanFactory<'a> {
    db: &'a DatabaseConnection,
    name: String,
    price: i64,
    duration_days: i32,
    traffic_bytes: i64,
    max_devices: i32,
    description: Option<String>,
    is_active: bool,
}

impl<'a> PlanFactory<'a> {
    /// Creates a new PlanFactory with default values.
    ///
    /// Defaults:
    /// - name: `"Plan {id}"` where id is auto-incremented
    /// - price: `10000` (smallest currency unit)
    /// - duration_days: `30`
    /// - traffic_bytes: 50 GiB
    /// - max_devices: `1`
    /// - is_active: `true`
    ///
    /// # Arguments
    /// - `db` - Database connection for inserting the entity
    ///
    /// # Returns
    /// - `PlanFactory` - New factory instance with defaults
    pub fn new(db: &'a DatabaseConnection) -> Self {
        let id = next_id();
        Self {
            db,
            name: format!("Plan {}", id),
            price: 10000,
            duration_days: 30,
            traffic_bytes: 50 * GIB,
            max_devices: 1,
            description: Some("Test plan".to_string()),
            is_active: true,
        }
    }

    /// Sets the plan name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the plan price in the smallest currency unit.
    pub fn price(mut self, price: i64) -> Self {
        self.price = price;
        self
    }

    /// Sets the plan duration in days. Zero means no time limit.
    pub fn duration_days(mut self, duration_days: i32) -> Self {
        self.duration_days = duration_days;
        self
    }

    /// Sets the traffic allowance in bytes. Zero means unlimited.
    pub fn traffic_bytes(mut self, traffic_bytes: i64) -> Self {
        self.traffic_bytes = traffic_bytes;
        self
    }

    /// Sets the device cap.
    pub fn max_devices(mut self, max_devices: i32) -> Self {
        self.max_devices = max_devices;
        self
    }

    /// Sets whether the plan is purchasable.
    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Builds and inserts the plan entity into the database.
    ///
    /// # Returns
    /// - `Ok(entity::plan::Model)` - Created plan entity
    /// - `Err(DbErr)` - Database error during insert
    pub async fn build(self) -> Result<entity::plan::Model, DbErr> {
        entity::plan::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(self.name),
            price: ActiveValue::Set(self.price),
            duration_days: ActiveValue::Set(self.duration_days),
            traffic_bytes: ActiveValue::Set(self.traffic_bytes),
            max_devices: ActiveValue::Set(self.max_devices),
            description: ActiveValue::Set(self.description),
            is_active: ActiveValue::Set(self.is_active),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(self.db)
        .await
    }
}

/// Creates a plan with default values.
///
/// Shorthand for `PlanFactory::new(db).build().await`.
///
/// # Arguments
/// - `db` - Database connection
///
/// # Returns
/// - `Ok(entity::plan::Model)` - Created plan entity
/// - `Err(DbErr)` - Database error during insert
pub async fn create_plan(db: &DatabaseConnection) -> Result<entity::plan::Model, DbErr> {
    PlanFactory::new(db).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TestBuilder;
    use entity::prelude::*;

    #[tokio::test]
    async fn creates_plan_with_defaults() -> Result<(), DbErr> {
        let test = TestBuilder::new().with_table(Plan).build().await.unwrap();
        let db = test.db.as_ref().unwrap();

        let plan = create_plan(db).await?;

        assert_eq!(plan.duration_days, 30);
        assert_eq!(plan.traffic_bytes, 50 * GIB);
        assert!(plan.is_active);
        assert!(!plan.is_unlimited_traffic());

        Ok(())
    }

    #[tokio::test]
    async fn unlimited_plan_has_zero_traffic() -> Result<(), DbErr> {
        let test = TestBuilder::new().with_table(Plan).build().await.unwrap();
        let db = test.db.as_ref().unwrap();

        let plan = PlanFactory::new(db).traffic_bytes(0).build().await?;

        assert!(plan.is_unlimited_traffic());

        Ok(())
    }
}
