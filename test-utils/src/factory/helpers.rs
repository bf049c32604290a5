//! Shared helper utilities for factory methods.
//!
//! This module provides common utilities used across all factory modules,
//! including ID generation and convenience methods for creating entities
//! with their dependencies.

use sea_orm::{DatabaseConnection, DbErr};

/// Counter for generating unique IDs in tests.
///
/// This atomic counter ensures each factory-created entity gets a unique
/// identifier to prevent collisions in tests.
static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

/// Gets the next unique counter value for test data.
///
/// This function provides monotonically increasing values for use in
/// generating unique test identifiers across all factories.
///
/// # Returns
/// - `u64` - Next unique counter value
pub fn next_id() -> u64 {
    COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
}

/// Creates a complete subscription hierarchy with all dependencies.
///
/// This is a convenience method that creates:
/// 1. User (subscription owner)
/// 2. Plan
/// 3. Server (active, with free capacity)
/// 4. Subscription pinned to that server
///
/// All entities are created with default values. Use the individual
/// factories if you need to customize specific entities.
///
/// # Arguments
/// - `db` - Database connection
///
/// # Returns
/// - `Ok((user, plan, server, subscription))` - Tuple of all created entities
/// - `Err(DbErr)` - Database error during creation
pub async fn create_subscription_with_dependencies(
    db: &DatabaseConnection,
) -> Result<
    (
        entity::user::Model,
        entity::plan::Model,
        entity::server::Model,
        entity::subscription::Model,
    ),
    DbErr,
> {
    let user = crate::factory::user::create_user(db).await?;
    let plan = crate::factory::plan::create_plan(db).await?;
    let server = crate::factory::server::create_server(db).await?;
    let subscription = crate::factory::subscription::SubscriptionFactory::new(db, user.id, plan.id)
        .server_id(Some(server.id))
        .build()
        .await?;

    Ok((user, plan, server, subscription))
}

/// Creates a multi-server subscription spanning the given servers.
///
/// Creates a user, a plan, and a subscription with no pinned server, then one
/// link row per server. Useful for traffic-sync and fan-out tests.
///
/// # Arguments
/// - `db` - Database connection
/// - `server_ids` - Servers the subscription should span
///
/// # Returns
/// - `Ok((user, plan, subscription, links))` - Tuple of created entities
/// - `Err(DbErr)` - Database error during creation
pub async fn create_multi_server_subscription(
    db: &DatabaseConnection,
    server_ids: &[i32],
) -> Result<
    (
        entity::user::Model,
        entity::plan::Model,
        entity::subscription::Model,
        Vec<entity::subscription_link::Model>,
    ),
    DbErr,
> {
    let user = crate::factory::user::create_user(db).await?;
    let plan = crate::factory::plan::create_plan(db).await?;
    let subscription =
        crate::factory::subscription::create_subscription(db, user.id, plan.id).await?;

    let mut links = Vec::with_capacity(server_ids.len());
    for server_id in server_ids {
        links.push(
            crate::factory::subscription_link::create_link(db, subscription.id, *server_id).await?,
        );
    }

    Ok((user, plan, subscription, links))
}
