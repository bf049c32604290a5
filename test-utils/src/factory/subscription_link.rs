//! Subscription link factory for creating per-server connection link rows.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, DatabaseConnection, DbErr};

/// Creates a subscription link with a synthetic connection URI.
///
/// # Arguments
/// - `db` - Database connection
/// - `subscription_id` - Subscription the link belongs to
/// - `server_id` - Server the link points at
///
/// # Returns
/// - `Ok(entity::subscription_link::Model)` - Created link entity
/// - `Err(DbErr)` - Database error during insert
pub async fn create_link(
    db: &DatabaseConnection,
    subscription_id: i32,
    server_id: i32,
) -> Result<entity::subscription_link::Model, DbErr> {
    create_link_with_uri(
        db,
        subscription_id,
        server_id,
        format!("vless://test-{}-{}@example.com:443", subscription_id, server_id),
    )
    .await
}

/// Creates a subscription link with a specific connection URI.
pub async fn create_link_with_uri(
    db: &DatabaseConnection,
    subscription_id: i32,
    server_id: i32,
    uri: impl Into<String>,
) -> Result<entity::subscription_link::Model, DbErr> {
    entity::subscription_link::ActiveModel {
        id: ActiveValue::NotSet,
        subscription_id: ActiveValue::Set(subscription_id),
        server_id: ActiveValue::Set(server_id),
        uri: ActiveValue::Set(uri.into()),
        created_at: ActiveValue::Set(Utc::now()),
    }
    .insert(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TestBuilder;
    use crate::factory::helpers::create_multi_server_subscription;
    use crate::factory::server::create_server;

    #[tokio::test]
    async fn creates_links_for_each_server() -> Result<(), DbErr> {
        let test = TestBuilder::new()
            .with_provisioning_tables()
            .build()
            .await
            .unwrap();
        let db = test.db.as_ref().unwrap();

        let server_a = create_server(db).await?;
        let server_b = create_server(db).await?;

        let (_, _, subscription, links) =
            create_multi_server_subscription(db, &[server_a.id, server_b.id]).await?;

        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.subscription_id == subscription.id));
        assert_ne!(links[0].server_id, links[1].server_id);

        Ok(())
    }
}
