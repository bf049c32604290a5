use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter};
use test_utils::builder::TestBuilder;
use test_utils::factory::subscription::SubscriptionFactory;
use test_utils::factory::{create_plan, create_user};

use crate::data::subscription::SubscriptionRepository;

const GIB: i64 = 1024 * 1024 * 1024;

#[tokio::test]
async fn overdue_and_exhausted_subscriptions_are_flagged() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = SubscriptionRepository::new(db);

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;

    let overdue = SubscriptionFactory::new(db, user.id, plan.id)
        .expire_at(Some(Utc::now() - Duration::hours(1)))
        .build()
        .await?;
    let exhausted = SubscriptionFactory::new(db, user.id, plan.id)
        .total_traffic(10 * GIB)
        .used_traffic(10 * GIB)
        .build()
        .await?;
    let healthy = SubscriptionFactory::new(db, user.id, plan.id)
        .used_traffic(GIB)
        .build()
        .await?;

    let candidates = repo.expiration_candidates(Utc::now()).await?;
    let ids: Vec<i32> = candidates.iter().map(|s| s.id).collect();

    assert!(ids.contains(&overdue.id));
    assert!(ids.contains(&exhausted.id));
    assert!(!ids.contains(&healthy.id));

    Ok(())
}

#[tokio::test]
async fn unlimited_traffic_never_counts_as_exhausted() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = SubscriptionRepository::new(db);

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;

    // Zero allowance means unlimited, however much has been used.
    SubscriptionFactory::new(db, user.id, plan.id)
        .total_traffic(0)
        .used_traffic(500 * GIB)
        .expire_at(Some(Utc::now() + Duration::days(10)))
        .build()
        .await?;

    assert!(repo.expiration_candidates(Utc::now()).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn already_expired_subscriptions_are_not_flagged_again() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = SubscriptionRepository::new(db);

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;

    SubscriptionFactory::new(db, user.id, plan.id)
        .status("expired")
        .expire_at(Some(Utc::now() - Duration::days(2)))
        .build()
        .await?;

    assert!(repo.expiration_candidates(Utc::now()).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn cleanup_targets_subscriptions_expired_for_a_month() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = SubscriptionRepository::new(db);

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;

    let stale = SubscriptionFactory::new(db, user.id, plan.id)
        .status("expired")
        .build()
        .await?;
    let fresh = SubscriptionFactory::new(db, user.id, plan.id)
        .status("expired")
        .build()
        .await?;

    // Backdate one of them past the retention window.
    entity::prelude::Subscription::update_many()
        .col_expr(
            entity::subscription::Column::UpdatedAt,
            Expr::value(Utc::now() - Duration::days(31)),
        )
        .filter(entity::subscription::Column::Id.eq(stale.id))
        .exec(db)
        .await?;

    let candidates = repo.cleanup_candidates(Utc::now()).await?;
    let ids: Vec<i32> = candidates.iter().map(|s| s.id).collect();

    assert_eq!(ids, vec![stale.id]);
    assert!(!ids.contains(&fresh.id));

    Ok(())
}

#[tokio::test]
async fn status_updates_move_the_updated_at_stamp() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = SubscriptionRepository::new(db);

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;
    let subscription = SubscriptionFactory::new(db, user.id, plan.id).build().await?;

    repo.update_status(subscription.id, "disabled").await?;

    let reloaded = repo.get_by_id(subscription.id).await?.unwrap();
    assert_eq!(reloaded.status, "disabled");
    assert!(reloaded.updated_at >= subscription.updated_at);

    Ok(())
}
