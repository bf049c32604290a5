use sea_orm::DbErr;
use test_utils::builder::TestBuilder;
use test_utils::factory::create_server;
use test_utils::factory::helpers::{
    create_multi_server_subscription, create_subscription_with_dependencies,
};

use crate::data::subscription::SubscriptionRepository;

#[tokio::test]
async fn pinned_subscriptions_resolve_to_their_single_server() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = SubscriptionRepository::new(db);

    let (_, _, server, subscription) = create_subscription_with_dependencies(db).await?;

    let members = repo.member_servers(&subscription).await?;

    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, server.id);

    Ok(())
}

#[tokio::test]
async fn multi_server_subscriptions_resolve_through_links() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = SubscriptionRepository::new(db);

    let a = create_server(db).await?;
    let b = create_server(db).await?;
    let (_, _, subscription, links) = create_multi_server_subscription(db, &[a.id, b.id]).await?;

    assert_eq!(links.len(), 2);

    let mut member_ids: Vec<i32> = repo
        .member_servers(&subscription)
        .await?
        .iter()
        .map(|s| s.id)
        .collect();
    member_ids.sort();

    let mut expected = vec![a.id, b.id];
    expected.sort();
    assert_eq!(member_ids, expected);

    Ok(())
}

#[tokio::test]
async fn replace_links_swaps_the_whole_set() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = SubscriptionRepository::new(db);

    let old = create_server(db).await?;
    let new = create_server(db).await?;
    let (_, _, subscription, _) = create_multi_server_subscription(db, &[old.id]).await?;

    repo.replace_links(
        subscription.id,
        vec![(new.id, "vless://replacement".to_string())],
    )
    .await?;

    let links = repo.links(subscription.id).await?;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].server_id, new.id);
    assert_eq!(links[0].uri, "vless://replacement");

    Ok(())
}

#[tokio::test]
async fn deleting_a_subscription_removes_its_links() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = SubscriptionRepository::new(db);

    let server = create_server(db).await?;
    let (_, _, subscription, _) = create_multi_server_subscription(db, &[server.id]).await?;

    repo.delete(subscription.id).await?;

    assert!(repo.get_by_id(subscription.id).await?.is_none());
    assert!(repo.links(subscription.id).await?.is_empty());

    Ok(())
}
