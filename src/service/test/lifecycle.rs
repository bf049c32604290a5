use chrono::{Duration, Utc};
use sea_orm::DbErr;
use serde_json::json;
use test_utils::builder::TestBuilder;
use test_utils::factory::server::ServerFactory;
use test_utils::factory::subscription::SubscriptionFactory;
use test_utils::factory::{create_plan, create_user};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::registry;
use crate::data::server::ServerRepository;
use crate::data::subscription::SubscriptionRepository;
use crate::notify::Notifier;
use crate::service::lifecycle::{LifecycleService, WarningMarkers};

const GIB: i64 = 1024 * 1024 * 1024;

fn lifecycle(
    db: &sea_orm::DatabaseConnection,
    notifier: Notifier,
    markers: WarningMarkers,
) -> LifecycleService {
    LifecycleService::new(db.clone(), registry(), notifier, markers)
}

#[test]
fn markers_suppress_repeats_until_the_ttl_passes() {
    let markers = WarningMarkers::new();

    assert!(markers.set_if_absent("k", std::time::Duration::from_secs(3600)));
    assert!(!markers.set_if_absent("k", std::time::Duration::from_secs(3600)));

    // A zero TTL expires immediately, so the key can be claimed again.
    assert!(markers.set_if_absent("z", std::time::Duration::ZERO));
    assert!(markers.set_if_absent("z", std::time::Duration::ZERO));
}

#[test]
fn clearing_a_subscription_only_touches_its_own_markers() {
    let markers = WarningMarkers::new();
    let ttl = std::time::Duration::from_secs(3600);

    markers.set_if_absent("traffic_warning_7", ttl);
    markers.set_if_absent("expiry_warning_7_2", ttl);
    markers.set_if_absent("traffic_warning_70", ttl);

    markers.clear_subscription(7);

    assert!(markers.set_if_absent("traffic_warning_7", ttl));
    assert!(markers.set_if_absent("expiry_warning_7_2", ttl));
    assert!(!markers.set_if_absent("traffic_warning_70", ttl));
}

#[tokio::test]
async fn low_traffic_warning_is_sent_exactly_once() -> Result<(), DbErr> {
    let mock = MockServer::start().await;

    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;
    let server = ServerFactory::new(db)
        .panel_kind("hiddify")
        .api_key(Some("k".to_string()))
        .api_domain(mock.uri())
        .build()
        .await?;
    let subscription = SubscriptionFactory::new(db, user.id, plan.id)
        .server_id(Some(server.id))
        .total_traffic(50 * GIB)
        .build()
        .await?;

    // 45 of 50 GiB used: 10% left, below the warning line.
    Mock::given(method("GET"))
        .and(path(format!("/api/v2/admin/user/{}/", subscription.uuid)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": subscription.uuid,
            "enable": true,
            "is_active": true,
            "current_usage_GB": 45.0,
            "usage_limit_GB": 50.0,
            "package_days": 30,
        })))
        .mount(&mock)
        .await;

    let (notifier, mut rx) = Notifier::new_pair();
    let service = lifecycle(db, notifier, WarningMarkers::new());

    service.monitor_usage().await.unwrap();
    service.monitor_usage().await.unwrap();

    let warning = rx.try_recv().expect("one warning expected");
    assert_eq!(warning.chat_id, user.chat_id.unwrap());
    assert!(warning.text.contains(&subscription.username));
    assert!(rx.try_recv().is_err());

    // The observed usage was written back.
    let reloaded = SubscriptionRepository::new(db)
        .get_by_id(subscription.id)
        .await?
        .unwrap();
    assert_eq!(reloaded.used_traffic, 45 * GIB);

    Ok(())
}

#[tokio::test]
async fn expiry_warning_fires_per_remaining_day() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;
    let server = ServerFactory::new(db)
        .panel_kind("hiddify")
        .api_key(Some("k".to_string()))
        .api_domain("http://127.0.0.1:1")
        .build()
        .await?;
    // Expires in two days; the unreachable panel only suppresses the usage
    // refresh, not the warning.
    SubscriptionFactory::new(db, user.id, plan.id)
        .server_id(Some(server.id))
        .expire_at(Some(Utc::now() + Duration::days(2)))
        .build()
        .await?;

    let (notifier, mut rx) = Notifier::new_pair();
    let service = lifecycle(db, notifier, WarningMarkers::new());

    service.monitor_usage().await.unwrap();
    service.monitor_usage().await.unwrap();

    let warning = rx.try_recv().expect("one warning expected");
    assert!(warning.text.contains("expires"));
    assert!(rx.try_recv().is_err());

    Ok(())
}

/// Multi-server subscriptions belong to the traffic-sync job; the usage
/// monitor must not touch their panels.
#[tokio::test]
async fn usage_monitoring_leaves_multi_server_subscriptions_to_the_sync_job() -> Result<(), DbErr> {
    let mock = MockServer::start().await;

    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;
    let server = ServerFactory::new(db)
        .panel_kind("hiddify")
        .api_key(Some("k".to_string()))
        .api_domain(mock.uri())
        .build()
        .await?;
    let subscription = SubscriptionFactory::new(db, user.id, plan.id)
        .total_traffic(50 * GIB)
        .build()
        .await?;
    SubscriptionRepository::new(db)
        .add_link(subscription.id, server.id, "uri".to_string())
        .await?;

    Mock::given(method("GET"))
        .and(path(format!("/api/v2/admin/user/{}/", subscription.uuid)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": subscription.uuid,
            "enable": true,
            "current_usage_GB": 49.0,
            "usage_limit_GB": 50.0,
        })))
        .expect(0)
        .mount(&mock)
        .await;

    let (notifier, mut rx) = Notifier::new_pair();
    let service = lifecycle(db, notifier, WarningMarkers::new());
    service.monitor_usage().await.unwrap();

    assert!(rx.try_recv().is_err());
    let reloaded = SubscriptionRepository::new(db)
        .get_by_id(subscription.id)
        .await?
        .unwrap();
    assert_eq!(reloaded.used_traffic, 0);

    Ok(())
}

#[tokio::test]
async fn traffic_sync_pushes_the_maximum_to_lagging_members() -> Result<(), DbErr> {
    let ahead = MockServer::start().await;
    let behind = MockServer::start().await;

    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;
    let server_ahead = ServerFactory::new(db)
        .panel_kind("hiddify")
        .api_key(Some("k".to_string()))
        .api_domain(ahead.uri())
        .build()
        .await?;
    let server_behind = ServerFactory::new(db)
        .panel_kind("hiddify")
        .api_key(Some("k".to_string()))
        .api_domain(behind.uri())
        .build()
        .await?;
    let subscription = SubscriptionFactory::new(db, user.id, plan.id)
        .total_traffic(50 * GIB)
        .build()
        .await?;
    let repo = SubscriptionRepository::new(db);
    repo.add_link(subscription.id, server_ahead.id, "a".to_string()).await?;
    repo.add_link(subscription.id, server_behind.id, "b".to_string()).await?;

    let stats = |gb: f64| {
        json!({
            "uuid": subscription.uuid,
            "enable": true,
            "is_active": true,
            "current_usage_GB": gb,
            "usage_limit_GB": 50.0,
            "package_days": 30,
        })
    };

    Mock::given(method("GET"))
        .and(path(format!("/api/v2/admin/user/{}/", subscription.uuid)))
        .respond_with(ResponseTemplate::new(200).set_body_json(stats(10.0)))
        .mount(&ahead)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v2/admin/user/{}/", subscription.uuid)))
        .respond_with(ResponseTemplate::new(200).set_body_json(stats(2.0)))
        .mount(&behind)
        .await;

    // Only the lagging member gets the maximum written down.
    Mock::given(method("PATCH"))
        .and(path(format!("/api/v2/admin/user/{}/", subscription.uuid)))
        .and(body_partial_json(json!({ "current_usage_GB": 10.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uuid": subscription.uuid })))
        .expect(1)
        .mount(&behind)
        .await;

    let (notifier, _rx) = Notifier::new_pair();
    let service = lifecycle(db, notifier, WarningMarkers::new());
    service.sync_multi_server_traffic().await.unwrap();

    let reloaded = repo.get_by_id(subscription.id).await?.unwrap();
    assert_eq!(reloaded.used_traffic, 10 * GIB);

    Ok(())
}

#[tokio::test]
async fn overdue_subscriptions_are_disabled_and_marked_expired() -> Result<(), DbErr> {
    let mock = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uuid": "x" })))
        .expect(1)
        .mount(&mock)
        .await;

    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;
    let server = ServerFactory::new(db)
        .panel_kind("hiddify")
        .api_key(Some("k".to_string()))
        .api_domain(mock.uri())
        .build()
        .await?;
    let subscription = SubscriptionFactory::new(db, user.id, plan.id)
        .server_id(Some(server.id))
        .expire_at(Some(Utc::now() - Duration::hours(1)))
        .build()
        .await?;

    let (notifier, mut rx) = Notifier::new_pair();
    let service = lifecycle(db, notifier, WarningMarkers::new());
    service.expire_overdue().await.unwrap();

    let reloaded = SubscriptionRepository::new(db)
        .get_by_id(subscription.id)
        .await?
        .unwrap();
    assert_eq!(reloaded.status, "expired");

    let message = rx.try_recv().expect("expiry notification expected");
    assert!(message.text.contains("expired"));
    assert!(message.text.contains("time"));

    Ok(())
}

#[tokio::test]
async fn exhausted_subscriptions_expire_with_a_traffic_reason() -> Result<(), DbErr> {
    let mock = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uuid": "x" })))
        .mount(&mock)
        .await;

    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let user = create_user(db).await?;
    let plan = create_plan(db).await?;
    let server = ServerFactory::new(db)
        .panel_kind("hiddify")
        .api_key(Some("k".to_string()))
        .api_domain(mock.uri())
        .build()
        .await?;
    SubscriptionFactory::new(db, user.id, plan.id)
        .server_id(Some(server.id))
        .total_traffic(10 * GIB)
        .used_traffic(10 * GIB)
        .build()
        .await?;

    let (notifier, mut rx) = Notifier::new_pair();
    let service = lifecycle(db, notifier, WarningMarkers::new());
    service.expire_overdue().await.unwrap();

    let message = rx.try_recv().expect("expiry notification expected");
    assert!(message.text.contains("traffic"));

    Ok(())
}

#[tokio::test]
async fn user_counts_are_overwritten_from_panel_truth() -> Result<(), DbErr> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/admin/server_status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stats": {
                "system": { "cpu_percent": 10.0, "ram_percent": 40.0 },
                "usage": { "active": 37, "total": 80, "online": 12 },
            }
        })))
        .mount(&mock)
        .await;

    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    let reachable = ServerFactory::new(db)
        .panel_kind("hiddify")
        .api_key(Some("k".to_string()))
        .api_domain(mock.uri())
        .active_users_count(5)
        .build()
        .await?;
    let unreachable = ServerFactory::new(db)
        .panel_kind("hiddify")
        .api_key(Some("k".to_string()))
        .api_domain("http://127.0.0.1:1")
        .active_users_count(9)
        .build()
        .await?;

    let (notifier, _rx) = Notifier::new_pair();
    let service = lifecycle(db, notifier, WarningMarkers::new());
    service.sync_user_counts().await.unwrap();

    let server_repo = ServerRepository::new(db);
    assert_eq!(
        server_repo.get_by_id(reachable.id).await?.unwrap().active_users_count,
        37
    );
    // Unreachable servers keep their last known value.
    assert_eq!(
        server_repo.get_by_id(unreachable.id).await?.unwrap().active_users_count,
        9
    );

    Ok(())
}
