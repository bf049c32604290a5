use sea_orm::DbErr;
use serde_json::json;
use std::time::Duration;
use test_utils::builder::TestBuilder;
use test_utils::factory::aeza_order::AezaOrderFactory;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::data::aeza_order::AezaOrderRepository;
use crate::error::AppError;
use crate::notify::Notifier;
use crate::service::aeza::{AezaClient, AezaPoller};

fn client(base_url: String) -> AezaClient {
    AezaClient::new(reqwest::Client::new(), base_url, "test-api-key".to_string())
}

fn poller(db: &sea_orm::DatabaseConnection, base_url: String, notifier: Notifier) -> AezaPoller {
    AezaPoller::with_schedule(
        db.clone(),
        client(base_url),
        notifier,
        Duration::from_millis(5),
        3,
    )
}

#[tokio::test]
async fn requests_carry_the_api_key_header() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/os"))
        .and(header("X-API-Key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "response": { "items": [] }
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let result = client(mock.uri()).list_os().await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn a_business_error_envelope_fails_despite_http_200() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": true,
            "message": "insufficient funds",
        })))
        .mount(&mock)
        .await;

    let err = client(mock.uri()).get_order("o-1").await.unwrap_err();

    assert!(matches!(err, AppError::InternalError(_)));
    assert!(err.to_string().contains("insufficient funds"));
}

/// An order that already left the pending state is never polled again.
#[tokio::test]
async fn non_pending_orders_stop_the_poll_before_any_request() -> Result<(), DbErr> {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "response": { "items": [{ "status": "pending" }] }
        })))
        .expect(0)
        .mount(&mock)
        .await;

    let test = TestBuilder::new().with_vps_tables().build().await.unwrap();
    let db = test.db.as_ref().unwrap();

    let order = AezaOrderFactory::new(db)
        .status("ready")
        .ip_address(Some("203.0.113.7".to_string()))
        .build()
        .await?;

    let (notifier, _rx) = Notifier::new_pair();
    poller(db, mock.uri(), notifier)
        .poll_order(&order.order_id)
        .await
        .unwrap();

    Ok(())
}

#[tokio::test]
async fn delivered_orders_are_marked_ready_with_instance_details() -> Result<(), DbErr> {
    let mock = MockServer::start().await;

    let test = TestBuilder::new().with_vps_tables().build().await.unwrap();
    let db = test.db.as_ref().unwrap();

    let order = AezaOrderFactory::new(db)
        .meta(Some(json!({ "chat_id": 42 })))
        .build()
        .await?;

    // The order names the instance; the address and credentials only show up
    // on the instance detail.
    Mock::given(method("GET"))
        .and(path(format!("/services/orders/{}", order.order_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "response": {
                "items": [{
                    "status": "active",
                    "servers": [{ "id": 9001 }],
                }]
            }
        })))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/services/9001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "response": {
                "ip": "198.51.100.4",
                "parameters": { "password": "one-time-secret" },
            }
        })))
        .mount(&mock)
        .await;

    let (notifier, mut rx) = Notifier::new_pair();
    poller(db, mock.uri(), notifier)
        .poll_order(&order.order_id)
        .await
        .unwrap();

    let reloaded = AezaOrderRepository::new(db)
        .get_by_order_id(&order.order_id)
        .await?
        .unwrap();
    assert!(reloaded.is_ready());
    assert_eq!(reloaded.aeza_server_id.as_deref(), Some("9001"));
    assert_eq!(reloaded.ip_address.as_deref(), Some("198.51.100.4"));
    assert_eq!(reloaded.root_password.as_deref(), Some("one-time-secret"));

    let message = rx.try_recv().expect("delivery notification expected");
    assert_eq!(message.chat_id, 42);
    assert!(message.text.contains("ready"));

    Ok(())
}

/// An active order whose instance has not yet been assigned an address must
/// not be marked ready; the poll keeps waiting until the cap runs out.
#[tokio::test]
async fn active_orders_without_an_address_are_not_marked_ready() -> Result<(), DbErr> {
    let mock = MockServer::start().await;

    let test = TestBuilder::new().with_vps_tables().build().await.unwrap();
    let db = test.db.as_ref().unwrap();

    let order = AezaOrderFactory::new(db).build().await?;

    Mock::given(method("GET"))
        .and(path(format!("/services/orders/{}", order.order_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "response": { "status": "active", "id": 9001 }
        })))
        .mount(&mock)
        .await;
    // The instance exists but has no address yet.
    Mock::given(method("GET"))
        .and(path("/services/9001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "response": { "status": "installing" }
        })))
        .expect(3)
        .mount(&mock)
        .await;

    let (notifier, _rx) = Notifier::new_pair();
    poller(db, mock.uri(), notifier)
        .poll_order(&order.order_id)
        .await
        .unwrap();

    let reloaded = AezaOrderRepository::new(db)
        .get_by_order_id(&order.order_id)
        .await?
        .unwrap();
    assert!(!reloaded.is_ready());
    assert!(reloaded.ip_address.is_none());
    assert!(reloaded.root_password.is_none());
    assert!(reloaded.is_failed());
    assert_eq!(reloaded.error_message.as_deref(), Some("Delivery timed out"));

    Ok(())
}

#[tokio::test]
async fn failed_orders_record_the_provider_message() -> Result<(), DbErr> {
    let mock = MockServer::start().await;

    let test = TestBuilder::new().with_vps_tables().build().await.unwrap();
    let db = test.db.as_ref().unwrap();

    let order = AezaOrderFactory::new(db).build().await?;

    Mock::given(method("GET"))
        .and(path(format!("/services/orders/{}", order.order_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "response": {
                "items": [{ "status": "failed", "statusMessage": "out of stock" }]
            }
        })))
        .mount(&mock)
        .await;

    let (notifier, _rx) = Notifier::new_pair();
    poller(db, mock.uri(), notifier)
        .poll_order(&order.order_id)
        .await
        .unwrap();

    let reloaded = AezaOrderRepository::new(db)
        .get_by_order_id(&order.order_id)
        .await?
        .unwrap();
    assert!(reloaded.is_failed());
    assert_eq!(reloaded.error_message.as_deref(), Some("out of stock"));

    Ok(())
}

#[tokio::test]
async fn orders_that_never_deliver_time_out_as_failed() -> Result<(), DbErr> {
    let mock = MockServer::start().await;

    let test = TestBuilder::new().with_vps_tables().build().await.unwrap();
    let db = test.db.as_ref().unwrap();

    let order = AezaOrderFactory::new(db).build().await?;

    Mock::given(method("GET"))
        .and(path(format!("/services/orders/{}", order.order_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "response": { "items": [{ "status": "processing" }] }
        })))
        .mount(&mock)
        .await;

    let (notifier, _rx) = Notifier::new_pair();
    poller(db, mock.uri(), notifier)
        .poll_order(&order.order_id)
        .await
        .unwrap();

    let reloaded = AezaOrderRepository::new(db)
        .get_by_order_id(&order.order_id)
        .await?
        .unwrap();
    assert!(reloaded.is_failed());
    assert_eq!(reloaded.error_message.as_deref(), Some("Delivery timed out"));

    Ok(())
}
