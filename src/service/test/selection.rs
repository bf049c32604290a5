use sea_orm::DbErr;
use test_utils::builder::TestBuilder;
use test_utils::factory::server::ServerFactory;

use crate::error::AppError;
use crate::service::selection::ServerSelectionService;

#[tokio::test]
async fn selection_prefers_the_least_loaded_match() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    ServerFactory::new(db)
        .name("crowded")
        .location_tag("de")
        .active_users_count(60)
        .build()
        .await?;
    let quiet = ServerFactory::new(db)
        .name("quiet")
        .location_tag("de")
        .active_users_count(3)
        .build()
        .await?;

    let service = ServerSelectionService::new(db.clone());
    let picked = service.select_best_server(Some("de"), None).await.unwrap();

    assert_eq!(picked.id, quiet.id);

    Ok(())
}

#[tokio::test]
async fn an_empty_pool_is_a_not_found_error() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    ServerFactory::new(db)
        .location_tag("de")
        .capacity(1)
        .active_users_count(1)
        .build()
        .await?;

    let service = ServerSelectionService::new(db.clone());
    let err = service.select_best_server(Some("de"), None).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}

#[tokio::test]
async fn locations_reflect_current_headroom() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();

    ServerFactory::new(db).location_tag("nl").build().await?;
    ServerFactory::new(db)
        .location_tag("us")
        .capacity(2)
        .active_users_count(2)
        .build()
        .await?;

    let service = ServerSelectionService::new(db.clone());
    let locations = service.available_locations().await.unwrap();

    assert_eq!(locations, vec!["nl".to_string()]);

    Ok(())
}
