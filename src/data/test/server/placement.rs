use sea_orm::DbErr;
use test_utils::builder::TestBuilder;
use test_utils::factory::server::ServerFactory;

use crate::data::server::{CreateServerParams, ServerRepository, UpdateServerParams};
use crate::error::AppError;

fn params(region: &str, category: &str) -> CreateServerParams {
    CreateServerParams {
        name: format!("{} {}", region, category),
        flag_emoji: None,
        ip_address: "192.0.2.10".to_string(),
        api_domain: "panel.example.com".to_string(),
        admin_user: Some("admin".to_string()),
        admin_pass: Some("secret".to_string()),
        api_key: None,
        panel_kind: "marzban".to_string(),
        capacity: 100,
        location_tag: "de".to_string(),
        region: region.to_string(),
        server_category: category.to_string(),
        is_active: true,
        is_central: false,
    }
}

#[tokio::test]
async fn entry_servers_must_sit_in_the_restricted_region() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    assert!(repo.create(params("iran", "tunnel_entry")).await.is_ok());

    let err = repo
        .create(params("foreign", "tunnel_entry"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn exit_and_direct_servers_must_sit_outside_it() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    assert!(repo.create(params("foreign", "tunnel_exit")).await.is_ok());
    assert!(repo.create(params("foreign", "direct")).await.is_ok());

    assert!(matches!(
        repo.create(params("iran", "tunnel_exit")).await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        repo.create(params("iran", "direct")).await,
        Err(AppError::BadRequest(_))
    ));

    Ok(())
}

#[tokio::test]
async fn unknown_category_is_rejected() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    assert!(matches!(
        repo.create(params("foreign", "relay")).await,
        Err(AppError::BadRequest(_))
    ));

    Ok(())
}

#[tokio::test]
async fn promoting_a_central_server_demotes_the_previous_one() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    let first = ServerFactory::new(db).central(true).build().await?;
    let second = ServerFactory::new(db).build().await?;

    repo.update(
        second.id,
        UpdateServerParams {
            is_central: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(!repo.get_by_id(first.id).await?.unwrap().is_central);
    assert!(repo.get_by_id(second.id).await?.unwrap().is_central);

    Ok(())
}

#[tokio::test]
async fn create_with_central_flag_clears_existing_central() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    let existing = ServerFactory::new(db).central(true).build().await?;

    let mut new_params = params("foreign", "direct");
    new_params.is_central = true;
    let created = repo.create(new_params).await.unwrap();

    assert!(created.is_central);
    assert!(!repo.get_by_id(existing.id).await?.unwrap().is_central);

    Ok(())
}

#[tokio::test]
async fn update_revalidates_the_resulting_placement() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    // Defaults are foreign/direct; moving region alone would strand the category.
    let server = ServerFactory::new(db).build().await?;

    let err = repo
        .update(
            server.id,
            UpdateServerParams {
                region: Some("iran".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}
