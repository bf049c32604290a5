use sea_orm::DbErr;
use test_utils::builder::TestBuilder;
use test_utils::factory::server::ServerFactory;

use crate::data::server::ServerRepository;

#[tokio::test]
async fn least_loaded_prefers_the_emptiest_server() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    ServerFactory::new(db)
        .name("busy")
        .location_tag("de")
        .active_users_count(80)
        .build()
        .await?;
    ServerFactory::new(db)
        .name("quiet")
        .location_tag("de")
        .active_users_count(5)
        .build()
        .await?;
    ServerFactory::new(db)
        .name("middling")
        .location_tag("de")
        .active_users_count(40)
        .build()
        .await?;

    let picked = repo.least_loaded(Some("de"), None).await?.unwrap();

    assert_eq!(picked.name, "quiet");

    let ordered = repo.available_servers(Some("de"), None).await?;
    let names: Vec<&str> = ordered.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["quiet", "middling", "busy"]);

    Ok(())
}

#[tokio::test]
async fn full_and_inactive_servers_are_never_offered() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    ServerFactory::new(db)
        .name("full")
        .location_tag("nl")
        .capacity(10)
        .active_users_count(10)
        .build()
        .await?;
    ServerFactory::new(db)
        .name("dark")
        .location_tag("nl")
        .active(false)
        .build()
        .await?;
    ServerFactory::new(db)
        .name("open")
        .location_tag("nl")
        .capacity(10)
        .active_users_count(9)
        .build()
        .await?;

    let available = repo.available_servers(Some("nl"), None).await?;

    assert_eq!(available.len(), 1);
    assert_eq!(available[0].name, "open");

    Ok(())
}

#[tokio::test]
async fn selection_is_none_when_a_location_is_saturated() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    ServerFactory::new(db)
        .location_tag("fr")
        .capacity(1)
        .active_users_count(1)
        .build()
        .await?;

    assert!(repo.least_loaded(Some("fr"), None).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn category_filter_narrows_the_pool() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    ServerFactory::new(db)
        .name("exit")
        .location_tag("us")
        .category("tunnel_exit")
        .build()
        .await?;
    ServerFactory::new(db)
        .name("plain")
        .location_tag("us")
        .category("direct")
        .build()
        .await?;

    let exits = repo.available_servers(Some("us"), Some("tunnel_exit")).await?;

    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].name, "exit");

    Ok(())
}

#[tokio::test]
async fn locations_list_only_places_with_headroom() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    ServerFactory::new(db).location_tag("se").build().await?;
    ServerFactory::new(db).location_tag("se").build().await?;
    ServerFactory::new(db)
        .location_tag("jp")
        .capacity(1)
        .active_users_count(1)
        .build()
        .await?;

    let locations = repo.available_locations().await?;

    assert_eq!(locations, vec!["se".to_string()]);

    Ok(())
}

#[tokio::test]
async fn counters_move_up_and_down_but_never_below_zero() -> Result<(), DbErr> {
    let test = TestBuilder::new()
        .with_provisioning_tables()
        .build()
        .await
        .unwrap();
    let db = test.db.as_ref().unwrap();
    let repo = ServerRepository::new(db);

    let server = ServerFactory::new(db).build().await?;

    repo.increment_active_users(server.id).await?;
    repo.increment_active_users(server.id).await?;
    assert_eq!(repo.get_by_id(server.id).await?.unwrap().active_users_count, 2);

    repo.decrement_active_users(server.id).await?;
    repo.decrement_active_users(server.id).await?;
    repo.decrement_active_users(server.id).await?;
    assert_eq!(repo.get_by_id(server.id).await?.unwrap().active_users_count, 0);

    repo.set_active_users(server.id, 17).await?;
    assert_eq!(repo.get_by_id(server.id).await?.unwrap().active_users_count, 17);

    Ok(())
}
