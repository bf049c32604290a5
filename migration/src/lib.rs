pub use sea_orm_migration::prelude::*;

mod m20260810_000001_create_user_table;
mod m20260810_000002_create_server_table;
mod m20260810_000003_create_plan_table;
mod m20260810_000004_create_subscription_table;
mod m20260810_000005_create_subscription_link_table;
mod m20260810_000006_create_aeza_order_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260810_000001_create_user_table::Migration),
            Box::new(m20260810_000002_create_server_table::Migration),
            Box::new(m20260810_000003_create_plan_table::Migration),
            Box::new(m20260810_000004_create_subscription_table::Migration),
            Box::new(m20260810_000005_create_subscription_link_table::Migration),
            Box::new(m20260810_000006_create_aeza_order_table::Migration),
        ]
    }
}
