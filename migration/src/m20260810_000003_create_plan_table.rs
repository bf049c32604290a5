use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Plan::Table)
                    .if_not_exists()
                    .col(pk_auto(Plan::Id))
                    .col(string(Plan::Name))
                    .col(big_integer(Plan::Price))
                    .col(integer(Plan::DurationDays))
                    .col(big_integer(Plan::TrafficBytes))
                    .col(integer(Plan::MaxDevices).default(1))
                    .col(text_null(Plan::Description))
                    .col(boolean(Plan::IsActive).default(true))
                    .col(
                        timestamp(Plan::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Plan::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Plan {
    Table,
    Id,
    Name,
    Price,
    DurationDays,
    TrafficBytes,
    MaxDevices,
    Description,
    IsActive,
    CreatedAt,
}
