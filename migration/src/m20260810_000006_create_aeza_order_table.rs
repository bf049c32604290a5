use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AezaOrder::Table)
                    .if_not_exists()
                    .col(pk_auto(AezaOrder::Id))
                    .col(string_uniq(AezaOrder::OrderId))
                    .col(string(AezaOrder::Status))
                    .col(string_null(AezaOrder::AezaServerId))
                    .col(string_null(AezaOrder::IpAddress))
                    .col(string_null(AezaOrder::RootPassword))
                    .col(text_null(AezaOrder::ErrorMessage))
                    .col(json_null(AezaOrder::Meta))
                    .col(
                        timestamp(AezaOrder::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(timestamp(AezaOrder::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AezaOrder::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum AezaOrder {
    Table,
    Id,
    OrderId,
    Status,
    AezaServerId,
    IpAddress,
    RootPassword,
    ErrorMessage,
    Meta,
    CreatedAt,
    UpdatedAt,
}
