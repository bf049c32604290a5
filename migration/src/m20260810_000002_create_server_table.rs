use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Server::Table)
                    .if_not_exists()
                    .col(pk_auto(Server::Id))
                    .col(string(Server::Name))
                    .col(string_null(Server::FlagEmoji))
                    .col(string(Server::IpAddress))
                    .col(string(Server::ApiDomain))
                    .col(string_null(Server::AdminUser))
                    .col(string_null(Server::AdminPass))
                    .col(string_null(Server::ApiKey))
                    .col(string(Server::PanelKind))
                    .col(integer(Server::Capacity))
                    .col(integer(Server::ActiveUsersCount).default(0))
                    .col(string(Server::LocationTag))
                    .col(string(Server::Region))
                    .col(string(Server::ServerCategory))
                    .col(boolean(Server::IsActive).default(true))
                    .col(boolean(Server::IsCentral).default(false))
                    .col(
                        timestamp(Server::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(timestamp(Server::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_server_location_tag")
                    .table(Server::Table)
                    .col(Server::LocationTag)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_server_region_category")
                    .table(Server::Table)
                    .col(Server::Region)
                    .col(Server::ServerCategory)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Server::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Server {
    Table,
    Id,
    Name,
    FlagEmoji,
    IpAddress,
    ApiDomain,
    AdminUser,
    AdminPass,
    ApiKey,
    PanelKind,
    Capacity,
    ActiveUsersCount,
    LocationTag,
    Region,
    ServerCategory,
    IsActive,
    IsCentral,
    CreatedAt,
    UpdatedAt,
}
