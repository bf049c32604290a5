use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260810_000002_create_server_table::Server;
use crate::m20260810_000004_create_subscription_table::Subscription;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SubscriptionLink::Table)
                    .if_not_exists()
                    .col(pk_auto(SubscriptionLink::Id))
                    .col(integer(SubscriptionLink::SubscriptionId))
                    .col(integer(SubscriptionLink::ServerId))
                    .col(text(SubscriptionLink::Uri))
                    .col(
                        timestamp(SubscriptionLink::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_link_subscription_id")
                            .from(SubscriptionLink::Table, SubscriptionLink::SubscriptionId)
                            .to(Subscription::Table, Subscription::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_link_server_id")
                            .from(SubscriptionLink::Table, SubscriptionLink::ServerId)
                            .to(Server::Table, Server::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_link_subscription_server")
                    .table(SubscriptionLink::Table)
                    .col(SubscriptionLink::SubscriptionId)
                    .col(SubscriptionLink::ServerId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SubscriptionLink::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum SubscriptionLink {
    Table,
    Id,
    SubscriptionId,
    ServerId,
    Uri,
    CreatedAt,
}
