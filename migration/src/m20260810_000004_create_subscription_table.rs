use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260810_000001_create_user_table::User;
use crate::m20260810_000002_create_server_table::Server;
use crate::m20260810_000003_create_plan_table::Plan;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscription::Table)
                    .if_not_exists()
                    .col(pk_auto(Subscription::Id))
                    .col(integer(Subscription::UserId))
                    .col(integer(Subscription::PlanId))
                    .col(integer_null(Subscription::ServerId))
                    .col(string_uniq(Subscription::Uuid))
                    .col(string(Subscription::Username))
                    .col(string(Subscription::Status))
                    .col(big_integer(Subscription::TotalTraffic))
                    .col(big_integer(Subscription::UsedTraffic).default(0))
                    .col(timestamp_null(Subscription::ExpireAt))
                    .col(integer(Subscription::MaxDevices).default(1))
                    .col(
                        timestamp(Subscription::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(timestamp(Subscription::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_user_id")
                            .from(Subscription::Table, Subscription::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_plan_id")
                            .from(Subscription::Table, Subscription::PlanId)
                            .to(Plan::Table, Plan::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_server_id")
                            .from(Subscription::Table, Subscription::ServerId)
                            .to(Server::Table, Server::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_status")
                    .table(Subscription::Table)
                    .col(Subscription::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subscription::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Subscription {
    Table,
    Id,
    UserId,
    PlanId,
    ServerId,
    Uuid,
    Username,
    Status,
    TotalTraffic,
    UsedTraffic,
    ExpireAt,
    MaxDevices,
    CreatedAt,
    UpdatedAt,
}
