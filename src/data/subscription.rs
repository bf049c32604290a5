use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter,
};

pub struct CreateSubscriptionParams {
    pub user_id: i32,
    pub plan_id: i32,
    pub server_id: Option<i32>,
    pub uuid: String,
    pub username: String,
    pub total_traffic: i64,
    pub expire_at: Option<DateTime<Utc>>,
    pub max_devices: i32,
}

pub struct SubscriptionRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> SubscriptionRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an `active` subscription row. Callers persist only after the
    /// panel account is confirmed, so a row here always has a remote
    /// counterpart at creation time.
    pub async fn create(
        &self,
        params: CreateSubscriptionParams,
    ) -> Result<entity::subscription::Model, DbErr> {
        let now = Utc::now();
        entity::subscription::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(params.user_id),
            plan_id: ActiveValue::Set(params.plan_id),
            server_id: ActiveValue::Set(params.server_id),
            uuid: ActiveValue::Set(params.uuid),
            username: ActiveValue::Set(params.username),
            status: ActiveValue::Set("active".to_string()),
            total_traffic: ActiveValue::Set(params.total_traffic),
            used_traffic: ActiveValue::Set(0),
            expire_at: ActiveValue::Set(params.expire_at),
            max_devices: ActiveValue::Set(params.max_devices),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
        .insert(self.db)
        .await
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<entity::subscription::Model>, DbErr> {
        entity::prelude::Subscription::find_by_id(id)
            .one(self.db)
            .await
    }

    pub async fn get_by_uuid(
        &self,
        uuid: &str,
    ) -> Result<Option<entity::subscription::Model>, DbErr> {
        entity::prelude::Subscription::find()
            .filter(entity::subscription::Column::Uuid.eq(uuid))
            .one(self.db)
            .await
    }

    pub async fn links(
        &self,
        subscription_id: i32,
    ) -> Result<Vec<entity::subscription_link::Model>, DbErr> {
        entity::prelude::SubscriptionLink::find()
            .filter(entity::subscription_link::Column::SubscriptionId.eq(subscription_id))
            .all(self.db)
            .await
    }

    /// Servers the subscription lives on: the pinned server for single-server
    /// subscriptions, or every linked server for multi-server ones.
    pub async fn member_servers(
        &self,
        subscription: &entity::subscription::Model,
    ) -> Result<Vec<entity::server::Model>, DbErr> {
        if let Some(server_id) = subscription.server_id {
            return Ok(entity::prelude::Server::find_by_id(server_id)
                .one(self.db)
                .await?
                .into_iter()
                .collect());
        }

        let links = self.links(subscription.id).await?;
        let server_ids: Vec<i32> = links.iter().map(|link| link.server_id).collect();

        entity::prelude::Server::find()
            .filter(entity::server::Column::Id.is_in(server_ids))
            .all(self.db)
            .await
    }

    pub async fn add_link(
        &self,
        subscription_id: i32,
        server_id: i32,
        uri: String,
    ) -> Result<entity::subscription_link::Model, DbErr> {
        entity::subscription_link::ActiveModel {
            id: ActiveValue::NotSet,
            subscription_id: ActiveValue::Set(subscription_id),
            server_id: ActiveValue::Set(server_id),
            uri: ActiveValue::Set(uri),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(self.db)
        .await
    }

    pub async fn delete_link(&self, subscription_id: i32, server_id: i32) -> Result<(), DbErr> {
        entity::prelude::SubscriptionLink::delete_many()
            .filter(entity::subscription_link::Column::SubscriptionId.eq(subscription_id))
            .filter(entity::subscription_link::Column::ServerId.eq(server_id))
            .exec(self.db)
            .await?;

        Ok(())
    }

    pub async fn delete_links(&self, subscription_id: i32) -> Result<(), DbErr> {
        entity::prelude::SubscriptionLink::delete_many()
            .filter(entity::subscription_link::Column::SubscriptionId.eq(subscription_id))
            .exec(self.db)
            .await?;

        Ok(())
    }

    /// Swaps the full link set in one pass, used when a subscription moves
    /// between servers.
    pub async fn replace_links(
        &self,
        subscription_id: i32,
        links: Vec<(i32, String)>,
    ) -> Result<(), DbErr> {
        self.delete_links(subscription_id).await?;
        for (server_id, uri) in links {
            self.add_link(subscription_id, server_id, uri).await?;
        }

        Ok(())
    }

    pub async fn update_status(&self, id: i32, status: &str) -> Result<(), DbErr> {
        self.touch(id, |query| {
            query.col_expr(entity::subscription::Column::Status, Expr::value(status))
        })
        .await
    }

    pub async fn update_used_traffic(&self, id: i32, used_traffic: i64) -> Result<(), DbErr> {
        self.touch(id, |query| {
            query.col_expr(
                entity::subscription::Column::UsedTraffic,
                Expr::value(used_traffic),
            )
        })
        .await
    }

    /// Applies a renewal budget: new traffic allowance and expiry together.
    pub async fn update_budget(
        &self,
        id: i32,
        total_traffic: i64,
        expire_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbErr> {
        self.touch(id, |query| {
            query
                .col_expr(
                    entity::subscription::Column::TotalTraffic,
                    Expr::value(total_traffic),
                )
                .col_expr(
                    entity::subscription::Column::ExpireAt,
                    Expr::value(expire_at),
                )
        })
        .await
    }

    pub async fn update_max_devices(&self, id: i32, max_devices: i32) -> Result<(), DbErr> {
        self.touch(id, |query| {
            query.col_expr(
                entity::subscription::Column::MaxDevices,
                Expr::value(max_devices),
            )
        })
        .await
    }

    pub async fn set_server(&self, id: i32, server_id: Option<i32>) -> Result<(), DbErr> {
        self.touch(id, |query| {
            query.col_expr(
                entity::subscription::Column::ServerId,
                Expr::value(server_id),
            )
        })
        .await
    }

    pub async fn active_single_server(&self) -> Result<Vec<entity::subscription::Model>, DbErr> {
        entity::prelude::Subscription::find()
            .filter(entity::subscription::Column::Status.eq("active"))
            .filter(entity::subscription::Column::ServerId.is_not_null())
            .all(self.db)
            .await
    }

    pub async fn active_multi_server(&self) -> Result<Vec<entity::subscription::Model>, DbErr> {
        entity::prelude::Subscription::find()
            .filter(entity::subscription::Column::Status.eq("active"))
            .filter(entity::subscription::Column::ServerId.is_null())
            .all(self.db)
            .await
    }

    /// Active subscriptions that have run out of time or traffic.
    ///
    /// A zero traffic allowance means unlimited and never counts as exhausted.
    pub async fn expiration_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<entity::subscription::Model>, DbErr> {
        entity::prelude::Subscription::find()
            .filter(entity::subscription::Column::Status.eq("active"))
            .filter(
                Condition::any()
                    .add(entity::subscription::Column::ExpireAt.lte(now))
                    .add(
                        Condition::all()
                            .add(entity::subscription::Column::TotalTraffic.gt(0))
                            .add(
                                Expr::col(entity::subscription::Column::UsedTraffic)
                                    .gte(Expr::col(entity::subscription::Column::TotalTraffic)),
                            ),
                    ),
            )
            .all(self.db)
            .await
    }

    /// Expired subscriptions untouched for thirty days, ready for removal.
    pub async fn cleanup_candidates(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<entity::subscription::Model>, DbErr> {
        let cutoff = now - Duration::days(30);

        entity::prelude::Subscription::find()
            .filter(entity::subscription::Column::Status.eq("expired"))
            .filter(entity::subscription::Column::UpdatedAt.lt(cutoff))
            .all(self.db)
            .await
    }

    /// Removes the subscription and its links. Local removal is unconditional;
    /// remote cleanup is the orchestrator's problem.
    pub async fn delete(&self, id: i32) -> Result<(), DbErr> {
        self.delete_links(id).await?;
        entity::prelude::Subscription::delete_by_id(id)
            .exec(self.db)
            .await?;

        Ok(())
    }

    async fn touch<F>(&self, id: i32, apply: F) -> Result<(), DbErr>
    where
        F: FnOnce(
            sea_orm::UpdateMany<entity::prelude::Subscription>,
        ) -> sea_orm::UpdateMany<entity::prelude::Subscription>,
    {
        apply(entity::prelude::Subscription::update_many())
            .col_expr(
                entity::subscription::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(entity::subscription::Column::Id.eq(id))
            .exec(self.db)
            .await?;

        Ok(())
    }
}
