//! Subscription entity: one logical VPN account, bound to a single server
//! (`server_id` set) or spread across several (`server_id` null, with one
//! `subscription_link` row per member server).

use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "subscription")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub plan_id: i32,
    /// Null marks a multi-server subscription.
    pub server_id: Option<i32>,
    /// Stable external identifier, shared by every member server.
    #[sea_orm(unique)]
    pub uuid: String,
    /// Panel login name used by backends that key accounts by username.
    pub username: String,
    /// "active", "disabled" or "expired".
    pub status: String,
    /// Traffic budget in bytes; 0 means unlimited.
    pub total_traffic: i64,
    /// Aggregate used traffic in bytes. For multi-server subscriptions this is
    /// the maximum observed across member servers, never a sum.
    pub used_traffic: i64,
    /// Null means no time limit.
    pub expire_at: Option<DateTimeUtc>,
    pub max_devices: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::plan::Entity",
        from = "Column::PlanId",
        to = "super::plan::Column::Id"
    )]
    Plan,
    #[sea_orm(
        belongs_to = "super::server::Entity",
        from = "Column::ServerId",
        to = "super::server::Column::Id"
    )]
    Server,
    #[sea_orm(has_many = "super::subscription_link::Entity")]
    SubscriptionLink,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl Related<super::server::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Server.def()
    }
}

impl Related<super::subscription_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubscriptionLink.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn is_multi_server(&self) -> bool {
        self.server_id.is_none()
    }

    /// Whether the subscription has run out of time or traffic.
    pub fn is_exhausted(&self) -> bool {
        if self.status == "expired" {
            return true;
        }
        if let Some(expire_at) = self.expire_at {
            if expire_at <= Utc::now() {
                return true;
            }
        }
        self.total_traffic > 0 && self.used_traffic >= self.total_traffic
    }

    /// Remaining traffic in bytes; `None` for unlimited plans.
    pub fn remaining_traffic(&self) -> Option<i64> {
        if self.total_traffic == 0 {
            return None;
        }
        Some((self.total_traffic - self.used_traffic).max(0))
    }

    /// Whole days until expiry; `None` when there is no time limit.
    pub fn remaining_days(&self) -> Option<i64> {
        let expire_at = self.expire_at?;
        Some((expire_at - Utc::now()).num_days().max(0))
    }
}
