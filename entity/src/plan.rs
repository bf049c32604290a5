//! Plan entity: a purchasable product (duration, traffic allowance, device cap).

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "plan")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Price in the smallest currency unit.
    pub price: i64,
    /// 0 means no time limit.
    pub duration_days: i32,
    /// Traffic allowance in bytes; 0 means unlimited.
    pub traffic_bytes: i64,
    pub max_devices: i32,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscription,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_unlimited_traffic(&self) -> bool {
        self.traffic_bytes == 0
    }
}
