//! External VPS-marketplace purchase order, tracked from `pending` until the
//! instance is reachable (`ready`) or the order fails.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "aeza_order")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub order_id: String,
    /// "pending", "ready" or "failed".
    pub status: String,
    pub aeza_server_id: Option<String>,
    pub ip_address: Option<String>,
    /// One-time root password reported by the marketplace. Never serialized.
    #[serde(skip_serializing)]
    pub root_password: Option<String>,
    pub error_message: Option<String>,
    /// Raw provider payloads kept for debugging.
    pub meta: Option<Json>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }

    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }

    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}
