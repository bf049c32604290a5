//! Server entity: a physical or virtual host running one VPN panel backend.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "server")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub flag_emoji: Option<String>,
    pub ip_address: String,
    /// Domain the panel API is reachable at. May carry an explicit scheme
    /// (used by tests against local mock servers); defaults to https.
    pub api_domain: String,
    /// Panel admin login, required for token-auth backends.
    pub admin_user: Option<String>,
    /// Panel admin password. Never serialized.
    #[serde(skip_serializing)]
    pub admin_pass: Option<String>,
    /// Static panel API key, required for key-auth backends. Never serialized.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Which panel protocol this server speaks ("marzban" or "hiddify").
    pub panel_kind: String,
    /// Maximum concurrent accounts this server should host. Advisory headroom,
    /// not a hard limit.
    pub capacity: i32,
    /// Cached count of accounts on the panel. Not authoritative; reconciled
    /// periodically against live panel health.
    pub active_users_count: i32,
    pub location_tag: String,
    /// "iran" or "foreign"; jointly constrained with `server_category`.
    pub region: String,
    /// "tunnel_entry", "tunnel_exit" or "direct".
    pub server_category: String,
    pub is_active: bool,
    /// At most one server may be central at a time.
    pub is_central: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscription,
    #[sea_orm(has_many = "super::subscription_link::Entity")]
    SubscriptionLink,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl Related<super::subscription_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubscriptionLink.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn has_capacity(&self) -> bool {
        self.active_users_count < self.capacity
    }

    pub fn available_slots(&self) -> i32 {
        (self.capacity - self.active_users_count).max(0)
    }
}
