pub mod aeza_order;
pub mod plan;
pub mod server;
pub mod subscription;
pub mod subscription_link;
pub mod user;

pub mod prelude {
    pub use super::aeza_order::Entity as AezaOrder;
    pub use super::plan::Entity as Plan;
    pub use super::server::Entity as Server;
    pub use super::subscription::Entity as Subscription;
    pub use super::subscription_link::Entity as SubscriptionLink;
    pub use super::user::Entity as User;
}
