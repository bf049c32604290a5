//! Factory methods for creating test data.
//!
//! This module provides factory methods for creating test entities with sensible defaults,
//! reducing boilerplate in tests. Factories automatically handle dependencies and foreign
//! key relationships, making tests more concise and maintainable.
//!
//! # Overview
//!
//! Each entity has its own factory module with both a `Factory` struct for customization
//! and a `create_*` convenience function for quick default creation.
//!
//! # Basic Usage
//!
//! ```rust,ignore
//! use test_utils::factory;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), sea_orm::DbErr> {
//!     let db = /* ... */;
//!
//!     // Create with defaults
//!     let user = factory::user::create_user(&db).await?;
//!     let server = factory::server::create_server(&db).await?;
//!
//!     // Create with all dependencies
//!     let (user, plan, server, subscription) =
//!         factory::helpers::create_subscription_with_dependencies(&db).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Customization
//!
//! Use the factory builders for custom values:
//!
//! ```rust,ignore
//! use test_utils::factory;
//!
//! // Using builder pattern for customization
//! let server = factory::server::ServerFactory::new(&db)
//!     .panel_kind("hiddify")
//!     .capacity(10)
//!     .region("iran")
//!     .category("tunnel_entry")
//!     .build()
//!     .await?;
//! ```
//!
//! # Available Factories
//!
//! - `user` - Create user entities
//! - `server` - Create panel server entities
//! - `plan` - Create plan entities
//! - `subscription` - Create subscription entities
//! - `subscription_link` - Create per-server subscription link entities
//! - `aeza_order` - Create VPS marketplace order entities
//! - `helpers` - Convenience methods for creating entities with dependencies

pub mod aeza_order;
pub mod helpers;
pub mod plan;
pub mod server;
pub mod subscription;
pub mod subscription_link;
pub mod user;

// Re-export commonly used factory functions for concise usage
pub use aeza_order::create_aeza_order;
pub use plan::create_plan;
pub use server::{create_server, create_server_with_panel};
pub use subscription::create_subscription;
pub use subscription_link::create_link;
pub use user::create_user;
