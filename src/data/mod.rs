//! Database repository layer for all domain entities.
//!
//! This module contains repository structs that handle database operations (CRUD) for each
//! domain in the application. Repositories use SeaORM entity models and own the few
//! persistence-level rules the data model carries: the region/category placement
//! constraint, the at-most-one-central rule, and the advisory capacity counter updates.

pub mod aeza_order;
pub mod plan;
pub mod server;
pub mod subscription;
pub mod user;

#[cfg(test)]
mod test;
