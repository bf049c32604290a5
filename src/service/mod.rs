//! Business logic on top of the repositories and the panel contract.
//!
//! Orchestration (`provisioning`), background reconciliation (`lifecycle`),
//! server selection (`selection`) and the VPS marketplace integration
//! (`aeza`) live here. Services own clones of the shared handles (database,
//! panel registry, notifier) so scheduler jobs can move them into tasks.

pub mod aeza;
pub mod lifecycle;
pub mod provisioning;
pub mod selection;

#[cfg(test)]
mod test;
