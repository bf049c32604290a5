//! Provisioning core for a multi-server VPN reseller.
//!
//! The crate manages subscriptions across a fleet of heterogeneous panel
//! servers: account provisioning with partial-failure handling, least-loaded
//! server selection, background reconciliation of usage and lifecycle state,
//! and VPS procurement through a marketplace API.

pub mod config;
pub mod data;
pub mod error;
pub mod notify;
pub mod panel;
pub mod scheduler;
pub mod service;
pub mod startup;
pub mod state;
