//! # tracklink-store
//!
//! Durable per-user state for tracklink, backed by SQLite.
//!
//! Every user owns two ordered collections: the projects they have linked
//! and the service hook subscriptions they have created. Each collection is
//! stored as one JSON document under a per-user key, so a read or write
//! always covers the whole set. Business rules (deduplication, cascades)
//! live with the caller; this crate only persists and retrieves.

pub mod database;
pub mod kv;
pub mod migrations;
pub mod models;
pub mod projects;
pub mod subscriptions;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use projects::ProjectStore;
pub use subscriptions::SubscriptionStore;
