//! # AVA Common Library
//!
//! Shared code for the AVA call engine:
//! - Database schema and models (calls, tenants, users, assistant configs)
//! - Call metadata container and merge policy
//! - Tenant id normalization
//! - Status vocabulary and payload coercion helpers
//! - Configuration loading
//! - Timestamp parsing and storage format

pub mod coerce;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod meta;
pub mod status;
pub mod time;

pub use error::{Error, Result};
pub use ids::TenantId;
pub use meta::{CallMeta, MergePolicy, StatusTransition};
