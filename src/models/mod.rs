//! # Data Models
//!
//! This module contains all the data models used throughout the Rosters API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod audit_log;
pub mod batch;
pub mod company;
pub mod record;
pub mod user;

pub use audit_log::Entity as AuditLog;
pub use batch::Entity as Batch;
pub use company::Entity as Company;
pub use record::Entity as Record;
pub use user::Entity as User;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "rosters-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
