//! HTTP request handlers.

pub mod health;
pub mod inventory;
pub mod messages;
pub mod metrics;

pub use health::{health_check, readiness_check};
pub use inventory::{InventoryResponse, get_inventory};
pub use messages::recent_messages;
