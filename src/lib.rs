pub mod core;
pub mod monitor;
pub mod notify;
pub mod scraping;

// --- Primary core exports ---
pub use crate::core::config;
pub use crate::core::types;
pub use crate::core::types::*;
