// Schedule Board - kanban schedule positioning with a field-level audit log

// Core types and primitives
pub mod core;

// Board records
pub mod models;

// Storage, locking and request plumbing
pub mod infrastructure;

// Position planning, change diffing and board operations
pub mod services;

// HTTP surface
pub mod schedule_interface;
pub mod app_state;

// Common utilities
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use services::ScheduleService;
