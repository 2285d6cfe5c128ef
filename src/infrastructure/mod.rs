// Storage and request plumbing
pub mod column_locks;          // In-process per-column serialization
pub mod database;              // Store interface, transactions and backend selection
pub mod middleware;            // Request context middleware
pub mod postgres_database;     // PostgreSQL store
pub mod sqlite_database;       // SQLite store

pub use column_locks::{ColumnGuard, ColumnLocks};
pub use database::{connect_store, ScheduleStore, StoreTransaction};
pub use postgres_database::PostgresScheduleStore;
pub use sqlite_database::SqliteScheduleStore;
