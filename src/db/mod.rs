// Re-export the Database struct and other public items
pub mod core;
mod lease;
mod posted;
mod schema;

pub use self::core::Database;
pub use self::posted::{PostedRecord, RecordOutcome};
