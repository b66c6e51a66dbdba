//! Durable storage backing the gate, the history log, and the relevance
//! adjuster.

pub mod sqlite;

pub use sqlite::SqliteStore;
