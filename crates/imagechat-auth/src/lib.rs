//! Session gate and per-user query history.

pub mod gate;
pub mod history;

pub use gate::{AccessGate, Session};
pub use history::QueryHistory;
