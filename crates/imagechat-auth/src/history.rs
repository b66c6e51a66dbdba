//! Query history attribution. Write-once per submitted query, listed
//! most-recent-first.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use imagechat_core::error::{Error, Result};
use imagechat_core::traits::HistoryStore;
use imagechat_core::types::HistoryEntry;

use crate::gate::Session;

pub struct QueryHistory {
    store: Arc<dyn HistoryStore>,
}

impl QueryHistory {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Append one history line for the session's user. Anonymous sessions
    /// are rejected before the store is touched.
    pub fn record(&self, session: &Session, query_text: &str) -> Result<()> {
        let user = session.authenticated_user()?;
        debug!("recording query for user {}", user.id);
        self.store
            .append(user.id, query_text, Utc::now())
            .map_err(|e| Error::Persistence(e.to_string()))
    }

    /// The session user's history, most recent first.
    pub fn list(&self, session: &Session) -> Result<Vec<HistoryEntry>> {
        let user = session.authenticated_user()?;
        self.store
            .list_for_user(user.id)
            .map_err(|e| Error::Persistence(e.to_string()))
    }
}
