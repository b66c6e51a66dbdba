use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{FeedbackRecord, GeneratedAnswer, HistoryEntry, RetrievedImage, User, UserId};

/// Nearest-neighbour search over the image embedding index.
///
/// Returns at most `k` documents ordered by ascending raw distance.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    async fn search(&self, query_text: &str, k: usize) -> anyhow::Result<Vec<RetrievedImage>>;
}

/// Free-text answer generation, optionally grounded in retrieved context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        query_text: &str,
        context: Option<&str>,
    ) -> anyhow::Result<GeneratedAnswer>;
}

/// Durable append-only log of relevance votes.
pub trait FeedbackStore: Send + Sync {
    fn append(&self, record: &FeedbackRecord) -> anyhow::Result<()>;
    fn query_by_document(&self, document_id: &str) -> anyhow::Result<Vec<FeedbackRecord>>;
}

/// Durable per-user query log. `list_for_user` returns most-recent-first.
pub trait HistoryStore: Send + Sync {
    fn append(&self, user_id: UserId, query_text: &str, timestamp: DateTime<Utc>)
        -> anyhow::Result<()>;
    fn list_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<HistoryEntry>>;
}

/// Account storage. Passwords stay behind this trait; callers only ever
/// see resolved `User` values.
pub trait UserStore: Send + Sync {
    fn create_user(&self, name: &str, email: &str, password: &str) -> anyhow::Result<User>;
    fn verify_credentials(&self, email: &str, password: &str) -> anyhow::Result<Option<User>>;
    fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
}
