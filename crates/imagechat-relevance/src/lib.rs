//! Feedback-driven rank adjustment.
//!
//! Folds accumulated relevance votes into the similarity ranking before it
//! leaves the orchestrator. Votes only bias the ordering key; the presented
//! similarity scores stay as the index produced them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use imagechat_core::error::{Error, Result};
use imagechat_core::traits::FeedbackStore;
use imagechat_core::types::{FeedbackRecord, RankedImage, Rating};

pub struct RelevanceAdjuster {
    store: Arc<dyn FeedbackStore>,
    weight: f32,
}

impl RelevanceAdjuster {
    /// `weight` scales the aggregate rating per document; see
    /// `QueryPolicy::feedback_weight` for the configured default.
    pub fn new(store: Arc<dyn FeedbackStore>, weight: f32) -> Self {
        Self { store, weight }
    }

    /// Re-rank candidates by `similarity + weight * sum(ratings)`, summing
    /// feedback recorded for the same document under the same query text
    /// (compared case-insensitively after trimming). Ordering is stable:
    /// descending adjusted score, document id ascending on ties. With an
    /// unchanged feedback set the ordering is idempotent across calls.
    ///
    /// A feedback read failure leaves that candidate unbiased; ranking must
    /// not depend on the feedback store being reachable.
    pub fn adjust(&self, images: Vec<RankedImage>, query_text: &str) -> Vec<RankedImage> {
        let wanted = normalize(query_text);
        let mut keyed: Vec<(f32, RankedImage)> = Vec::with_capacity(images.len());
        for img in images {
            let bias = match self.store.query_by_document(&img.document_id) {
                Ok(records) => self.bias_for(&records, &wanted),
                Err(e) => {
                    warn!("feedback lookup failed for {}: {}", img.document_id, e);
                    0.0
                }
            };
            if bias != 0.0 {
                debug!("bias {:+.3} applied to {}", bias, img.document_id);
            }
            keyed.push((img.similarity + bias, img));
        }
        keyed.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.document_id.cmp(&b.1.document_id))
        });
        keyed.into_iter().map(|(_, img)| img).collect()
    }

    fn bias_for(&self, records: &[FeedbackRecord], wanted: &str) -> f32 {
        let total: i64 = records
            .iter()
            .filter(|r| normalize(&r.query_text) == wanted)
            .map(|r| r.rating.value())
            .sum();
        self.weight * total as f32
    }

    /// Append one relevance vote. Ratings outside {+1, -1} are rejected
    /// with `InvalidRating` before the store is touched; a store failure
    /// maps to `Persistence` and never invalidates a query result the
    /// caller already holds.
    pub fn record_feedback(
        &self,
        document_id: &str,
        query_text: &str,
        image_reference: &str,
        rating_raw: i64,
    ) -> Result<()> {
        let rating = Rating::try_from(rating_raw)?;
        let record = FeedbackRecord {
            document_id: document_id.to_string(),
            query_text: query_text.to_string(),
            image_reference: image_reference.to_string(),
            rating,
            recorded_at: Utc::now(),
        };
        self.store
            .append(&record)
            .map_err(|e| Error::Persistence(e.to_string()))
    }
}

fn normalize(query_text: &str) -> String {
    query_text.trim().to_lowercase()
}
