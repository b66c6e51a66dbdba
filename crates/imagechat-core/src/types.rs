//! Domain types shared by the gate, orchestrator, and adjuster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Error;

pub type DocId = String;
pub type UserId = i64;
pub type Meta = HashMap<String, String>;

/// A natural-language question submitted by an authenticated user.
///
/// Immutable once created; the history log only ever appends copies of
/// `text` with the submission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub user_id: UserId,
    pub force_similarity: bool,
    pub submitted_at: DateTime<Utc>,
}

impl Query {
    pub fn new(text: impl Into<String>, user_id: UserId, force_similarity: bool) -> Self {
        Self {
            text: text.into(),
            user_id,
            force_similarity,
            submitted_at: Utc::now(),
        }
    }
}

/// An image document as returned by the similarity index.
///
/// `raw_distance` is the index's dissimilarity metric (lower is closer).
/// Recomputed per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedImage {
    pub document_id: DocId,
    pub page_content: String,
    pub metadata: Meta,
    pub raw_distance: f32,
}

/// A retrieved image after distance-to-similarity conversion.
///
/// `similarity = 1.0 - raw_distance`. Presentation order is descending
/// similarity with ties broken by `document_id` ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedImage {
    pub document_id: DocId,
    pub page_content: String,
    pub metadata: Meta,
    pub similarity: f32,
}

impl RankedImage {
    pub fn from_retrieved(img: RetrievedImage) -> Self {
        Self {
            document_id: img.document_id,
            page_content: img.page_content,
            metadata: img.metadata,
            similarity: 1.0 - img.raw_distance,
        }
    }
}

/// Sort images by descending similarity, document id ascending on ties.
pub fn rank_descending(images: &mut [RankedImage]) {
    images.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
}

/// A relevance vote on one image for one query. Append-only; several
/// records may exist for the same `(document_id, query_text)` pair and
/// the adjuster aggregates all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub document_id: DocId,
    pub query_text: String,
    pub image_reference: String,
    pub rating: Rating,
    pub recorded_at: DateTime<Utc>,
}

/// A thumbs-up/thumbs-down vote. The only values the feedback store
/// ever sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Positive,
    Negative,
}

impl Rating {
    pub fn value(self) -> i64 {
        match self {
            Rating::Positive => 1,
            Rating::Negative => -1,
        }
    }
}

impl TryFrom<i64> for Rating {
    type Error = Error;

    fn try_from(raw: i64) -> Result<Self, Error> {
        match raw {
            1 => Ok(Rating::Positive),
            -1 => Ok(Rating::Negative),
            other => Err(Error::InvalidRating(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// One line of a user's query history, listed most-recent-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user_id: UserId,
    pub query_text: String,
    pub timestamp: DateTime<Utc>,
}

/// What the answer generator produced, with its own confidence signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub text: String,
    pub confidence: f32,
}

/// Which response mode actually executed for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueryOutcome {
    Answer { text: String },
    SimilarImages { images: Vec<RankedImage> },
}

impl QueryOutcome {
    pub fn used_similarity_path(&self) -> bool {
        matches!(self, QueryOutcome::SimilarImages { .. })
    }
}

/// Boundary shape consumed by the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct ImagePayload {
    pub document_id: DocId,
    pub content: String,
    pub metadata: Meta,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponseBody {
    pub answer_text: Option<String>,
    pub similar_images: Vec<ImagePayload>,
    pub used_similarity_path: bool,
}

impl From<QueryOutcome> for QueryResponseBody {
    fn from(outcome: QueryOutcome) -> Self {
        match outcome {
            QueryOutcome::Answer { text } => Self {
                answer_text: Some(text),
                similar_images: Vec::new(),
                used_similarity_path: false,
            },
            QueryOutcome::SimilarImages { images } => Self {
                answer_text: None,
                similar_images: images
                    .into_iter()
                    .map(|img| ImagePayload {
                        document_id: img.document_id,
                        content: img.page_content,
                        metadata: img.metadata,
                        similarity_score: img.similarity,
                    })
                    .collect(),
                used_similarity_path: true,
            },
        }
    }
}
