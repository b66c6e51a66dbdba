//! Query orchestration: routes each query between the generative-answer
//! path and the similarity-search path.
//!
//! The orchestrator owns no durable state; it validates the query, calls
//! the upstream services under a timeout, normalizes distances into
//! similarities, and hands candidates to the relevance adjuster. History
//! and feedback persistence belong to the callers.

use tokio::time::timeout;
use tracing::{debug, info, warn};

use imagechat_core::config::QueryPolicy;
use imagechat_core::error::{Error, Result};
use imagechat_core::traits::{AnswerGenerator, SimilarityIndex};
use imagechat_core::types::{rank_descending, GeneratedAnswer, Query, QueryOutcome, RankedImage};
use imagechat_relevance::RelevanceAdjuster;

pub struct QueryOrchestrator<G, S>
where
    G: AnswerGenerator,
    S: SimilarityIndex,
{
    generator: G,
    index: S,
    adjuster: RelevanceAdjuster,
    policy: QueryPolicy,
}

impl<G, S> QueryOrchestrator<G, S>
where
    G: AnswerGenerator,
    S: SimilarityIndex,
{
    pub fn new(generator: G, index: S, adjuster: RelevanceAdjuster, policy: QueryPolicy) -> Self {
        Self {
            generator,
            index,
            adjuster,
            policy,
        }
    }

    /// Route one query. Exactly one of the two paths produces the outcome
    /// and `QueryOutcome::used_similarity_path` reports which.
    ///
    /// Routing policy: `force_similarity` skips generation entirely.
    /// Otherwise generation runs first and its answer is used only when the
    /// reported confidence reaches `policy.min_confidence` and the text is
    /// non-empty; anything less falls back to the similarity path. An
    /// unavailable upstream degrades to the other path; when neither path
    /// can produce a usable result the query fails with
    /// `NoResultsAvailable`.
    pub async fn handle_query(&self, query: &Query) -> Result<QueryOutcome> {
        let text = query.text.trim();
        if text.is_empty() {
            return Err(Error::InvalidQuery("query text is empty".to_string()));
        }

        if query.force_similarity {
            debug!("similarity path forced for user {}", query.user_id);
            return match self.similarity_path(text).await {
                Err(Error::UpstreamUnavailable(reason)) => {
                    warn!("similarity index unavailable ({}), degrading to generation", reason);
                    self.degraded_answer(text).await
                }
                other => other,
            };
        }

        match self.usable_answer(text).await {
            Ok(Some(answer)) => Ok(QueryOutcome::Answer { text: answer }),
            Ok(None) => {
                debug!("generated answer unusable, falling back to similarity");
                self.similarity_or_exhausted(text).await
            }
            Err(Error::UpstreamUnavailable(reason)) => {
                warn!("answer generator unavailable ({}), falling back to similarity", reason);
                self.similarity_or_exhausted(text).await
            }
            Err(e) => Err(e),
        }
    }

    /// Generative attempt. `Ok(None)` means the generator answered but the
    /// result is unusable: confidence below `policy.min_confidence`, or
    /// empty text.
    async fn usable_answer(&self, text: &str) -> Result<Option<String>> {
        let answer = self.generate_bounded(text).await?;
        if answer.confidence >= self.policy.min_confidence && !answer.text.trim().is_empty() {
            Ok(Some(answer.text))
        } else {
            debug!(
                "confidence {:.2} below threshold {:.2}",
                answer.confidence, self.policy.min_confidence
            );
            Ok(None)
        }
    }

    /// Last-resort generation once the similarity index is gone. Any
    /// non-empty answer is accepted here regardless of confidence.
    async fn degraded_answer(&self, text: &str) -> Result<QueryOutcome> {
        let answer = match self.generate_bounded(text).await {
            Ok(answer) => answer,
            Err(Error::UpstreamUnavailable(_)) => return Err(Error::NoResultsAvailable),
            Err(e) => return Err(e),
        };
        if answer.text.trim().is_empty() {
            return Err(Error::NoResultsAvailable);
        }
        Ok(QueryOutcome::Answer { text: answer.text })
    }

    /// Similarity path as the last remaining option: an unavailable index
    /// escalates to `NoResultsAvailable`.
    async fn similarity_or_exhausted(&self, text: &str) -> Result<QueryOutcome> {
        self.similarity_path(text).await.map_err(|e| match e {
            Error::UpstreamUnavailable(_) => Error::NoResultsAvailable,
            other => other,
        })
    }

    async fn similarity_path(&self, text: &str) -> Result<QueryOutcome> {
        let hits = timeout(
            self.policy.upstream_timeout(),
            self.index.search(text, self.policy.top_k),
        )
        .await
        .map_err(|_| Error::UpstreamUnavailable("similarity index timed out".to_string()))?
        .map_err(|e| Error::UpstreamUnavailable(format!("similarity index: {}", e)))?;

        let mut images: Vec<RankedImage> =
            hits.into_iter().map(RankedImage::from_retrieved).collect();
        images.truncate(self.policy.top_k);
        rank_descending(&mut images);
        let images = self.adjuster.adjust(images, text);
        info!("similarity path returned {} images", images.len());
        Ok(QueryOutcome::SimilarImages { images })
    }

    async fn generate_bounded(&self, text: &str) -> Result<GeneratedAnswer> {
        timeout(self.policy.upstream_timeout(), self.generator.generate(text, None))
            .await
            .map_err(|_| Error::UpstreamUnavailable("answer generator timed out".to_string()))?
            .map_err(|e| Error::UpstreamUnavailable(format!("answer generator: {}", e)))
    }
}
