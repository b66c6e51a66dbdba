//! HTTP adapters for the external similarity index and answer generator.
//!
//! Both services are plain JSON-over-POST endpoints. Client timeouts match
//! the orchestrator's upstream bound; transport and status failures bubble
//! up for the orchestrator to map to `UpstreamUnavailable`.

pub mod generator;
pub mod index;

pub use generator::HttpAnswerGenerator;
pub use index::HttpSimilarityIndex;
