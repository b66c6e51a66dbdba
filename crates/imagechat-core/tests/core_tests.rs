use std::collections::HashMap;

use imagechat_core::config::QueryPolicy;
use imagechat_core::error::Error;
use imagechat_core::types::{
    rank_descending, QueryOutcome, QueryResponseBody, RankedImage, Rating, RetrievedImage,
};

fn ranked(id: &str, similarity: f32) -> RankedImage {
    RankedImage {
        document_id: id.to_string(),
        page_content: format!("content for {}", id),
        metadata: HashMap::new(),
        similarity,
    }
}

#[test]
fn rating_accepts_only_plus_and_minus_one() {
    assert_eq!(Rating::try_from(1).unwrap(), Rating::Positive);
    assert_eq!(Rating::try_from(-1).unwrap(), Rating::Negative);

    for bad in [0i64, 2, -2, 5] {
        match Rating::try_from(bad) {
            Err(Error::InvalidRating(v)) => assert_eq!(v, bad),
            other => panic!("expected InvalidRating for {}, got {:?}", bad, other),
        }
    }
}

#[test]
fn similarity_is_one_minus_distance() {
    let img = RetrievedImage {
        document_id: "img:1".to_string(),
        page_content: "cover drive".to_string(),
        metadata: HashMap::new(),
        raw_distance: 0.25,
    };
    let ranked = RankedImage::from_retrieved(img);
    assert!((ranked.similarity - 0.75).abs() < f32::EPSILON);
}

#[test]
fn ranking_sorts_descending_with_doc_id_tie_break() {
    let mut images = vec![ranked("b", 0.5), ranked("c", 0.9), ranked("a", 0.5)];
    rank_descending(&mut images);

    let ids: Vec<&str> = images.iter().map(|i| i.document_id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a", "b"], "ties resolve by document id");
}

#[test]
fn policy_defaults_are_documented_values() {
    let policy = QueryPolicy::default();
    assert_eq!(policy.top_k, 5);
    assert!((policy.min_confidence - 0.5).abs() < f32::EPSILON);
    assert!((policy.feedback_weight - 0.1).abs() < f32::EPSILON);
    assert_eq!(policy.upstream_timeout_ms, 10_000);
}

#[test]
fn outcome_reports_which_path_ran() {
    let answer = QueryOutcome::Answer {
        text: "a textbook cover drive".to_string(),
    };
    assert!(!answer.used_similarity_path());

    let images = QueryOutcome::SimilarImages {
        images: vec![ranked("a", 0.8)],
    };
    assert!(images.used_similarity_path());
}

#[test]
fn response_body_carries_all_three_fields() {
    let body: QueryResponseBody = QueryOutcome::SimilarImages {
        images: vec![ranked("img:7", 0.8)],
    }
    .into();

    assert!(body.answer_text.is_none());
    assert!(body.used_similarity_path);
    assert_eq!(body.similar_images.len(), 1);
    assert_eq!(body.similar_images[0].document_id, "img:7");
    assert!((body.similar_images[0].similarity_score - 0.8).abs() < f32::EPSILON);

    let body: QueryResponseBody = QueryOutcome::Answer {
        text: "generated".to_string(),
    }
    .into();
    assert_eq!(body.answer_text.as_deref(), Some("generated"));
    assert!(!body.used_similarity_path);
    assert!(body.similar_images.is_empty());
}
