use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::json;

use pulse_ai::answer::{AnswerConfig, AnswerEngine, AnswerStatus};
use pulse_ai::chunker::{chunk_profile, ChunkerConfig};
use pulse_ai::embeddings::Embedder;
use pulse_ai::llm::Llm;
use pulse_ai::store::ChunkStore;
use pulse_core::domain::SectionTag;
use pulse_core::error::AppError;
use pulse_core::normalize::normalize_profile;

struct TopicEmbedder;

impl Embedder for TopicEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let t = input.to_lowercase();
        let count = |words: &[&str]| -> f32 {
            words.iter().map(|w| t.matches(w).count()).sum::<usize>() as f32
        };
        Ok(vec![
            count(&["safe", "crime"]),
            count(&["school", "rating"]),
            count(&["housing", "assessed"]),
            1.0,
        ])
    }
}

/// Replays a fixed response script and counts calls.
struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String, AppError>>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(script: Vec<Result<String, AppError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Llm for ScriptedLlm {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .expect("llm script exhausted")
    }
}

fn indexed_store() -> ChunkStore {
    let mut store = ChunkStore::open_in_memory().expect("open");
    let cfg = ChunkerConfig::default();
    let profiles = [
        json!({
            "name": "Beltline",
            "overview": {"population": 25129},
            "safety": {
                "percentile": 10.0,
                "incidents": 1365,
                "rate_per_1000": 50.9,
                "yoy_pct": 6.8,
                "property_pct": 55.0,
                "violent_pct": 45.0
            }
        }),
        json!({
            "name": "Mission",
            "overview": {"population": 9810},
            "safety": {"percentile": 44.0, "incidents": 402, "rate_per_1000": 41.0}
        }),
    ];
    for raw in profiles {
        let profile = normalize_profile(&raw).expect("normalize");
        let chunks = chunk_profile(&profile, &cfg);
        store
            .reindex_community(&TopicEmbedder, "mock", &profile.slug, &chunks)
            .expect("index");
    }
    store
}

#[test]
fn delivered_answers_cite_their_sources() {
    let store = indexed_store();
    let llm = ScriptedLlm::new(vec![Ok(
        "Beltline ranks low for safety, at the 10/100 percentile [[cite:beltline/safety]].".to_string(),
    )]);
    let engine = AnswerEngine::new(&store, &TopicEmbedder, &llm, AnswerConfig::default());

    let answer = engine.answer("Is Beltline safe?", &[]).expect("answer");
    assert_eq!(answer.status, AnswerStatus::Delivered);
    assert!(!answer.citations.is_empty(), "Delivered requires citations");
    assert_eq!(answer.citations[0].community, "beltline");
    assert_eq!(answer.citations[0].section, SectionTag::Safety);
    assert!(answer.answer_text.contains("[[cite:beltline/safety]]"));
    assert!(answer
        .viz_refs
        .iter()
        .any(|v| v.locator.ends_with("/beltline#safety")));
    assert_eq!(llm.call_count(), 1);
}

#[test]
fn unknown_community_short_circuits_without_generation() {
    let store = indexed_store();
    let llm = ScriptedLlm::new(vec![]);
    let engine = AnswerEngine::new(&store, &TopicEmbedder, &llm, AnswerConfig::default());

    let answer = engine.answer("Is Springbank safe?", &[]).expect("answer");
    assert_eq!(answer.status, AnswerStatus::InsufficientData);
    assert!(answer.answer_text.contains("Springbank"));
    assert!(answer.citations.is_empty());
    assert!(answer.viz_refs.is_empty());
    assert_eq!(llm.call_count(), 0, "generator must not run");
}

#[test]
fn missing_citation_markers_trigger_a_bounded_regeneration() {
    let store = indexed_store();
    let llm = ScriptedLlm::new(vec![
        Ok("an answer with no markers at all".to_string()),
        Ok("better [[cite:beltline/safety]]".to_string()),
    ]);
    let engine = AnswerEngine::new(&store, &TopicEmbedder, &llm, AnswerConfig::default());

    let answer = engine.answer("Is Beltline safe?", &[]).expect("answer");
    assert_eq!(answer.status, AnswerStatus::Delivered);
    assert_eq!(llm.call_count(), 2);
}

#[test]
fn citations_outside_the_context_are_rejected() {
    let store = indexed_store();
    // Both attempts cite a community that is not in the retrieved context
    // (the hard filter keeps mission out of a beltline question).
    let llm = ScriptedLlm::new(vec![
        Ok("claim [[cite:mission/safety]]".to_string()),
        Ok("claim again [[cite:mission/safety]]".to_string()),
    ]);
    let engine = AnswerEngine::new(&store, &TopicEmbedder, &llm, AnswerConfig::default());

    let err = engine.answer("Is Beltline safe?", &[]).unwrap_err();
    assert_eq!(err.code, "CITATION_INVALID");
    assert!(err.details.unwrap().contains("phase=generating"));
}

#[test]
fn retryable_generation_failures_are_bounded_then_surfaced() {
    let store = indexed_store();
    let llm = ScriptedLlm::new(vec![
        Err(AppError::retryable("GENERATION_FAILED", "generator down")),
        Err(AppError::retryable("GENERATION_FAILED", "generator down")),
    ]);
    let engine = AnswerEngine::new(&store, &TopicEmbedder, &llm, AnswerConfig::default());

    let err = engine.answer("Is Beltline safe?", &[]).unwrap_err();
    assert_eq!(err.code, "GENERATION_FAILED");
    assert!(err.retryable);
    assert_eq!(llm.call_count(), 2, "attempts are bounded by config");
}

#[test]
fn non_retryable_generation_failures_fail_fast() {
    let store = indexed_store();
    let llm = ScriptedLlm::new(vec![Err(AppError::new(
        "GENERATION_FAILED",
        "model rejected the prompt",
    ))]);
    let engine = AnswerEngine::new(&store, &TopicEmbedder, &llm, AnswerConfig::default());

    let err = engine.answer("Is Beltline safe?", &[]).unwrap_err();
    assert_eq!(err.code, "GENERATION_FAILED");
    assert_eq!(llm.call_count(), 1);
}

#[test]
fn batch_preserves_order_and_isolates_failures() {
    let store = indexed_store();
    let llm = ScriptedLlm::new(vec![
        Ok("fine [[cite:beltline/safety]]".to_string()),
        Err(AppError::retryable("GENERATION_FAILED", "generator down")),
        Err(AppError::retryable("GENERATION_FAILED", "generator down")),
    ]);
    let engine = AnswerEngine::new(&store, &TopicEmbedder, &llm, AnswerConfig::default());

    let questions = vec![
        "Is Beltline safe?".to_string(),
        "Is Springbank safe?".to_string(),
        "How bad is crime in Mission?".to_string(),
    ];
    let batch = engine
        .answer_batch(&questions, "2026-08-07T12:00:00Z")
        .expect("batch");

    assert_eq!(batch.len(), 3);
    for (item, q) in batch.iter().zip(&questions) {
        assert_eq!(&item.answer.question, q);
        assert_eq!(item.timestamp, "2026-08-07T12:00:00Z");
    }
    assert_eq!(batch[0].answer.status, AnswerStatus::Delivered);
    assert_eq!(batch[1].answer.status, AnswerStatus::InsufficientData);
    assert_eq!(batch[2].answer.status, AnswerStatus::Failed);
    assert!(batch[2].answer.answer_text.contains("GENERATION_FAILED"));

    // Delivered items always carry citations; failed ones never do.
    for item in &batch {
        match item.answer.status {
            AnswerStatus::Delivered => assert!(!item.answer.citations.is_empty()),
            _ => assert!(item.answer.citations.is_empty()),
        }
    }
}

#[test]
fn batch_rejects_non_rfc3339_timestamps() {
    let store = indexed_store();
    let llm = ScriptedLlm::new(vec![]);
    let engine = AnswerEngine::new(&store, &TopicEmbedder, &llm, AnswerConfig::default());
    let err = engine
        .answer_batch(&["Is Beltline safe?".to_string()], "yesterday")
        .unwrap_err();
    assert_eq!(err.code, "BATCH_TIMESTAMP_INVALID");
}
