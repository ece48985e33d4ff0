//! Question-to-answer orchestration.
//!
//! Phases: `Received -> Retrieving -> Assembling -> Generating -> Delivered`,
//! with terminal `Failed` reachable from any step. An insufficient-data
//! retrieval short-circuits straight to delivery with the fixed-form answer,
//! never touching the generator. External failures surface as errors with
//! `retryable` set; a partial answer is never delivered.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use pulse_core::error::AppError;

use crate::chunker::model::VizRef;
use crate::context::{self, AssemblerConfig, Citation};
use crate::embeddings::Embedder;
use crate::guardrails;
use crate::llm::Llm;
use crate::retrieve::{self, Retrieval, RetrievalConfig};
use crate::store::ChunkStore;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Delivered,
    InsufficientData,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnswerPhase {
    Received,
    Retrieving,
    Assembling,
    Generating,
}

impl AnswerPhase {
    fn next(self) -> AnswerPhase {
        match self {
            AnswerPhase::Received => AnswerPhase::Retrieving,
            AnswerPhase::Retrieving => AnswerPhase::Assembling,
            AnswerPhase::Assembling => AnswerPhase::Generating,
            AnswerPhase::Generating => AnswerPhase::Generating,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            AnswerPhase::Received => "received",
            AnswerPhase::Retrieving => "retrieving",
            AnswerPhase::Assembling => "assembling",
            AnswerPhase::Generating => "generating",
        }
    }
}

/// Terminal per-question result. `citations` is never empty when `status`
/// is `Delivered`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub viz_refs: Vec<VizRef>,
    pub status: AnswerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchAnswer {
    pub answer: Answer,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct AnswerConfig {
    pub embed_model: String,
    pub generate_model: String,
    pub retrieval: RetrievalConfig,
    pub assembler: AssemblerConfig,
    /// Bounded attempts for generation (transport retries and contract
    /// regeneration both count against it).
    pub max_generation_attempts: u32,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.2".to_string(),
            retrieval: RetrievalConfig::default(),
            assembler: AssemblerConfig::default(),
            max_generation_attempts: 2,
        }
    }
}

pub struct AnswerEngine<'a> {
    store: &'a ChunkStore,
    embedder: &'a dyn Embedder,
    llm: &'a dyn Llm,
    config: AnswerConfig,
}

impl<'a> AnswerEngine<'a> {
    pub fn new(
        store: &'a ChunkStore,
        embedder: &'a dyn Embedder,
        llm: &'a dyn Llm,
        config: AnswerConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            config,
        }
    }

    pub fn answer(&self, question: &str, hints: &[String]) -> Result<Answer, AppError> {
        let mut phase = AnswerPhase::Received;

        phase = phase.next();
        let retrieval = retrieve::retrieve(
            self.store,
            self.embedder,
            &self.config.embed_model,
            question,
            hints,
            &self.config.retrieval,
        )
        .map_err(|e| at_phase(phase, e))?;

        let hits = match retrieval {
            Retrieval::Insufficient { missing } => {
                return Ok(insufficient(question, &missing));
            }
            Retrieval::Hits(hits) => hits,
        };

        phase = phase.next();
        let ctx = context::assemble(hits, &self.config.assembler);
        if ctx.chunks.is_empty() || ctx.citations.is_empty() {
            // Budget dropped everything; nothing citable survives.
            return Ok(insufficient(question, &[]));
        }
        let prompt = context::render(&ctx, question);

        phase = phase.next();
        let answer_text = self
            .generate_with_retries(&prompt, &ctx.citations)
            .map_err(|e| at_phase(phase, e))?;

        Ok(Answer {
            question: question.to_string(),
            answer_text,
            citations: ctx.citations,
            viz_refs: ctx.viz_refs,
            status: AnswerStatus::Delivered,
        })
    }

    /// Ordered batch run with a shared caller-supplied RFC3339 timestamp.
    /// A failing question becomes a `Failed` item; the rest proceed.
    pub fn answer_batch(
        &self,
        questions: &[String],
        timestamp: &str,
    ) -> Result<Vec<BatchAnswer>, AppError> {
        OffsetDateTime::parse(timestamp, &Rfc3339).map_err(|e| {
            AppError::new(
                "BATCH_TIMESTAMP_INVALID",
                "Batch timestamp must be RFC3339",
            )
            .with_details(format!("value={timestamp}; err={e}"))
        })?;

        let mut out = Vec::with_capacity(questions.len());
        for question in questions {
            let answer = match self.answer(question, &[]) {
                Ok(a) => a,
                Err(e) => Answer {
                    question: question.clone(),
                    answer_text: format!("[{}] {}", e.code, e.message),
                    citations: Vec::new(),
                    viz_refs: Vec::new(),
                    status: AnswerStatus::Failed,
                },
            };
            out.push(BatchAnswer {
                answer,
                timestamp: timestamp.to_string(),
            });
        }
        Ok(out)
    }

    fn generate_with_retries(
        &self,
        prompt: &str,
        allowed: &[Citation],
    ) -> Result<String, AppError> {
        let attempts = self.config.max_generation_attempts.max(1);
        let mut last: Option<AppError> = None;
        for _ in 0..attempts {
            match self.llm.generate(&self.config.generate_model, prompt) {
                Ok(text) => match guardrails::enforce_citations(&text, allowed) {
                    Ok(()) => return Ok(text),
                    // Contract violation: regenerate within the budget.
                    Err(e) => last = Some(e),
                },
                Err(e) if e.retryable => last = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| {
            AppError::new("GENERATION_FAILED", "Generation attempts exhausted")
        }))
    }
}

fn insufficient(question: &str, missing: &[String]) -> Answer {
    Answer {
        question: question.to_string(),
        answer_text: guardrails::insufficient_answer(missing),
        citations: Vec::new(),
        viz_refs: Vec::new(),
        status: AnswerStatus::InsufficientData,
    }
}

fn at_phase(phase: AnswerPhase, e: AppError) -> AppError {
    let details = match &e.details {
        Some(d) => format!("{d}; phase={}", phase.as_str()),
        None => format!("phase={}", phase.as_str()),
    };
    e.with_details(details)
}
