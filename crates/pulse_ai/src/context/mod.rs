//! Bounded prompt-context assembly. Dedupes by chunk id, packs whole chunks
//! against the character budget in rank order, and derives the authoritative
//! citation list from what actually made it in.

pub mod prompts;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use pulse_core::domain::SectionTag;

use crate::chunker::model::VizRef;
use crate::retrieve::RetrievedChunk;

/// Provenance assertion: this (community, section) pair backs a stated fact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    pub community: String,
    pub section: SectionTag,
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Total chunk-text budget, in characters. Chunks are never truncated;
    /// one that would overflow is dropped whole.
    pub max_chars: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self { max_chars: 6000 }
    }
}

#[derive(Debug, Clone)]
pub struct AnswerContext {
    /// Included chunks, rank order preserved.
    pub chunks: Vec<RetrievedChunk>,
    /// Ordered, deduplicated (community, section) pairs actually included.
    /// This list is authoritative for the delivered answer.
    pub citations: Vec<Citation>,
    /// Deduplicated by locator, order of first appearance.
    pub viz_refs: Vec<VizRef>,
    pub total_chars: usize,
}

pub fn assemble(hits: Vec<RetrievedChunk>, cfg: &AssemblerConfig) -> AnswerContext {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut included: Vec<RetrievedChunk> = Vec::new();
    let mut total = 0usize;

    for hit in hits {
        if !seen_ids.insert(hit.chunk.chunk_id.clone()) {
            continue;
        }
        if total + hit.chunk.text.len() > cfg.max_chars {
            // Whole-chunk drop; a smaller lower-ranked chunk may still fit.
            continue;
        }
        total += hit.chunk.text.len();
        included.push(hit);
    }

    let mut citations: Vec<Citation> = Vec::new();
    for hit in &included {
        let c = Citation {
            community: hit.chunk.community.clone(),
            section: hit.chunk.section,
        };
        if !citations.contains(&c) {
            citations.push(c);
        }
    }

    let mut viz_refs: Vec<VizRef> = Vec::new();
    for hit in &included {
        if let Some(viz) = &hit.chunk.viz_ref {
            if !viz_refs.iter().any(|v| v.locator == viz.locator) {
                viz_refs.push(viz.clone());
            }
        }
    }

    AnswerContext {
        chunks: included,
        citations,
        viz_refs,
        total_chars: total,
    }
}

/// Render the context for the external generator, numbered blocks plus the
/// citation instruction payload.
pub fn render(ctx: &AnswerContext, question: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    for (i, hit) in ctx.chunks.iter().enumerate() {
        let mut block = format!(
            "[{}] ({} / {})",
            i + 1,
            hit.chunk.community,
            hit.chunk.section.as_str()
        );
        if let Some(viz) = &hit.chunk.viz_ref {
            block.push(' ');
            block.push_str(&viz.locator);
        }
        block.push('\n');
        block.push_str(&hit.chunk.text);
        if let Some(viz) = &hit.chunk.viz_ref {
            block.push_str(&format!("\nVisualization available: {}", viz.label));
        }
        blocks.push(block);
    }
    prompts::answer_prompt(question, &blocks.join("\n\n"))
}
