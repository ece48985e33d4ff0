//! Query-time ranking: black-box similarity from the store, then an explicit
//! ordered list of named, deterministic score adjustments. Boosts nudge
//! ranking; they never exclude a section outright.

pub mod names;

use serde::{Deserialize, Serialize};

use pulse_core::domain::SectionTag;
use pulse_core::error::AppError;

use crate::chunker::model::Chunk;
use crate::embeddings::Embedder;
use crate::store::ChunkStore;

/// One named ranking adjustment: when any keyword appears in the question,
/// chunks of `section` gain `weight` on top of their similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionBoost {
    pub name: String,
    pub section: SectionTag,
    pub keywords: Vec<String>,
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum hits returned to the assembler.
    pub top_k: usize,
    /// Floor an unanchored question must clear before hits count as support.
    pub min_score: f32,
    /// Per-token edit tolerance for community-name matching.
    pub fuzzy_max_edits: usize,
    /// Applied in order; policy values, not structure.
    pub boosts: Vec<SectionBoost>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            min_score: 0.25,
            fuzzy_max_edits: 1,
            boosts: default_boosts(),
        }
    }
}

fn boost(name: &str, section: SectionTag, keywords: &[&str], weight: f32) -> SectionBoost {
    SectionBoost {
        name: name.to_string(),
        section,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        weight,
    }
}

fn default_boosts() -> Vec<SectionBoost> {
    vec![
        boost(
            "safety-keywords",
            SectionTag::Safety,
            &["safe", "safer", "safest", "safety", "crime", "criminal", "dangerous", "danger", "theft"],
            0.15,
        ),
        boost(
            "schools-keywords",
            SectionTag::Schools,
            &["school", "schools", "education"],
            0.15,
        ),
        boost(
            "housing-keywords",
            SectionTag::Housing,
            &["housing", "house", "home", "price", "value", "assessed", "afford"],
            0.15,
        ),
        boost(
            "transit-keywords",
            SectionTag::Transit,
            &["transit", "bus", "train", "lrt", "commute"],
            0.15,
        ),
        boost(
            "service-requests-keywords",
            SectionTag::ServiceRequests,
            &["311", "graffiti", "pothole", "snow removal", "service request"],
            0.15,
        ),
        boost(
            "demographics-keywords",
            SectionTag::Demographics,
            &["demographics", "income", "median age", "population", "renter", "owner"],
            0.15,
        ),
        boost(
            "business-keywords",
            SectionTag::Business,
            &["business", "businesses", "permit", "development", "license", "licence"],
            0.15,
        ),
        boost(
            "amenities-keywords",
            SectionTag::Amenities,
            &["amenity", "amenities", "restaurant", "grocery", "cafe", "park", "landmark"],
            0.15,
        ),
    ]
}

/// A chunk inside one query's result set.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub rank: usize,
}

/// Retrieval outcome: ranked support, or an explicit signal that the index
/// holds nothing for this question (listing unknown community names when
/// that is the reason).
#[derive(Debug, Clone)]
pub enum Retrieval {
    Hits(Vec<RetrievedChunk>),
    Insufficient { missing: Vec<String> },
}

pub fn retrieve(
    store: &ChunkStore,
    embedder: &dyn Embedder,
    model: &str,
    question: &str,
    hints: &[String],
    cfg: &RetrievalConfig,
) -> Result<Retrieval, AppError> {
    let q = question.trim();
    if q.is_empty() {
        return Err(AppError::new("RETRIEVAL_FAILED", "Question must not be empty"));
    }

    let registry = store.list_communities()?;
    let matches = names::extract_communities(q, hints, &registry, cfg.fuzzy_max_edits);

    // Communities were named but none exist in the registry: report what is
    // missing rather than returning look-alike chunks.
    if matches.resolved.is_empty() && !matches.unresolved.is_empty() {
        return Ok(Retrieval::Insufficient {
            missing: matches.unresolved,
        });
    }

    let active = active_boosts(q, &cfg.boosts);

    let hits: Vec<(Chunk, f32)> = if matches.resolved.len() == 2 {
        // Comparison question: rank each side independently, then interleave
        // so neither community dominates on raw similarity alone.
        let mut sides: Vec<std::vec::IntoIter<(Chunk, f32)>> = Vec::new();
        for community in &matches.resolved {
            let filter = [community.clone()];
            let mut side = store.search(embedder, model, q, cfg.top_k, Some(&filter))?;
            apply_boosts(&mut side, &active);
            sort_hits(&mut side);
            sides.push(side.into_iter());
        }
        let mut merged = Vec::new();
        loop {
            let mut took_any = false;
            for side in sides.iter_mut() {
                if merged.len() >= cfg.top_k {
                    break;
                }
                if let Some(hit) = side.next() {
                    merged.push(hit);
                    took_any = true;
                }
            }
            if !took_any || merged.len() >= cfg.top_k {
                break;
            }
        }
        merged
    } else {
        // A hard community filter applies only when one or two communities
        // are named; broader questions rank the whole collection.
        let filter: Option<&[String]> = match matches.resolved.len() {
            1 => Some(&matches.resolved),
            _ => None,
        };
        // Fetch headroom so boosts can promote past the raw-similarity cut.
        let fetch_k = cfg.top_k.saturating_mul(2).max(cfg.top_k);
        let mut all = store.search(embedder, model, q, fetch_k, filter)?;
        apply_boosts(&mut all, &active);
        sort_hits(&mut all);
        all.truncate(cfg.top_k);
        all
    };

    if hits.is_empty() {
        return Ok(Retrieval::Insufficient {
            missing: matches.unresolved,
        });
    }
    if matches.resolved.is_empty() {
        let best = hits.first().map(|(_, s)| *s).unwrap_or(0.0);
        if best < cfg.min_score {
            return Ok(Retrieval::Insufficient {
                missing: matches.unresolved,
            });
        }
    }

    Ok(Retrieval::Hits(
        hits.into_iter()
            .enumerate()
            .map(|(rank, (chunk, score))| RetrievedChunk { chunk, score, rank })
            .collect(),
    ))
}

fn active_boosts<'a>(question: &str, boosts: &'a [SectionBoost]) -> Vec<&'a SectionBoost> {
    let normalized = format!(" {} ", names::normalize_tokens(question).join(" "));
    boosts
        .iter()
        .filter(|b| {
            b.keywords
                .iter()
                .any(|k| normalized.contains(&format!(" {k} ")))
        })
        .collect()
}

fn apply_boosts(hits: &mut [(Chunk, f32)], active: &[&SectionBoost]) {
    for (chunk, score) in hits.iter_mut() {
        for b in active {
            if b.section == chunk.section {
                *score += b.weight;
            }
        }
    }
}

/// Score descending; ties by richer metrics, then ascending chunk id.
fn sort_hits(hits: &mut [(Chunk, f32)]) {
    hits.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.0.metrics_density().cmp(&a.0.metrics_density()))
            .then_with(|| a.0.chunk_id.cmp(&b.0.chunk_id))
    });
}
