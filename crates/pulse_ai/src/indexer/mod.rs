//! Indexing interface: raw profile documents in, per-community outcomes out.
//!
//! A malformed record fails only its own community; the rest of the run
//! proceeds. Store or embedding-service unavailability aborts the whole run
//! with a retryable error. Each community is written as delete-then-upsert
//! in one transaction, so no stale chunk survives a profile update.

use serde::Serialize;
use serde_json::Value;

use pulse_core::error::AppError;
use pulse_core::normalize::{normalize_profile, slugify};

use crate::chunker::{self, ChunkerConfig};
use crate::embeddings::Embedder;
use crate::store::ChunkStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSelection {
    /// Every profile document supplied.
    All,
    /// Only the named communities (names or slugs, normalized for matching).
    Communities(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunityIndexOutcome {
    pub community: String,
    pub chunk_count: u32,
    pub error: Option<AppError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub outcomes: Vec<CommunityIndexOutcome>,
    pub chunks_written: u32,
}

pub fn index_profiles(
    store: &mut ChunkStore,
    embedder: &dyn Embedder,
    model: &str,
    profiles: &[Value],
    selection: &IndexSelection,
    wipe: bool,
    cfg: &ChunkerConfig,
) -> Result<IndexReport, AppError> {
    if wipe {
        store.wipe()?;
    }

    let mut outcomes: Vec<CommunityIndexOutcome> = Vec::new();
    let mut chunks_written: u32 = 0;

    for raw in profiles {
        let declared = declared_slug(raw);
        let selected = match selection {
            IndexSelection::All => true,
            IndexSelection::Communities(names) => declared
                .as_deref()
                .is_some_and(|d| names.iter().any(|n| slugify(n) == d)),
        };
        if !selected {
            continue;
        }

        match normalize_profile(raw) {
            Ok(profile) => {
                let chunks = chunker::chunk_profile(&profile, cfg);
                match store.reindex_community(embedder, model, &profile.slug, &chunks) {
                    Ok(n) => {
                        chunks_written += n as u32;
                        outcomes.push(CommunityIndexOutcome {
                            community: profile.slug,
                            chunk_count: n as u32,
                            error: None,
                        });
                    }
                    // Service-level failure: nothing later in the batch can
                    // succeed either, so abort the run.
                    Err(e) if e.retryable || e.code == "INDEX_UNAVAILABLE" => return Err(e),
                    Err(e) => outcomes.push(CommunityIndexOutcome {
                        community: profile.slug,
                        chunk_count: 0,
                        error: Some(e),
                    }),
                }
            }
            // Record-level failure: isolate to this community.
            Err(e) => outcomes.push(CommunityIndexOutcome {
                community: declared.unwrap_or_else(|| "<unnamed>".to_string()),
                chunk_count: 0,
                error: Some(e),
            }),
        }
    }

    Ok(IndexReport {
        outcomes,
        chunks_written,
    })
}

fn declared_slug(raw: &Value) -> Option<String> {
    raw.get("slug")
        .and_then(Value::as_str)
        .map(slugify)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            raw.get("name")
                .and_then(Value::as_str)
                .map(slugify)
                .filter(|s| !s.is_empty())
        })
}
