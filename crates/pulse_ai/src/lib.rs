//! Community profile Q&A pipeline.
//!
//! ```text
//! raw profile ──► pulse_core::normalize ──► chunker ──► store (index time)
//!
//! question ──► retrieve ──► context ──► answer ──► external generator
//!                 │                        │
//!                 └─ community registry    └─ citations + viz refs
//! ```
//!
//! The embedding model and text generator are black boxes behind the
//! [`embeddings::Embedder`] and [`llm::Llm`] traits; Ollama-backed
//! implementations live in [`embeddings::ollama_embed`] and
//! [`llm::ollama_llm`].

pub mod answer;
pub mod chunker;
pub mod context;
pub mod embeddings;
pub mod guardrails;
pub mod indexer;
pub mod llm;
pub mod ollama;
pub mod retrieve;
pub mod store;
