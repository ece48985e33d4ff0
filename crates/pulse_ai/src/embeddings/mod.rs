use pulse_core::error::AppError;

/// Black-box embedding function: text in, vector out. The pipeline never
/// inspects the vector beyond its dimension.
pub trait Embedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod ollama_embed;
