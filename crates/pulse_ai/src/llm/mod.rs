use pulse_core::error::AppError;

/// Black-box text generator: prompt in, prose out. The orchestrator owns
/// retries; implementations just surface `retryable` on transport failures.
pub trait Llm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError>;
}

pub mod ollama_llm;
