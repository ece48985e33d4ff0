use pulse_core::error::AppError;

/// HTTP client handle for a local Ollama server hosting both the embedding
/// and generation models. Strictly limited to `127.0.0.1`; remote endpoints
/// are rejected at construction.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://127.0.0.1:") && base_url != "http://127.0.0.1" {
            return Err(AppError::new(
                "AI_REMOTE_NOT_ALLOWED",
                "Ollama base URL must be localhost (127.0.0.1)",
            )
            .with_details(format!("base_url={base_url}")));
        }
        if let Some(port) = base_url.strip_prefix("http://127.0.0.1:") {
            match port.parse::<u32>() {
                Ok(p) if (1..=65535).contains(&p) => {}
                _ => {
                    return Err(AppError::new(
                        "AI_REMOTE_NOT_ALLOWED",
                        "Ollama base URL port is invalid",
                    )
                    .with_details(format!("base_url={base_url}")));
                }
            }
        }

        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = ureq::get(&url)
            .timeout(std::time::Duration::from_millis(800))
            .call();

        match resp {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(
                AppError::new("OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(AppError::retryable(
                "OLLAMA_UNREACHABLE",
                "Failed to reach Ollama on 127.0.0.1",
            )
            .with_details(e.to_string())),
        }
    }
}
