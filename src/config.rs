use crate::error::AppError;

/// Configuration for the external chat-model endpoint.
///
/// The API key is supplied out-of-band (environment or `.env` file) and is
/// never written to the database or embedded in source.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelConfig {
    /// Load model configuration from the environment.
    ///
    /// Required: `OPENAI_API_KEY`. Optional overrides: `OPENAI_BASE_URL`,
    /// `STILLPOINT_MODEL`.
    pub fn from_env() -> Result<Self, AppError> {
        // Pick up a local .env in dev; a missing file is fine.
        dotenvy::dotenv().ok();

        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            AppError::Internal(
                "OPENAI_API_KEY is not set. Provide it via the environment or a .env file."
                    .into(),
            )
        })?;

        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model =
            std::env::var("STILLPOINT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

        Ok(Self {
            api_key,
            base_url,
            model,
            // A bit conversational but still steady; tight token cap keeps
            // replies short and back-and-forth.
            temperature: 0.45,
            max_tokens: 350,
        })
    }
}
