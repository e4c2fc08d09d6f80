pub mod provider;

use async_trait::async_trait;

pub use provider::OpenAiProvider;

use crate::context::ContextMessage;
use crate::error::AppError;

/// Abstraction over the external chat model.
///
/// The session controller is the only caller. Implementations receive the
/// fully assembled context (persona + profile + history) and return the
/// assistant's reply text; any network/auth/rate-limit failure surfaces as
/// `AppError::Upstream`.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn generate_reply(&self, context: &[ContextMessage]) -> Result<String, AppError>;
}
