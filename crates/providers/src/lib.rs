pub mod gemini;
pub mod models;

use async_trait::async_trait;

use shared::chat::ChatTurn;
use shared::error::GatewayError;
use shared::messages::ChatContext;
use shared::settings::Settings;

pub use gemini::{GeminiGateway, DEFAULT_BASE_URL};
pub use models::list_models;

/// The seam between the messaging router and the generation endpoint.
///
/// One network call per invocation; no retry, no streaming. Settings are
/// passed per call so a save that lands mid-flight affects the next
/// invocation, not the current one.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Apply an instruction to a piece of selected text.
    async fn generate(
        &self,
        settings: &Settings,
        instruction: &str,
        input_text: &str,
    ) -> Result<String, GatewayError>;

    /// Continue a conversation with a follow-up message.
    async fn converse(
        &self,
        settings: &Settings,
        history: &[ChatTurn],
        new_message: &str,
        context: &ChatContext,
    ) -> Result<String, GatewayError>;
}
