pub mod claude;
pub mod error;
pub mod openai;
pub mod traits;
pub mod util;

pub use error::AiError;
pub use traits::{ChatClient, ChatRequest, Message, MessageRole};

use std::sync::Arc;

/// Build a chat client for the configured provider name.
/// Unknown names fall back to OpenAI.
pub fn build_chat_client(provider: &str, api_key: &str, model: Option<&str>) -> Arc<dyn ChatClient> {
    match provider {
        "anthropic" | "claude" => Arc::new(claude::Claude::new(
            api_key,
            model.unwrap_or(claude::DEFAULT_MODEL),
        )),
        _ => Arc::new(openai::OpenAi::new(
            api_key,
            model.unwrap_or(openai::DEFAULT_MODEL),
        )),
    }
}
