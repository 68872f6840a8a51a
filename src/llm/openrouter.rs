//! OpenRouter adapter
//!
//! OpenRouter speaks the OpenAI format but wants attribution headers.

use super::openai_compat::{OpenAiCompatAdapter, OpenAiCompatConfig, OPENROUTER_CHAT_URL};
use crate::config::Config;

pub fn openrouter_adapter(config: &Config) -> OpenAiCompatAdapter {
    let url = config
        .base_url_for("openrouter")
        .unwrap_or(OPENROUTER_CHAT_URL);

    OpenAiCompatAdapter::new(
        OpenAiCompatConfig::new("openrouter", url)
            .with_header("HTTP-Referer", &config.openrouter.site_url)
            .with_header("X-Title", &config.openrouter.app_name),
    )
}
