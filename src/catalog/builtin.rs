//! Built-in provider catalog

use super::{ModelSpec, ProviderSpec};

const fn model(id: &'static str, name: &'static str, tag: Option<&'static str>) -> ModelSpec {
    ModelSpec { id, name, tag }
}

pub(super) static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        id: "openai",
        name: "OpenAI",
        key_name: "openaiKey",
        models: &[
            model("gpt-4o", "GPT-4o", Some("LATEST")),
            model("gpt-4o-mini", "GPT-4o Mini", Some("Fast")),
            model("o1", "o1", Some("Reasoning")),
            model("o1-mini", "o1-mini", None),
            model("o1-preview", "o1 Preview", None),
            model("gpt-4-turbo", "GPT-4 Turbo", None),
            model("gpt-4-turbo-preview", "GPT-4 Turbo Preview", None),
            model("gpt-4", "GPT-4", None),
            model("gpt-3.5-turbo", "GPT-3.5 Turbo", Some("Economy")),
        ],
    },
    ProviderSpec {
        id: "claude",
        name: "Anthropic",
        key_name: "claudeKey",
        models: &[
            model("claude-sonnet-4-20250514", "Claude Sonnet 4", Some("LATEST")),
            model("claude-3-5-sonnet-20241022", "Claude 3.5 Sonnet", None),
            model("claude-3-5-haiku-20241022", "Claude 3.5 Haiku", Some("Fast")),
            model("claude-3-opus-20240229", "Claude 3 Opus", None),
            model("claude-3-sonnet-20240229", "Claude 3 Sonnet", None),
            model("claude-3-haiku-20240307", "Claude 3 Haiku", None),
        ],
    },
    ProviderSpec {
        id: "gemini",
        name: "Google",
        key_name: "geminiKey",
        models: &[
            model("gemini-2.5-flash-preview-05-20", "Gemini 2.5 Flash", Some("LATEST")),
            model("gemini-2.0-flash", "Gemini 2.0 Flash", None),
            model("gemini-2.0-flash-lite", "Gemini 2.0 Flash Lite", Some("Fast")),
            model("gemini-1.5-pro", "Gemini 1.5 Pro", None),
            model("gemini-1.5-flash", "Gemini 1.5 Flash", None),
            model("gemini-1.5-flash-8b", "Gemini 1.5 Flash 8B", Some("Economy")),
        ],
    },
    ProviderSpec {
        id: "grok",
        name: "xAI",
        key_name: "grokKey",
        models: &[
            model("grok-3", "Grok 3", Some("LATEST")),
            model("grok-3-fast", "Grok 3 Fast", Some("Fast")),
            model("grok-2-1212", "Grok 2", None),
            model("grok-2-vision-1212", "Grok 2 Vision", Some("Vision")),
            model("grok-beta", "Grok Beta", None),
        ],
    },
    ProviderSpec {
        id: "deepseek",
        name: "DeepSeek",
        key_name: "deepseekKey",
        models: &[
            model("deepseek-chat", "DeepSeek V3", Some("LATEST")),
            model("deepseek-reasoner", "DeepSeek R1", Some("Reasoning")),
            model("deepseek-coder", "DeepSeek Coder", Some("Code")),
        ],
    },
    ProviderSpec {
        id: "openrouter",
        name: "OpenRouter",
        key_name: "openrouterKey",
        models: &[
            model("openai/gpt-4o", "GPT-4o", Some("HOT")),
            model("openai/gpt-4o-mini", "GPT-4o Mini", Some("Fast")),
            model("openai/o1", "o1", Some("Reasoning")),
            model("openai/o1-mini", "o1-mini", None),
            model("anthropic/claude-sonnet-4", "Claude Sonnet 4", Some("HOT")),
            model("anthropic/claude-3.5-sonnet", "Claude 3.5 Sonnet", None),
            model("anthropic/claude-3.5-haiku", "Claude 3.5 Haiku", Some("Fast")),
            model("google/gemini-2.5-flash-preview", "Gemini 2.5 Flash", Some("NEW")),
            model("google/gemini-2.0-flash-001", "Gemini 2.0 Flash", None),
            model("google/gemini-1.5-pro", "Gemini 1.5 Pro", None),
            model("x-ai/grok-3", "Grok 3", Some("NEW")),
            model("deepseek/deepseek-chat", "DeepSeek V3", None),
            model("deepseek/deepseek-r1", "DeepSeek R1", Some("Reasoning")),
            model("meta-llama/llama-3.3-70b-instruct", "Llama 3.3 70B", Some("Open")),
            model("mistralai/mistral-large-2411", "Mistral Large", None),
            model("mistralai/codestral-latest", "Codestral", Some("Code")),
            model("qwen/qwen-2.5-72b-instruct", "Qwen 2.5 72B", None),
            model("qwen/qwq-32b-preview", "QwQ 32B", Some("Reasoning")),
            model("perplexity/sonar-pro", "Sonar Pro", Some("Search")),
            model("cohere/command-r-plus-08-2024", "Command R+", None),
        ],
    },
    ProviderSpec {
        id: "doubao",
        name: "豆包",
        key_name: "doubaoKey",
        models: &[
            model("doubao-1.5-pro-256k", "豆包 1.5 Pro 256K", Some("LATEST")),
            model("doubao-1.5-pro-32k", "豆包 1.5 Pro 32K", None),
            model("doubao-1-5-lite-32k", "豆包 1.5 Lite 32K", Some("Fast")),
            model("doubao-pro-256k", "豆包 Pro 256K", None),
            model("doubao-pro-128k", "豆包 Pro 128K", None),
            model("doubao-pro-32k", "豆包 Pro 32K", None),
        ],
    },
    ProviderSpec {
        id: "qwen",
        name: "通义千问",
        key_name: "qwenKey",
        models: &[
            model("qwen-max-latest", "Qwen Max", Some("LATEST")),
            model("qwen-plus-latest", "Qwen Plus", None),
            model("qwen-turbo-latest", "Qwen Turbo", Some("Fast")),
            model("qwen-long", "Qwen Long", Some("1M Context")),
            model("qwen-coder-plus", "Qwen Coder Plus", Some("Code")),
        ],
    },
    ProviderSpec {
        id: "kimi",
        name: "Kimi",
        key_name: "kimiKey",
        models: &[
            model("moonshot-v1-auto", "Moonshot Auto", Some("LATEST")),
            model("moonshot-v1-128k", "Moonshot 128K", None),
            model("moonshot-v1-32k", "Moonshot 32K", None),
            model("moonshot-v1-8k", "Moonshot 8K", Some("Fast")),
        ],
    },
    ProviderSpec {
        id: "glm",
        name: "智谱GLM",
        key_name: "glmKey",
        models: &[
            model("glm-4-plus", "GLM-4 Plus", Some("LATEST")),
            model("glm-4-0520", "GLM-4", None),
            model("glm-4-flash", "GLM-4 Flash", Some("Fast")),
            model("glm-4-air", "GLM-4 Air", None),
            model("glm-4-airx", "GLM-4 AirX", None),
            model("glm-4-long", "GLM-4 Long", Some("1M Context")),
        ],
    },
];
