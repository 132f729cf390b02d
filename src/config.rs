//! Settings stored in the `settings` table, with environment fallbacks for
//! secrets, and the provider/pipeline configuration derived from them.

use std::time::Duration;
use tracing::warn;

use crate::db::{DbResult, Store};
use crate::error::{AppError, AppResult};
use crate::llm::claude::ClaudeConfig;
use crate::llm::openai::OpenAiConfig;
use crate::llm::{
    ModelClient, Provider, CLAUDE_BASE_URL, HUGGINGFACE_BASE_URL, OLLAMA_HOST, OPENAI_BASE_URL,
};

pub const SETTING_KEYS: &[&str] = &[
    "llm_model",
    "huggingface_api_key",
    "huggingface_base_url",
    "openai_api_key",
    "openai_base_url",
    "claude_api_key",
    "claude_base_url",
    "ollama_host",
    "fast_extraction",
    "request_timeout_secs",
];

pub const DEFAULT_MODEL: &str = "huggingface/meta-llama/Llama-3.1-8B-Instruct";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Skip PDF decoding and store a placeholder instead.
    pub fast_extraction: bool,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fast_extraction: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl PipelineOptions {
    pub fn load(store: &dyn Store) -> DbResult<Self> {
        let mut options = Self::default();

        if let Some(value) = setting_or_env(store, "fast_extraction", "PDF_CHAT_FAST_EXTRACTION")? {
            options.fast_extraction = parse_bool(&value).unwrap_or_else(|| {
                warn!(value = %value, "ignoring invalid fast_extraction setting");
                false
            });
        }

        if let Some(value) = store.get_setting("request_timeout_secs")? {
            match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => options.request_timeout = Duration::from_secs(secs),
                _ => warn!(value = %value, "ignoring invalid request_timeout_secs setting"),
            }
        }

        Ok(options)
    }
}

fn env_setting(env_key: &str) -> Option<String> {
    std::env::var(env_key).ok().filter(|v| !v.trim().is_empty())
}

/// Stored setting first, then the environment.
pub(crate) fn setting_or_env(store: &dyn Store, key: &str, env_key: &str) -> DbResult<Option<String>> {
    Ok(store.get_setting(key)?.or_else(|| env_setting(env_key)))
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Check a value before it is written to the settings table.
pub fn validate_setting(key: &str, value: &str) -> AppResult<()> {
    if !SETTING_KEYS.contains(&key) {
        return Err(AppError::Validation(format!("Unknown setting key: {}", key)));
    }
    match key {
        "fast_extraction" if parse_bool(value).is_none() => Err(AppError::Validation(format!(
            "fast_extraction must be true or false, got '{}'",
            value
        ))),
        "request_timeout_secs" if !matches!(value.trim().parse::<u64>(), Ok(n) if n > 0) => {
            Err(AppError::Validation(format!(
                "request_timeout_secs must be a positive integer, got '{}'",
                value
            )))
        }
        _ => Ok(()),
    }
}

/// Mask API keys for display.
pub fn mask_secret(key: &str, value: &str) -> String {
    if key.ends_with("_api_key") && value.chars().count() > 8 {
        let chars: Vec<char> = value.chars().collect();
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        value.to_string()
    }
}

/// Resolve an LLM client from a model string like "huggingface/meta-llama/...",
/// "openai/gpt-4o-mini", "claude/..." or "ollama/...". Unprefixed models go to Hugging Face.
pub fn resolve_provider(model: &str, store: &dyn Store) -> AppResult<ModelClient> {
    let setting_or = |key: &str, default: &str| -> DbResult<String> {
        Ok(store
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    };

    if let Some(model_id) = model.strip_prefix("ollama/") {
        let host = setting_or("ollama_host", OLLAMA_HOST)?;
        Ok(ModelClient::new(Provider::ollama(host), model_id))
    } else if let Some(model_id) = model.strip_prefix("claude/") {
        let api_key = setting_or_env(store, "claude_api_key", "ANTHROPIC_API_KEY")?
            .ok_or_else(|| AppError::Validation("Claude API key not configured".into()))?;
        let base_url = setting_or("claude_base_url", CLAUDE_BASE_URL)?;
        Ok(ModelClient::new(
            Provider::Claude(ClaudeConfig { api_key, base_url }),
            model_id,
        ))
    } else if let Some(model_id) = model.strip_prefix("openai/") {
        let api_key = setting_or_env(store, "openai_api_key", "OPENAI_API_KEY")?
            .ok_or_else(|| AppError::Validation("OpenAI API key not configured".into()))?;
        let base_url = setting_or("openai_base_url", OPENAI_BASE_URL)?;
        Ok(ModelClient::new(
            Provider::OpenAi(OpenAiConfig { api_key, base_url }),
            model_id,
        ))
    } else {
        let model_id = model.strip_prefix("huggingface/").unwrap_or(model);
        let api_key = setting_or_env(store, "huggingface_api_key", "HUGGINGFACE_API_KEY")?
            .ok_or_else(|| AppError::Validation("Hugging Face API key not configured".into()))?;
        let base_url = setting_or("huggingface_base_url", HUGGINGFACE_BASE_URL)?;
        Ok(ModelClient::new(
            Provider::HuggingFace(OpenAiConfig { api_key, base_url }),
            model_id,
        ))
    }
}

/// Model from an explicit override, the `llm_model` setting, or the default.
pub fn configured_model(store: &dyn Store, override_model: Option<&str>) -> DbResult<String> {
    if let Some(model) = override_model {
        return Ok(model.to_string());
    }
    Ok(store
        .get_setting("llm_model")?
        .unwrap_or_else(|| DEFAULT_MODEL.to_string()))
}
