use std::collections::BTreeMap;
use tracing::info;

use crate::config::{mask_secret, setting_or_env, validate_setting, SETTING_KEYS};
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::llm::ModelInfo;

/// Stored settings with API keys masked.
pub fn get_settings(store: &dyn Store) -> AppResult<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = store.get_setting(key)? {
            map.insert(key.to_string(), mask_secret(key, &value));
        }
    }
    Ok(map)
}

pub fn set_setting(store: &dyn Store, key: &str, value: &str) -> AppResult<()> {
    validate_setting(key, value)?;
    store.set_setting(key, value.trim())?;
    info!(key, "setting updated");
    Ok(())
}

pub fn delete_setting(store: &dyn Store, key: &str) -> AppResult<()> {
    if !SETTING_KEYS.contains(&key) {
        return Err(AppError::Validation(format!("Unknown setting key: {}", key)));
    }
    store.delete_setting(key)?;
    info!(key, "setting removed");
    Ok(())
}

fn model(id: &str, name: &str, provider: &str) -> ModelInfo {
    ModelInfo {
        id: id.into(),
        name: name.into(),
        provider: provider.into(),
    }
}

/// Models usable with the keys configured in the store or the environment.
pub fn get_available_models(store: &dyn Store) -> AppResult<Vec<ModelInfo>> {
    let mut models = Vec::new();

    if setting_or_env(store, "huggingface_api_key", "HUGGINGFACE_API_KEY")?.is_some() {
        models.extend([
            model(
                "huggingface/meta-llama/Llama-3.1-8B-Instruct",
                "Llama 3.1 8B Instruct",
                "Hugging Face",
            ),
            model(
                "huggingface/mistralai/Mistral-7B-Instruct-v0.3",
                "Mistral 7B Instruct",
                "Hugging Face",
            ),
        ]);
    }

    if setting_or_env(store, "openai_api_key", "OPENAI_API_KEY")?.is_some() {
        models.extend([
            model("openai/gpt-4o", "GPT-4o", "OpenAI"),
            model("openai/gpt-4o-mini", "GPT-4o Mini", "OpenAI"),
        ]);
    }

    if setting_or_env(store, "claude_api_key", "ANTHROPIC_API_KEY")?.is_some() {
        models.extend([
            model("claude/claude-sonnet-4-20250514", "Claude Sonnet 4", "Anthropic"),
            model("claude/claude-3-5-haiku-20241022", "Claude Haiku 3.5", "Anthropic"),
        ]);
    }

    // Local, no key needed
    models.extend([
        model("ollama/llama3", "Llama 3", "Ollama"),
        model("ollama/qwen2.5", "Qwen 2.5", "Ollama"),
    ]);

    Ok(models)
}
