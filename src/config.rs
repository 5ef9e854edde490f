use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Parser allow-list; unknown names are rejected at startup.
    #[serde(default = "default_enabled_parsers")]
    pub enabled_parsers: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_enabled_parsers() -> Vec<String> {
    vec!["text".to_string(), "pdf".to_string(), "docx".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestionConfig {
    /// Upper bound on chunks per embedding/upsert batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

fn default_max_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub dims: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (Ollama host, OpenAI-compatible gateways).
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub chat_model: String,
    #[serde(default = "default_classification_model")]
    pub classification_model: Option<String>,
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,
    #[serde(default)]
    pub classification_temperature: f32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_classification_model() -> Option<String> {
    None
}
fn default_chat_temperature() -> f32 {
    0.1
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Turns of history given to retrieval prompts.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Turns of history given to the intent classifier.
    #[serde(default = "default_classify_history_window")]
    pub classify_history_window: usize,
    #[serde(default = "default_search_k")]
    pub search_k: i64,
    #[serde(default = "default_names_k")]
    pub names_k: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            history_window: default_history_window(),
            classify_history_window: default_classify_history_window(),
            search_k: default_search_k(),
            names_k: default_names_k(),
        }
    }
}

fn default_confidence_threshold() -> f32 {
    0.7
}
fn default_history_window() -> usize {
    3
}
fn default_classify_history_window() -> usize {
    2
}
fn default_search_k() -> i64 {
    5
}
fn default_names_k() -> i64 {
    10
}

impl LlmConfig {
    /// Model used for intent classification; falls back to the chat model.
    pub fn classification_model(&self) -> &str {
        self.classification_model
            .as_deref()
            .unwrap_or(&self.chat_model)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }
    if config.ingestion.max_batch_size == 0 {
        anyhow::bail!("ingestion.max_batch_size must be > 0");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if !(0.0..=1.0).contains(&config.chat.confidence_threshold) {
        anyhow::bail!("chat.confidence_threshold must be in [0.0, 1.0]");
    }

    // Provider discriminants are validated here, once, not at call time.
    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or ollama.",
            other
        ),
    }
    match config.llm.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!("Unknown llm provider: '{}'. Must be openai or ollama.", other),
    }

    for name in &config.documents.enabled_parsers {
        match name.as_str() {
            "text" | "pdf" | "docx" => {}
            other => anyhow::bail!(
                "Unknown parser: '{}'. Available: text, pdf, docx.",
                other
            ),
        }
    }
    if config.documents.enabled_parsers.is_empty() {
        anyhow::bail!("documents.enabled_parsers must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> String {
        r#"
[db]
path = "/tmp/docchat.sqlite"

[documents]
root = "/tmp/docs"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536

[llm]
provider = "openai"
chat_model = "gpt-4o-mini"
"#
        .to_string()
    }

    #[test]
    fn defaults_applied() {
        let config: Config = toml::from_str(&minimal_toml()).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.chat.confidence_threshold, 0.7);
        assert_eq!(config.ingestion.max_batch_size, 100);
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.chunking.overlap_chars, 100);
        assert_eq!(config.llm.classification_model(), "gpt-4o-mini");
        assert_eq!(
            config.documents.enabled_parsers,
            vec!["text", "pdf", "docx"]
        );
    }

    #[test]
    fn unknown_provider_rejected() {
        let toml_str = minimal_toml().replace("provider = \"openai\"", "provider = \"cohere\"");
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_parser_rejected() {
        let mut config: Config = toml::from_str(&minimal_toml()).unwrap();
        config.documents.enabled_parsers = vec!["ocr".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_max() {
        let mut config: Config = toml::from_str(&minimal_toml()).unwrap();
        config.chunking.overlap_chars = config.chunking.max_chars;
        assert!(validate(&config).is_err());
    }
}
