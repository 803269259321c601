use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_url")]
    pub base_url: String,
    #[serde(default = "default_lang")]
    pub lang: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            lang: default_lang(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://www.filmaffinity.com".to_string()
}
fn default_lang() -> String {
    "es".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// CSS selector for review text nodes. Varies with the target page
    /// layout and is not a stable contract.
    #[serde(default = "default_selector")]
    pub selector: String,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            selector: default_selector(),
            max_chars: default_max_chars(),
            timeout_secs: default_scrape_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}
fn default_selector() -> String {
    "td.rev-text".to_string()
}
fn default_max_chars() -> usize {
    5000
}
fn default_scrape_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Input content is truncated to this many characters before it is
    /// placed into a prompt template.
    #[serde(default = "default_prompt_budget")]
    pub prompt_budget: usize,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_llm_model(),
            prompt_budget: default_prompt_budget(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "stablelm2".to_string()
}
fn default_prompt_budget() -> usize {
    1000
}
fn default_llm_timeout() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_embed_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_embed_model(),
            dims: default_dims(),
            timeout_secs: default_embed_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_embed_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_embed_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            chunk_chars: default_chunk_chars(),
            overlap_chars: default_overlap_chars(),
            top_k: default_top_k(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/reviews.idx")
}
fn default_chunk_chars() -> usize {
    500
}
fn default_overlap_chars() -> usize {
    100
}
fn default_top_k() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub space_did: String,
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    #[serde(default = "default_gateway_suffix")]
    pub gateway_suffix: String,
    #[serde(default = "default_w3_bin")]
    pub w3_bin: String,
    #[serde(default = "default_car_bin")]
    pub car_bin: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

fn default_bridge_url() -> String {
    "https://up.storacha.network/bridge".to_string()
}
fn default_gateway_suffix() -> String {
    "ipfs.w3s.link".to_string()
}
fn default_w3_bin() -> String {
    "w3".to_string()
}
fn default_car_bin() -> String {
    "ipfs-car".to_string()
}
fn default_token_ttl() -> i64 {
    24
}
fn default_storage_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7400".to_string()
}

impl Config {
    /// Minimal config for tests and commands that don't need a config file.
    pub fn minimal() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            scrape: ScrapeConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            storage: None,
            server: ServerConfig::default(),
        }
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
    if config.scrape.max_chars == 0 {
        anyhow::bail!("scrape.max_chars must be > 0");
    }

    if config.llm.prompt_budget == 0 {
        anyhow::bail!("llm.prompt_budget must be > 0");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }

    if config.index.chunk_chars == 0 {
        anyhow::bail!("index.chunk_chars must be > 0");
    }

    if config.index.overlap_chars >= config.index.chunk_chars {
        anyhow::bail!(
            "index.overlap_chars ({}) must be smaller than index.chunk_chars ({})",
            config.index.overlap_chars,
            config.index.chunk_chars
        );
    }

    if config.index.top_k < 1 {
        anyhow::bail!("index.top_k must be >= 1");
    }

    if let Some(storage) = &config.storage {
        if storage.space_did.is_empty() {
            anyhow::bail!("storage.space_did must not be empty");
        }
        if storage.token_ttl_hours < 1 {
            anyhow::bail!("storage.token_ttl_hours must be >= 1");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.scrape.max_chars, 5000);
        assert_eq!(config.llm.prompt_budget, 1000);
        assert_eq!(config.index.chunk_chars, 500);
        assert_eq!(config.index.overlap_chars, 100);
        assert_eq!(config.index.top_k, 2);
        assert!(config.storage.is_none());
    }

    #[test]
    fn test_rejects_zero_max_chars() {
        let err = parse("[scrape]\nmax_chars = 0\n").unwrap_err();
        assert!(err.to_string().contains("scrape.max_chars"));
    }

    #[test]
    fn test_rejects_overlap_not_below_chunk() {
        let err = parse("[index]\nchunk_chars = 100\noverlap_chars = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn test_rejects_zero_dims() {
        let err = parse("[embedding]\ndims = 0\n").unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_storage_requires_space_did() {
        let err = parse("[storage]\nspace_did = \"\"\n").unwrap_err();
        assert!(err.to_string().contains("space_did"));
    }

    #[test]
    fn test_full_config_parses() {
        let content = r#"
[catalog]
base_url = "https://www.filmaffinity.com"
lang = "en"

[scrape]
selector = "td.rev-text"
max_chars = 2000

[llm]
model = "mistral"

[storage]
space_did = "did:key:z6Mk"
"#;
        let config = parse(content).unwrap();
        assert_eq!(config.catalog.lang, "en");
        assert_eq!(config.scrape.max_chars, 2000);
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.storage.unwrap().gateway_suffix, "ipfs.w3s.link");
    }
}
