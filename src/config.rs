use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::{framework_slug, FrameworkSpec};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub frameworks: Vec<FrameworkSpec>,
    #[serde(default)]
    pub provider: ProviderConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub load: LoadConfig,
    pub index: IndexConfig,
}

/// Remote documentation-extraction provider settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the bearer credential. The value itself
    /// never lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.context7.ai".to_string()
}
fn default_api_key_env() -> String {
    "CONTEXT7_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `http` (Chroma-style backend) or `memory` (in-process, volatile).
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend() -> String {
    "http".to_string()
}
fn default_collection() -> String {
    "documentation_library".to_string()
}
fn default_store_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    250
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// Similarity query limit; kept small to bound cost.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_response_tokens: default_max_response_tokens(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_max_response_tokens() -> usize {
    800
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoadConfig {
    /// Maximum frameworks loaded in parallel within one priority tier.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Well-known path the manifest JSON is rewritten to on each build.
    pub manifest_path: PathBuf,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }
    if config.query.top_k == 0 {
        anyhow::bail!("query.top_k must be >= 1");
    }
    if config.query.max_response_tokens == 0 {
        anyhow::bail!("query.max_response_tokens must be > 0");
    }
    if config.load.concurrency == 0 {
        anyhow::bail!("load.concurrency must be >= 1");
    }

    match config.store.backend.as_str() {
        "memory" => {}
        "http" => {
            if config.store.url.is_none() {
                anyhow::bail!("store.url must be set when store.backend is 'http'");
            }
        }
        other => anyhow::bail!("Unknown store backend: '{}'. Must be http or memory.", other),
    }

    // Chunk ids are keyed by slug, so names that slug identically would
    // silently overwrite each other's chunks.
    let mut seen: HashMap<String, &str> = HashMap::new();
    for spec in &config.frameworks {
        if spec.name.trim().is_empty() {
            anyhow::bail!("framework name must not be empty");
        }
        if let Some(existing) = seen.insert(framework_slug(&spec.name), &spec.name) {
            anyhow::bail!(
                "framework names '{}' and '{}' produce the same chunk-id slug",
                existing,
                spec.name
            );
        }
        if spec.url.is_none() && spec.path.is_none() {
            anyhow::bail!(
                "framework '{}' has neither url nor path configured",
                spec.name
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
[store]
backend = "memory"

[index]
manifest_path = "/tmp/manifest.json"

[[frameworks]]
name = "Redis"
url = "https://redis.io/docs/"
priority = 1
"#;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.frameworks.len(), 1);
        assert_eq!(config.frameworks[0].priority, 1);
        assert_eq!(config.chunking.max_tokens, 250);
        assert_eq!(config.query.top_k, 4);
        assert_eq!(config.provider.api_key_env, "CONTEXT7_API_KEY");
    }

    #[test]
    fn duplicate_framework_names_rejected() {
        let toml_str = format!(
            "{}\n[[frameworks]]\nname = \"Redis\"\npath = \"/docs/redis.md\"\n",
            MINIMAL
        );
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("same chunk-id slug"));
    }

    #[test]
    fn slug_colliding_framework_names_rejected() {
        // "Foo Bar" and "foo-bar" both slug to "foo-bar" and would overwrite
        // each other's chunks.
        let toml_str = format!(
            "{}\n[[frameworks]]\nname = \"Foo Bar\"\npath = \"/docs/a.md\"\n\
             [[frameworks]]\nname = \"foo-bar\"\npath = \"/docs/b.md\"\n",
            MINIMAL
        );
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("same chunk-id slug"));
    }

    #[test]
    fn framework_without_source_rejected() {
        let toml_str = format!("{}\n[[frameworks]]\nname = \"Vite\"\n", MINIMAL);
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("neither url nor path"));
    }

    #[test]
    fn http_backend_requires_url() {
        let toml_str = MINIMAL.replace("backend = \"memory\"", "backend = \"http\"");
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("store.url"));
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let toml_str = format!("{}\n[chunking]\nmax_tokens = 0\n", MINIMAL);
        let err = parse(&toml_str).unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }
}
