//! Layered configuration: built-in defaults, an optional YAML/JSON file, then environment
//! variables (after `.env` is loaded through `dotenvy`). The resulting [`AppConfig`] is
//! validated once at startup and handed to the services explicitly.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const CONFIG_FILE_NAMES: [&str; 3] = ["config.yaml", "config.yml", "config.json"];
const LOCAL_HOSTS: [&str; 4] = ["localhost", "127.0.0.1", "::1", "0.0.0.0"];
const CLOUD_EMBEDDING_PROVIDERS: [&str; 1] = ["openai"];
const LOCAL_VECTOR_PROVIDERS: [&str; 1] = ["memory"];

/// Errors encountered while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable or option name.
        key: String,
        /// Raw value that failed to parse.
        value: String,
    },
    /// Configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Configuration file contents were malformed.
    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },
    /// Configuration file extension is not YAML or JSON.
    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(PathBuf),
    /// One or more validation rules failed.
    #[error("Configuration validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Deployment environment; controls how much error detail the API exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development; internal error details are returned to clients.
    #[default]
    Development,
    /// Shared pre-production environment.
    Staging,
    /// Production; internal error details are hidden.
    Production,
}

impl Environment {
    /// Whether API responses may include internal error text.
    pub fn exposes_error_details(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        };
        f.write_str(label)
    }
}

/// Vector database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Registered vector store provider name.
    pub provider: String,
    /// Base URL of the vector database.
    pub url: String,
    /// Optional API key sent with every request.
    pub api_key: Option<String>,
    /// Collection holding document chunks.
    pub collection: String,
    /// Transport timeout in seconds.
    pub timeout: u64,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            provider: "qdrant".into(),
            url: String::new(),
            api_key: None,
            collection: "documents".into(),
            timeout: 30,
        }
    }
}

impl VectorDbConfig {
    /// API key with blank values treated as absent.
    pub fn api_key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }
}

/// Embedding backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Registered embedding provider name.
    pub provider: String,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Base URL of the embedding endpoint; blank selects the provider's default.
    pub base_url: String,
    /// API key for hosted providers.
    pub api_key: Option<String>,
    /// Vector size used when the model is not in the known-model table.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            model: "bge-m3".into(),
            base_url: String::new(),
            api_key: None,
            dimensions: 1024,
        }
    }
}

impl EmbeddingConfig {
    /// API key with blank values treated as absent.
    pub fn api_key(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }

    /// Configured base URL, or `fallback` when blank.
    pub fn base_url_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        non_blank(Some(self.base_url.as_str())).unwrap_or(fallback)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Accepted for compatibility with existing config files; hot reload is not supported.
    pub reload: bool,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
    /// Allowed CORS origins; `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8001,
            reload: false,
            log_level: "info".into(),
            cors_origins: vec!["*".into()],
        }
    }
}

/// Chat generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Registered chat provider name.
    pub provider: String,
    /// Generation model identifier.
    pub model: String,
    /// Base URL of the generation endpoint.
    pub base_url: String,
    /// Token budget for the assembled context.
    pub context_limit: usize,
    /// Default number of chunks retrieved per chat turn.
    pub max_chunks: usize,
    /// Characters counted as one token by the context estimator.
    pub chars_per_token: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            model: "qwen2.5:1.5b".into(),
            base_url: "http://localhost:11434".into(),
            context_limit: 3000,
            max_chunks: 5,
            chars_per_token: 4,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Vector database settings.
    pub vector_db: VectorDbConfig,
    /// Embedding settings.
    pub embedding: EmbeddingConfig,
    /// HTTP server settings.
    pub api: ApiConfig,
    /// Chat settings.
    pub chat: ChatConfig,
    /// Deployment environment.
    pub environment: Environment,
}

impl AppConfig {
    /// Parse a YAML or JSON configuration file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        match extension.as_deref() {
            Some("yaml" | "yml") if raw.trim().is_empty() => Ok(Self::default()),
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&raw).map_err(|err| parse_error(err.to_string()))
            }
            Some("json") => serde_json::from_str(&raw).map_err(|err| parse_error(err.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Apply environment overrides using the supplied variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = var("QDRANT_URL") {
            self.vector_db.url = value;
        }
        if let Some(value) = var("QDRANT_API_KEY") {
            self.vector_db.api_key = Some(value);
        }
        if let Some(value) = var("QDRANT_COLLECTION") {
            self.vector_db.collection = value;
        }
        if let Some(value) = var("VECTOR_DB_PROVIDER") {
            self.vector_db.provider = value;
        }
        if let Some(value) = var("VECTOR_DB_TIMEOUT") {
            self.vector_db.timeout = parse_var("VECTOR_DB_TIMEOUT", &value)?;
        }

        if let Some(value) = var("EMBEDDING_PROVIDER") {
            self.embedding.provider = value;
        }
        if let Some(value) = var("EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = var("OLLAMA_BASE_URL") {
            self.embedding.base_url = value;
        }
        if let Some(value) = var("OPENAI_API_KEY") {
            self.embedding.api_key = Some(value);
        }
        if let Some(value) = var("EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = parse_var("EMBEDDING_DIMENSIONS", &value)?;
        }

        if let Some(value) = var("API_HOST") {
            self.api.host = value;
        }
        if let Some(value) = var("API_PORT") {
            self.api.port = parse_var("API_PORT", &value)?;
        }
        if let Some(value) = var("API_RELOAD") {
            self.api.reload = parse_var("API_RELOAD", &value)?;
        }
        if let Some(value) = var("LOG_LEVEL") {
            self.api.log_level = value.to_lowercase();
        }
        if let Some(value) = var("CORS_ORIGINS") {
            self.api.cors_origins = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = var("ENVIRONMENT") {
            self.environment = value.parse().map_err(|()| ConfigError::InvalidValue {
                key: "ENVIRONMENT".into(),
                value,
            })?;
        }

        if let Some(value) = var("CHAT_PROVIDER") {
            self.chat.provider = value;
        }
        if let Some(value) = var("CHAT_MODEL") {
            self.chat.model = value;
        }
        if let Some(value) = var("CHAT_BASE_URL") {
            self.chat.base_url = value;
        }
        if let Some(value) = var("CHAT_CONTEXT_LIMIT") {
            self.chat.context_limit = parse_var("CHAT_CONTEXT_LIMIT", &value)?;
        }
        if let Some(value) = var("CHAT_MAX_CHUNKS") {
            self.chat.max_chunks = parse_var("CHAT_MAX_CHUNKS", &value)?;
        }
        if let Some(value) = var("CHAT_CHARS_PER_TOKEN") {
            self.chat.chars_per_token = parse_var("CHAT_CHARS_PER_TOKEN", &value)?;
        }

        Ok(())
    }

    /// Check cross-field rules, reporting every violation at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let vector_provider = self.vector_db.provider.to_lowercase();
        if !LOCAL_VECTOR_PROVIDERS.contains(&vector_provider.as_str()) {
            let url = self.vector_db.url.trim();
            if url.is_empty() {
                errors.push("Vector DB URL is required (set QDRANT_URL or config file)".into());
            } else {
                match reqwest::Url::parse(url) {
                    Ok(parsed) => {
                        if self.vector_db.api_key().is_none() && !is_local_url(&parsed) {
                            errors
                                .push("Vector DB API key is required for cloud instances".into());
                        }
                    }
                    Err(err) => errors.push(format!("Vector DB URL is invalid: {err}")),
                }
            }
        }

        let embedding_provider = self.embedding.provider.to_lowercase();
        if CLOUD_EMBEDDING_PROVIDERS.contains(&embedding_provider.as_str())
            && self.embedding.api_key().is_none()
        {
            errors.push(format!(
                "API key is required for the {embedding_provider} embedding provider"
            ));
        }

        if self.api.port < 1024 {
            errors.push(format!(
                "API port must be between 1024-65535, got {}",
                self.api.port
            ));
        }

        if self.vector_db.timeout == 0 {
            errors.push("vector_db.timeout must be greater than zero".into());
        }

        if self.chat.max_chunks == 0 {
            errors.push("chat.max_chunks must be greater than zero".into());
        }

        if self.chat.chars_per_token == 0 {
            errors.push("chat.chars_per_token must be greater than zero".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Resolves the configuration file and assembles the layered configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    search_dir: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader that discovers the config file from `CONFIG_PATH` or the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit configuration file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Search for `config.{yaml,yml,json}` in this directory instead of the working directory.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = Some(dir.into());
        self
    }

    /// Load `.env`, then build the configuration from the process environment.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        dotenvy::dotenv().ok();
        let config = self.load_with(load_env_optional)?;
        tracing::debug!(
            vector_db = %config.vector_db.provider,
            url = %config.vector_db.url,
            collection = %config.vector_db.collection,
            has_api_key = config.vector_db.api_key().is_some(),
            embedding = %config.embedding.provider,
            model = %config.embedding.model,
            environment = %config.environment,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Build the configuration with a custom environment lookup.
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.resolve_path(&lookup) {
            Some(path) => AppConfig::from_file(&path)?,
            None => AppConfig::default(),
        };
        config.apply_env_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_path<F>(&self, lookup: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.path {
            return Some(path.clone());
        }
        if let Some(path) = lookup("CONFIG_PATH").filter(|value| !value.trim().is_empty()) {
            return Some(PathBuf::from(path));
        }

        let base = self
            .search_dir
            .clone()
            .or_else(|| env::current_dir().ok())?;
        [base.clone(), base.join("config")]
            .iter()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
            .find(|candidate| candidate.is_file())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

fn is_local_url(url: &reqwest::Url) -> bool {
    url.host_str()
        .map(|host| host.trim_matches(['[', ']']))
        .is_some_and(|host| LOCAL_HOSTS.contains(&host) || host.ends_with(".localhost"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn defaults_require_a_vector_db_url() {
        let error = AppConfig::default().validate().expect_err("missing url");
        match error {
            ConfigError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("Vector DB URL is required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn local_url_does_not_need_api_key() {
        let loader = ConfigLoader::new().with_search_dir(tempfile::tempdir().expect("dir").path());
        let config = loader
            .load_with(env_from(&[("QDRANT_URL", "http://localhost:6333")]))
            .expect("config");
        assert_eq!(config.vector_db.url, "http://localhost:6333");
        assert_eq!(config.embedding.model, "bge-m3");
        assert_eq!(config.chat.context_limit, 3000);
    }

    #[test]
    fn yaml_file_overrides_defaults_and_keeps_the_rest() {
        let file = write_config(
            ".yaml",
            "vector_db:\n  url: http://127.0.0.1:6333\n  collection: papers\nchat:\n  max_chunks: 8\nenvironment: production\n",
        );
        let config = ConfigLoader::new()
            .with_path(file.path())
            .load_with(env_from(&[]))
            .expect("config");

        assert_eq!(config.vector_db.collection, "papers");
        assert_eq!(config.vector_db.timeout, 30);
        assert_eq!(config.chat.max_chunks, 8);
        assert_eq!(config.chat.model, "qwen2.5:1.5b");
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn environment_beats_file_values() {
        let file = write_config(
            ".json",
            r#"{"vector_db": {"url": "http://localhost:6333", "collection": "from-file"}, "api": {"port": 9000}}"#,
        );
        let config = ConfigLoader::new()
            .with_path(file.path())
            .load_with(env_from(&[
                ("QDRANT_COLLECTION", "from-env"),
                ("API_PORT", "9100"),
                ("CORS_ORIGINS", "http://a.test, http://b.test"),
                ("CHAT_CONTEXT_LIMIT", "1200"),
            ]))
            .expect("config");

        assert_eq!(config.vector_db.collection, "from-env");
        assert_eq!(config.api.port, 9100);
        assert_eq!(
            config.api.cors_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(config.chat.context_limit, 1200);
    }

    #[test]
    fn config_path_variable_selects_file() {
        let file = write_config(".yml", "vector_db:\n  url: http://localhost:6333\n  collection: via-env-path\n");
        let path = file.path().to_string_lossy().to_string();
        let config = ConfigLoader::new()
            .load_with(env_from(&[("CONFIG_PATH", path.as_str())]))
            .expect("config");
        assert_eq!(config.vector_db.collection, "via-env-path");
    }

    #[test]
    fn search_dir_discovers_nested_config_file() {
        let dir = tempfile::tempdir().expect("dir");
        std::fs::create_dir(dir.path().join("config")).expect("config dir");
        std::fs::write(
            dir.path().join("config").join("config.yaml"),
            "vector_db:\n  url: http://localhost:6333\n  collection: nested\n",
        )
        .expect("write");

        let config = ConfigLoader::new()
            .with_search_dir(dir.path())
            .load_with(env_from(&[]))
            .expect("config");
        assert_eq!(config.vector_db.collection, "nested");
    }

    #[test]
    fn zero_timeout_and_chunk_count_are_rejected() {
        let file = write_config(
            ".yaml",
            "vector_db:\n  url: http://localhost:6333\n  timeout: 0\nchat:\n  max_chunks: 0\n",
        );
        let error = ConfigLoader::new()
            .with_path(file.path())
            .load_with(env_from(&[]))
            .expect_err("zero values");

        let ConfigError::Validation(errors) = error else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|error| error.contains("vector_db.timeout")));
        assert!(errors.iter().any(|error| error.contains("chat.max_chunks")));
    }

    #[test]
    fn validation_reports_every_violation() {
        let mut config = AppConfig::default();
        config.vector_db.url = "https://cluster.cloud.qdrant.io".into();
        config.embedding.provider = "openai".into();
        config.api.port = 80;

        let ConfigError::Validation(errors) = config.validate().expect_err("invalid") else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|error| error.contains("API key is required for cloud")));
        assert!(errors.iter().any(|error| error.contains("openai")));
        assert!(errors.iter().any(|error| error.contains("got 80")));
    }

    #[test]
    fn memory_vector_store_skips_url_checks() {
        let mut config = AppConfig::default();
        config.vector_db.provider = "memory".into();
        config.validate().expect("memory provider needs no url");
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut config = AppConfig::default();
        config.vector_db.url = "https://qdrant.example.com".into();
        config.vector_db.api_key = Some("  ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_numeric_override_is_rejected() {
        let mut config = AppConfig::default();
        let error = config
            .apply_env_overrides(env_from(&[("API_PORT", "eighty")]))
            .expect_err("bad port");
        assert!(matches!(error, ConfigError::InvalidValue { key, .. } if key == "API_PORT"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let file = write_config(".toml", "x = 1");
        let error = AppConfig::from_file(file.path()).expect_err("unsupported");
        assert!(matches!(error, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn environment_parses_aliases() {
        assert_eq!("prod".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("Development".parse::<Environment>(), Ok(Environment::Development));
        assert!("qa".parse::<Environment>().is_err());
        assert!(Environment::Development.exposes_error_details());
        assert!(!Environment::Production.exposes_error_details());
    }
}
