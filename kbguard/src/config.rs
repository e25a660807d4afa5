use serde::Deserialize;
use std::collections::HashMap;
use std::env;

use crate::error::{KbError, Result};

/// Hard upper bound for the embedding dimension of the chunk table.
pub const MAX_VECTOR_DIMENSIONS: usize = 2000;

/// Reserved key under which the permission/metadata envelope is nested
/// inside the generic metadata column.
pub const DEFAULT_METADATA_KEY: &str = "extra_middleware_metadata";

/// Upper bound for the retry counts of outbound HTTP clients.
pub const MAX_RETRIES: u32 = 10;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embeddings: EmbeddingsConfig,
    pub processing: ProcessingConfig,
    pub store: StoreConfig,
    pub directory: DirectoryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Number of items ingested concurrently per batch.
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub metadata_key: String,
}

/// What the retrieval path does when group resolution fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryFailurePolicy {
    /// Fail the whole request.
    #[default]
    Fail,
    /// Continue with the user id alone; group grants are not honored.
    UserOnly,
}

impl std::str::FromStr for DirectoryFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "user_only" | "user-only" => Ok(Self::UserOnly),
            _ => Err(format!("Unknown directory failure policy: {s}")),
        }
    }
}

impl std::fmt::Display for DirectoryFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::UserOnly => write!(f, "user_only"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// Graph-style directory endpoint. When unset, group membership comes
    /// from `static_memberships`.
    pub base_url: Option<String>,
    /// `user=group,group;user=group` table for deployments without a
    /// directory service.
    pub static_memberships: HashMap<String, Vec<String>>,
    pub token: Option<String>,
    /// Only groups whose name starts with this prefix are kept.
    pub group_prefix: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub cache_ttl_secs: u64,
    pub cache_size: usize,
    pub failure_policy: DirectoryFailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("KBGUARD_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("KBGUARD_PORT", 3000),
                api_keys: env::var("KBGUARD_API_KEYS")
                    .map(|keys| {
                        keys.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:kbguard.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            embeddings: EmbeddingsConfig {
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
                dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 1536),
                batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 64),
                base_url: env::var("EMBEDDING_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                api_key: parse_env_opt("EMBEDDING_API_KEY"),
                timeout_secs: parse_env_or("EMBEDDING_TIMEOUT", 30),
                max_retries: parse_env_or("EMBEDDING_MAX_RETRIES", 3),
            },
            processing: ProcessingConfig {
                chunk_size: parse_env_or("CHUNK_SIZE", 1000),
                chunk_overlap: parse_env_or("CHUNK_OVERLAP", 100),
                batch_size: parse_env_or("INGEST_BATCH_SIZE", 5),
            },
            store: StoreConfig {
                metadata_key: env::var("METADATA_KEY")
                    .unwrap_or_else(|_| DEFAULT_METADATA_KEY.to_string()),
            },
            directory: DirectoryConfig {
                base_url: parse_env_opt("DIRECTORY_BASE_URL"),
                static_memberships: env::var("DIRECTORY_STATIC_GROUPS")
                    .map(|raw| parse_memberships(&raw))
                    .unwrap_or_default(),
                token: parse_env_opt("DIRECTORY_TOKEN"),
                group_prefix: env::var("DIRECTORY_GROUP_PREFIX").unwrap_or_default(),
                timeout_secs: parse_env_or("DIRECTORY_TIMEOUT", 10),
                max_retries: parse_env_or("DIRECTORY_MAX_RETRIES", 2),
                cache_ttl_secs: parse_env_or("DIRECTORY_CACHE_TTL_SECS", 300),
                cache_size: parse_env_or("DIRECTORY_CACHE_SIZE", 10_000),
                failure_policy: parse_env_or(
                    "DIRECTORY_FAILURE_POLICY",
                    DirectoryFailurePolicy::Fail,
                ),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Reject configurations the store cannot be created with.
    pub fn validate(&self) -> Result<()> {
        let dims = self.embeddings.dimensions;
        if dims == 0 || dims > MAX_VECTOR_DIMENSIONS {
            return Err(KbError::Validation(format!(
                "EMBEDDING_DIMENSIONS must be between 1 and {MAX_VECTOR_DIMENSIONS}, got {dims}"
            )));
        }

        validate_metadata_key(&self.store.metadata_key)?;

        if self.processing.chunk_size == 0 {
            return Err(KbError::Validation("CHUNK_SIZE must be positive".to_string()));
        }
        if self.processing.chunk_overlap >= self.processing.chunk_size {
            return Err(KbError::Validation(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.processing.chunk_overlap, self.processing.chunk_size
            )));
        }
        if self.processing.batch_size == 0 || self.embeddings.batch_size == 0 {
            return Err(KbError::Validation("Batch sizes must be positive".to_string()));
        }
        for (name, retries) in [
            ("EMBEDDING_MAX_RETRIES", self.embeddings.max_retries),
            ("DIRECTORY_MAX_RETRIES", self.directory.max_retries),
        ] {
            if retries > MAX_RETRIES {
                return Err(KbError::Validation(format!(
                    "{name} must be at most {MAX_RETRIES}, got {retries}"
                )));
            }
        }
        if self.directory.cache_size == 0 {
            return Err(KbError::Validation(
                "DIRECTORY_CACHE_SIZE must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse `alice@x.com=-team1,-team2;bob@x.com=-team2`. Entries without a
/// user are skipped with a warning.
pub fn parse_memberships(raw: &str) -> HashMap<String, Vec<String>> {
    let mut memberships: HashMap<String, Vec<String>> = HashMap::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (user, groups) = entry.split_once('=').unwrap_or((entry, ""));
        let user = user.trim();
        if user.is_empty() {
            tracing::warn!(entry = %entry, "Ignoring static membership without a user");
            continue;
        }
        memberships.entry(user.to_string()).or_default().extend(
            groups
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string),
        );
    }
    memberships
}

/// The key is spliced into JSON paths, so it is restricted to a safe
/// alphabet.
pub fn validate_metadata_key(key: &str) -> Result<()> {
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(KbError::Validation(format!(
            "METADATA_KEY must be non-empty and contain only [A-Za-z0-9_-], got '{key}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        std::env::remove_var("EMBEDDING_DIMENSIONS");
        std::env::remove_var("METADATA_KEY");
        std::env::remove_var("DIRECTORY_FAILURE_POLICY");

        let config = Config::default();
        assert_eq!(config.embeddings.dimensions, 1536);
        assert_eq!(config.store.metadata_key, DEFAULT_METADATA_KEY);
        assert_eq!(config.directory.failure_policy, DirectoryFailurePolicy::Fail);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_dimension_cap_rejected() {
        std::env::set_var("EMBEDDING_DIMENSIONS", "2001");
        let config = Config::default();
        std::env::remove_var("EMBEDDING_DIMENSIONS");

        assert_eq!(config.embeddings.dimensions, 2001);
        assert!(matches!(config.validate(), Err(KbError::Validation(_))));
    }

    #[test]
    #[serial]
    fn test_dimension_at_cap_accepted() {
        std::env::set_var("EMBEDDING_DIMENSIONS", "2000");
        let config = Config::default();
        std::env::remove_var("EMBEDDING_DIMENSIONS");

        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_invalid_value_falls_back_to_default() {
        std::env::set_var("KBGUARD_PORT", "not-a-port");
        let config = Config::default();
        std::env::remove_var("KBGUARD_PORT");

        assert_eq!(config.server.port, 3000);
    }

    #[test]
    #[serial]
    fn test_failure_policy_from_env() {
        std::env::set_var("DIRECTORY_FAILURE_POLICY", "user_only");
        let config = Config::default();
        std::env::remove_var("DIRECTORY_FAILURE_POLICY");

        assert_eq!(
            config.directory.failure_policy,
            DirectoryFailurePolicy::UserOnly
        );
    }

    #[test]
    #[serial]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = Config::default();
        config.processing.chunk_size = 100;
        config.processing.chunk_overlap = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_retry_count_is_bounded() {
        let mut config = Config::default();
        config.directory.max_retries = MAX_RETRIES;
        assert!(config.validate().is_ok());

        config.directory.max_retries = 65;
        assert!(matches!(config.validate(), Err(KbError::Validation(_))));

        config.directory.max_retries = 2;
        config.embeddings.max_retries = MAX_RETRIES + 1;
        assert!(matches!(config.validate(), Err(KbError::Validation(_))));
    }

    #[test]
    #[serial]
    fn test_static_memberships_from_env() {
        std::env::set_var(
            "DIRECTORY_STATIC_GROUPS",
            "alice@x.com=-team1, -team2 ; bob@x.com=-team2;=-orphan;carol@x.com",
        );
        let config = Config::default();
        std::env::remove_var("DIRECTORY_STATIC_GROUPS");

        let memberships = &config.directory.static_memberships;
        assert_eq!(memberships.len(), 3);
        assert_eq!(memberships["alice@x.com"], vec!["-team1", "-team2"]);
        assert_eq!(memberships["bob@x.com"], vec!["-team2"]);
        assert!(memberships["carol@x.com"].is_empty());
    }

    #[test]
    fn test_metadata_key_alphabet() {
        assert!(validate_metadata_key("extra_middleware_metadata").is_ok());
        assert!(validate_metadata_key("kb-acl").is_ok());
        assert!(validate_metadata_key("").is_err());
        assert!(validate_metadata_key("a.b").is_err());
        assert!(validate_metadata_key("x\"y").is_err());
    }
}
