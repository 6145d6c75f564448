//! Configuration loader and validator for the gallery client.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const TOKEN_ENV: &str = "CRAG_GALLERY_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub api: Api,
    pub site: Site,
}

/// Gallery behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Uploads at or above this size are re-encoded before sending.
    #[serde(default = "default_compress_threshold")]
    pub compress_threshold_bytes: u64,
    /// Uploads at or above this size are rejected.
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: u64,
}

/// GraphQL API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Api {
    pub graphql_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// The web front end hosting signed-url and cache revalidation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Site {
    pub base_url: String,
}

fn default_page_size() -> u32 {
    6
}

fn default_compress_threshold() -> u64 {
    11 * 1024 * 1024
}

fn default_max_upload() -> u64 {
    30 * 1024 * 1024
}

impl Config {
    /// Token from the environment wins over the file.
    pub fn auth_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.api.auth_token.clone().filter(|t| !t.trim().is_empty()))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.page_size == 0 {
        return Err(ConfigError::Invalid("app.page_size must be > 0"));
    }
    if cfg.app.compress_threshold_bytes == 0 {
        return Err(ConfigError::Invalid("app.compress_threshold_bytes must be > 0"));
    }
    if cfg.app.max_upload_bytes <= cfg.app.compress_threshold_bytes {
        return Err(ConfigError::Invalid(
            "app.max_upload_bytes must exceed app.compress_threshold_bytes",
        ));
    }

    if cfg.api.graphql_url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.graphql_url must be non-empty"));
    }
    if reqwest::Url::parse(&cfg.api.graphql_url).is_err() {
        return Err(ConfigError::Invalid("api.graphql_url must be an absolute URL"));
    }

    if cfg.site.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("site.base_url must be non-empty"));
    }
    if reqwest::Url::parse(&cfg.site.base_url).is_err() {
        return Err(ConfigError::Invalid("site.base_url must be an absolute URL"));
    }

    Ok(())
}

/// Returns the reference YAML content.
pub fn example() -> &'static str {
    r#"app:
  page_size: 6
  compress_threshold_bytes: 11534336
  max_upload_bytes: 31457280

api:
  graphql_url: "https://api.openbeta.io/"
  auth_token: "YOUR_ACCESS_TOKEN"

site:
  base_url: "https://openbeta.io/"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.page_size, 6);
    }

    #[test]
    fn app_defaults_apply() {
        let cfg: Config = serde_yaml::from_str(
            "app: {}\napi:\n  graphql_url: \"http://localhost:4000/\"\nsite:\n  base_url: \"http://localhost:3000/\"\n",
        )
        .unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.page_size, 6);
        assert_eq!(cfg.app.compress_threshold_bytes, 11 * 1024 * 1024);
        assert_eq!(cfg.app.max_upload_bytes, 30 * 1024 * 1024);
        assert_eq!(cfg.api.auth_token, None);
    }

    #[test]
    fn invalid_page_size() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.page_size = 0;
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("page_size")), _ => panic!("wrong error") }
    }

    #[test]
    fn invalid_urls() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.api.graphql_url = "".into();
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("graphql_url")), _ => panic!("wrong error") }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.site.base_url = "not a url".into();
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("site.base_url")), _ => panic!("wrong error") }
    }

    #[test]
    fn invalid_size_limits() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.max_upload_bytes = cfg.app.compress_threshold_bytes;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.site.base_url, "https://openbeta.io/");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let td = tempdir().unwrap();
        let err = load(Some(&td.path().join("absent.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
