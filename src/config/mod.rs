//! Configuration file handling

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const DEFAULT_API_BASE: &str = "https://api.igdb.com/v4";

const ENV_CLIENT_ID: &str = "GAMEDEX_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "GAMEDEX_CLIENT_SECRET";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Twitch application client id (also sent as `Client-ID` to IGDB)
    pub client_id: String,
    /// Twitch application client secret
    pub client_secret: String,
    /// Client-credentials token endpoint
    pub token_url: String,
    /// IGDB API base URL (no trailing slash)
    pub api_base: String,
    /// SQLite record cache location; defaults to the platform data dir
    pub database: Option<PathBuf>,
    /// Credential file location; defaults to the platform config dir
    pub credentials: Option<PathBuf>,
    /// Number of games requested by `sync` when no limit is given
    pub listing_limit: usize,
    /// Extra attempts for a listing call that failed transiently
    pub retry_attempts: u32,
    /// First retry delay; doubles per attempt
    pub retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            database: None,
            credentials: None,
            listing_limit: 100,
            retry_attempts: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "gamedex", "gamedex").context("Could not determine home directory")
    }

    /// Default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides. A missing file
    /// yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(ENV_CLIENT_ID).filter(|v| !v.is_empty()) {
            self.client_id = id;
        }
        if let Some(secret) = lookup(ENV_CLIENT_SECRET).filter(|v| !v.is_empty()) {
            self.client_secret = secret;
        }
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Restrictive permissions: the file may hold the client secret
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Check everything needed before talking to the network.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            bail!(
                "client_id and client_secret must be set (config file or {} / {})",
                ENV_CLIENT_ID,
                ENV_CLIENT_SECRET
            );
        }
        url::Url::parse(&self.token_url)
            .with_context(|| format!("Invalid token_url {:?}", self.token_url))?;
        url::Url::parse(&self.api_base)
            .with_context(|| format!("Invalid api_base {:?}", self.api_base))?;
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("games.sqlite")),
        }
    }

    pub fn credentials_path(&self) -> Result<PathBuf> {
        match &self.credentials {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.config_dir().join("credentials.toml")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.listing_limit, 100);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "client_id = \"abc\"\nlisting_limit = 25\n").unwrap();

        let mut config: Config = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        config.apply_env(|_| None);
        assert_eq!(config.client_id, "abc");
        assert_eq!(config.listing_limit, 25);
        assert_eq!(config.retry_attempts, 2);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config {
            client_id: "from-file".into(),
            ..Config::default()
        };
        config.apply_env(|key| match key {
            ENV_CLIENT_ID => Some("from-env".into()),
            ENV_CLIENT_SECRET => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.client_id, "from-env");
        // Empty values do not clobber
        assert_eq!(config.client_secret, "");
    }

    #[test]
    fn test_validate_requires_credentials() {
        assert!(Config::default().validate().is_err());

        let config = Config {
            client_id: "id".into(),
            client_secret: "secret".into(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let bad_base = Config {
            api_base: "not a url".into(),
            ..config
        };
        assert!(bad_base.validate().is_err());
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            client_id: "id".into(),
            database: Some(dir.path().join("db.sqlite")),
            ..Config::default()
        };
        config.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let loaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(loaded.client_id, "id");
        assert_eq!(loaded.database, config.database);
    }
}
