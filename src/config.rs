//! Client configuration: server address, credential and HTTP settings
//!
use serde::Deserialize;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_ADDRESS: &str = "https://api.datahub.io";

pub const ENV_API_ADDRESS: &str = "DATAHUB_API_ADDRESS";
pub const ENV_TOKEN: &str = "DATAHUB_TOKEN";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid API address `{0}`: {1}")]
    InvalidAddress(String, #[source] url::ParseError),
    #[error("IO error reading {0:?}")]
    IoError(PathBuf, #[source] io::Error),
    #[error("Config file {0:?} is not valid JSON")]
    SerdeJSONError(PathBuf, #[source] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_address: Url,
    pub token: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_address: Url::parse(DEFAULT_API_ADDRESS).expect("default address is a valid URL"),
            token: None,
            timeout: Duration::from_secs(30),
            user_agent: format!("datahub-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// The file written by the DataHub command line tool after login.
#[derive(Deserialize)]
struct ConfigFile {
    token: Option<String>,
    api: Option<String>,
}

impl Config {
    /// Reads `DATAHUB_API_ADDRESS` and `DATAHUB_TOKEN` over the defaults.
    pub fn from_env() -> Result<Self, Error> {
        Config::default().merge_env()
    }

    /// Reads `{config_dir}/datahub/config.json` if it exists, then the environment.
    /// Environment variables take precedence over the file.
    pub fn load() -> Result<Self, Error> {
        let mut config = Config::default();
        if let Some(path) = Self::file_path().filter(|p| p.is_file()) {
            config = config.merge_file(&path)?;
        }
        config.merge_env()
    }

    pub fn file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("datahub").join("config.json"))
    }

    pub fn with_address(mut self, address: impl AsRef<str>) -> Result<Self, Error> {
        self.api_address = parse_address(address.as_ref())?;
        Ok(self)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = normalize_token(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn merge_file(mut self, path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path).map_err(|e| Error::IoError(path.to_owned(), e))?;
        let file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| Error::SerdeJSONError(path.to_owned(), e))?;

        if let Some(api) = file.api {
            self.api_address = parse_address(&api)?;
        }
        if let Some(token) = file.token {
            self.token = normalize_token(token);
        }
        Ok(self)
    }

    fn merge_env(mut self) -> Result<Self, Error> {
        if let Ok(address) = env::var(ENV_API_ADDRESS) {
            self.api_address = parse_address(&address)?;
        }
        if let Ok(token) = env::var(ENV_TOKEN) {
            self.token = normalize_token(token);
        }
        Ok(self)
    }
}

fn parse_address(address: &str) -> Result<Url, Error> {
    // a trailing slash keeps `Url::join` from dropping the last path segment
    let with_slash = if address.ends_with('/') {
        address.to_owned()
    } else {
        format!("{address}/")
    };
    Url::parse(&with_slash).map_err(|e| Error::InvalidAddress(address.to_owned(), e))
}

/// Empty or blank tokens mean "no token".
pub(crate) fn normalize_token(token: String) -> Option<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_to_datahub_without_token() {
        let config = Config::default();
        assert_eq!(config.api_address.as_str(), "https://api.datahub.io/");
        assert!(config.token.is_none());
        assert!(config.user_agent.starts_with("datahub-rs/"));
    }

    #[test]
    fn blank_token_is_no_token() {
        assert!(Config::default().with_token("").token.is_none());
        assert!(Config::default().with_token("   ").token.is_none());
        assert_eq!(
            Config::default().with_token(" abc ").token.as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn address_keeps_its_path() {
        let config = Config::default()
            .with_address("http://localhost:4000/api")
            .unwrap();
        assert_eq!(
            config.api_address.join("auth/check").unwrap().as_str(),
            "http://localhost:4000/api/auth/check"
        );
        assert!(Config::default().with_address("not a url").is_err());
    }

    #[test]
    fn config_file_fills_token_and_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"token": "jwt-from-file", "api": "http://127.0.0.1:9"}"#).unwrap();

        let config = Config::default().merge_file(&path).unwrap();
        assert_eq!(config.token.as_deref(), Some("jwt-from-file"));
        assert_eq!(config.api_address.as_str(), "http://127.0.0.1:9/");

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Config::default().merge_file(&path),
            Err(Error::SerdeJSONError(..))
        ));
    }
}
