//! Backend configuration.
//!
//! Resolution priority, per field:
//! 1. EDISON_* environment variables (after `.env.local` / `.env` are loaded)
//! 2. `~/.config/edison/config.json` (platform config dir)
//! 3. Built-in defaults pointing at a local backend

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_ANALYZE_PATH: &str = "/analyze";
pub const DEFAULT_TUTORIAL_PATH: &str = "/project_details";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub analyze_path: String,
    pub tutorial_path: String,
    /// Applies to connecting only. The tutorial stream itself never times out.
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            analyze_path: DEFAULT_ANALYZE_PATH.to_string(),
            tutorial_path: DEFAULT_TUTORIAL_PATH.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// On-disk form. Every field is optional; missing ones fall through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub analyze_path: Option<String>,
    pub tutorial_path: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

impl Config {
    /// Read the config file if present and apply env overrides.
    ///
    /// Call [`load_env_files`] first so `.env` values take part.
    pub fn load() -> Result<Self> {
        let file = match config_path() {
            Some(path) => read_file_config(&path)?,
            None => None,
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge the three layers. `env` is injected so tests need not touch
    /// the process environment.
    pub fn resolve<F>(file: Option<FileConfig>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let defaults = Config::default();
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_url = lookup("EDISON_API_URL")
            .or(file.api_url)
            .unwrap_or(defaults.api_url);
        let analyze_path = lookup("EDISON_ANALYZE_PATH")
            .or(file.analyze_path)
            .unwrap_or(defaults.analyze_path);
        let tutorial_path = lookup("EDISON_TUTORIAL_PATH")
            .or(file.tutorial_path)
            .unwrap_or(defaults.tutorial_path);
        let connect_timeout = match lookup("EDISON_CONNECT_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                Error::Config(format!(
                    "EDISON_CONNECT_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    raw
                ))
            })?,
            None => file
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        };

        let config = Self {
            api_url: api_url.trim().trim_end_matches('/').to_string(),
            analyze_path: normalize_path(&analyze_path),
            tutorial_path: normalize_path(&tutorial_path),
            connect_timeout,
        };
        config.validate()?;
        log::info!("[CONFIG] Backend: {}", config.api_url);
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api url must start with http:// or https://, got '{}'",
                self.api_url
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::Config("connect timeout must be above zero".to_string()));
        }
        Ok(())
    }

    pub fn analyze_url(&self) -> String {
        format!("{}{}", self.api_url, self.analyze_path)
    }

    pub fn tutorial_url(&self) -> String {
        format!("{}{}", self.api_url, self.tutorial_path)
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Platform config file location.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("edison").join("config.json"))
}

/// Read the config file. A missing file is not an error; a broken one is.
pub fn read_file_config(path: &Path) -> Result<Option<FileConfig>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };
    let parsed = serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    log::info!("[CONFIG] Loaded {}", path.display());
    Ok(Some(parsed))
}

/// Load `.env.local`, falling back to `.env`, from `dir`. First hit wins.
///
/// Runs before the logger exists, so the loaded file is returned for the
/// caller to log.
pub fn load_env_files(dir: &Path) -> Result<Option<PathBuf>> {
    'env_load: for env_file in [".env.local", ".env"] {
        let path = dir.join(env_file);
        if !path.exists() {
            continue 'env_load;
        }
        return match dotenvy::from_path(&path) {
            Ok(()) => Ok(Some(path)),
            Err(e) => Err(Error::Config(format!("{}: {}", path.display(), e))),
        };
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::resolve(None, env_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.analyze_url(), "http://localhost:5000/analyze");
        assert_eq!(config.tutorial_url(), "http://localhost:5000/project_details");
    }

    #[test]
    fn env_beats_file_beats_default() {
        let file = FileConfig {
            api_url: Some("https://file.example".to_string()),
            analyze_path: Some("/scan".to_string()),
            tutorial_path: None,
            connect_timeout_secs: Some(3),
        };
        let config = Config::resolve(
            Some(file),
            env_from(&[("EDISON_API_URL", "https://env.example/")]),
        )
        .unwrap();
        assert_eq!(config.api_url, "https://env.example");
        assert_eq!(config.analyze_path, "/scan");
        assert_eq!(config.tutorial_path, DEFAULT_TUTORIAL_PATH);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = Config::resolve(None, env_from(&[("EDISON_API_URL", "  ")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn paths_get_a_leading_slash() {
        let config =
            Config::resolve(None, env_from(&[("EDISON_TUTORIAL_PATH", "details")])).unwrap();
        assert_eq!(config.tutorial_path, "/details");
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        let err = Config::resolve(None, env_from(&[("EDISON_CONNECT_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::resolve(None, env_from(&[("EDISON_CONNECT_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn non_http_url_is_rejected() {
        let err =
            Config::resolve(None, env_from(&[("EDISON_API_URL", "ftp://x")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_config_file_is_none() {
        let path = std::env::temp_dir().join("edison-config-test-missing.json");
        assert!(read_file_config(&path).unwrap().is_none());
    }

    #[test]
    fn config_file_roundtrip() {
        let path = std::env::temp_dir().join("edison-config-test-roundtrip.json");
        std::fs::write(&path, r#"{"apiUrl":"https://edison.example","connectTimeoutSecs":5}"#)
            .unwrap();

        let file = read_file_config(&path).unwrap().unwrap();
        assert_eq!(file.api_url.as_deref(), Some("https://edison.example"));
        assert_eq!(file.connect_timeout_secs, Some(5));

        // Cleanup
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn broken_config_file_is_an_error() {
        let path = std::env::temp_dir().join("edison-config-test-broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_file_config(&path), Err(Error::Config(_))));

        // Cleanup
        let _ = std::fs::remove_file(&path);
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("edison-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn env_local_wins_over_env() {
        let dir = scratch_dir("env-local");
        std::fs::write(dir.join(".env.local"), "EDISON_TEST_FROM_ENV_LOCAL=1\n").unwrap();
        std::fs::write(dir.join(".env"), "EDISON_TEST_FROM_DOT_ENV=1\n").unwrap();

        let loaded = load_env_files(&dir).unwrap();
        assert_eq!(loaded, Some(dir.join(".env.local")));
        assert_eq!(std::env::var("EDISON_TEST_FROM_ENV_LOCAL").as_deref(), Ok("1"));
        assert!(std::env::var("EDISON_TEST_FROM_DOT_ENV").is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn no_env_files_is_not_an_error() {
        let dir = scratch_dir("no-env");
        assert_eq!(load_env_files(&dir).unwrap(), None);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
