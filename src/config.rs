//! Layered configuration for clipflow.
//!
//! Values are resolved file → environment → CLI. The file is
//! `clipflow.toml`, read from `--config <path>` or from
//! `<config dir>/clipflow/clipflow.toml` when present.
//!
//! ```toml
//! [backend]
//! url = "http://localhost:5000"
//! request_timeout_secs = 600
//! connect_timeout_secs = 10
//!
//! [clips]
//! min_duration_secs = 40
//! max_duration_secs = 180
//! ```
//!
//! Environment overrides: `CLIPFLOW_BACKEND_URL`, `CLIPFLOW_REQUEST_TIMEOUT_SECS`.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::workflow::editor::ClipBounds;

pub const ENV_BACKEND_URL: &str = "CLIPFLOW_BACKEND_URL";
pub const ENV_REQUEST_TIMEOUT: &str = "CLIPFLOW_REQUEST_TIMEOUT_SECS";

fn default_backend_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    // Audio extraction and transcription of long videos take minutes.
    600
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_min_duration_secs() -> f64 {
    ClipBounds::DEFAULT.min
}

fn default_max_duration_secs() -> f64 {
    ClipBounds::DEFAULT.max
}

/// `[backend]` section: where the processing service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// `[clips]` section: allowed clip length, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipsSection {
    #[serde(default = "default_min_duration_secs")]
    pub min_duration_secs: f64,
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: f64,
}

impl Default for ClipsSection {
    fn default() -> Self {
        Self {
            min_duration_secs: default_min_duration_secs(),
            max_duration_secs: default_max_duration_secs(),
        }
    }
}

/// Contents of `clipflow.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipflowToml {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub clips: ClipsSection,
}

impl ClipflowToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse clipflow.toml")
    }

    /// Load from `path`, or return defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize clipflow.toml")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub toml: ClipflowToml,
    /// The file the settings were read from, if any.
    pub source: Option<PathBuf>,
    pub verbose: bool,
    pub yes: bool,
}

impl Config {
    /// Resolve configuration from all layers.
    ///
    /// An explicit `config_file` must exist; the default location is optional.
    pub fn load(
        config_file: Option<PathBuf>,
        backend_url: Option<String>,
        verbose: bool,
        yes: bool,
    ) -> Result<Self> {
        let (toml, source) = match config_file {
            Some(path) => (ClipflowToml::load(&path)?, Some(path)),
            None => match Self::default_path() {
                Some(path) if path.exists() => (ClipflowToml::load(&path)?, Some(path)),
                _ => (ClipflowToml::default(), None),
            },
        };

        let mut config = Self {
            toml,
            source,
            verbose,
            yes,
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        if let Some(url) = backend_url {
            config.toml.backend.url = url;
        }
        Ok(config)
    }

    /// `<config dir>/clipflow/clipflow.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("clipflow").join("clipflow.toml"))
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty()) {
            self.toml.backend.url = url;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_REQUEST_TIMEOUT))?;
            self.toml.backend.request_timeout_secs = secs;
        }
        Ok(())
    }

    pub fn backend(&self) -> &BackendSection {
        &self.toml.backend
    }

    pub fn clip_bounds(&self) -> ClipBounds {
        ClipBounds {
            min: self.toml.clips.min_duration_secs,
            max: self.toml.clips.max_duration_secs,
        }
    }

    /// Check configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let url = &self.toml.backend.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            warnings.push(format!("Backend URL '{}' is not an http(s) URL", url));
        }
        if self.toml.backend.request_timeout_secs == 0 {
            warnings.push("request_timeout_secs is 0; every request will time out".to_string());
        }
        let clips = &self.toml.clips;
        if clips.min_duration_secs >= clips.max_duration_secs {
            warnings.push(format!(
                "min_duration_secs ({}) must be below max_duration_secs ({})",
                clips.min_duration_secs, clips.max_duration_secs
            ));
        }
        warnings
    }

    /// Fail on warnings that make the configuration unusable.
    pub fn ensure_usable(&self) -> Result<()> {
        let clips = &self.toml.clips;
        if clips.min_duration_secs >= clips.max_duration_secs {
            bail!(
                "Invalid [clips] bounds: min {} must be below max {}",
                clips.min_duration_secs,
                clips.max_duration_secs
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn base_config() -> Config {
        Config {
            toml: ClipflowToml::default(),
            source: None,
            verbose: false,
            yes: false,
        }
    }

    #[test]
    fn test_defaults() {
        let toml = ClipflowToml::default();
        assert_eq!(toml.backend.url, "http://localhost:5000");
        assert_eq!(toml.backend.request_timeout_secs, 600);
        assert_eq!(toml.clips.min_duration_secs, 40.0);
        assert_eq!(toml.clips.max_duration_secs, 180.0);
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let toml = ClipflowToml::parse(
            r#"
            [backend]
            url = "http://media.local:8080"
            "#,
        )
        .unwrap();
        assert_eq!(toml.backend.url, "http://media.local:8080");
        assert_eq!(toml.backend.connect_timeout_secs, 10);
        assert_eq!(toml.clips, ClipsSection::default());
    }

    #[test]
    fn test_parse_invalid_toml_errors() {
        let err = ClipflowToml::parse("[backend\nurl=").unwrap_err();
        assert!(err.to_string().contains("Failed to parse clipflow.toml"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/clipflow.toml");
        let mut toml = ClipflowToml::default();
        toml.clips.max_duration_secs = 90.0;
        toml.save(&path).unwrap();
        let loaded = ClipflowToml::load(&path).unwrap();
        assert_eq!(loaded, toml);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let toml = ClipflowToml::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(toml, ClipflowToml::default());
    }

    #[test]
    fn test_explicit_config_file_must_exist() {
        let dir = tempdir().unwrap();
        let result = Config::load(Some(dir.path().join("missing.toml")), None, false, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_url_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clipflow.toml");
        std::fs::write(&path, "[backend]\nurl = \"http://from-file:1\"\n").unwrap();
        let config = Config::load(
            Some(path.clone()),
            Some("http://from-cli:2".to_string()),
            true,
            false,
        )
        .unwrap();
        assert_eq!(config.backend().url, "http://from-cli:2");
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert!(config.verbose);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BACKEND_URL, "http://from-env:3"),
            (ENV_REQUEST_TIMEOUT, "42"),
        ]);
        let mut config = base_config();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.backend().url, "http://from-env:3");
        assert_eq!(config.backend().request_timeout_secs, 42);
    }

    #[test]
    fn test_env_blank_url_is_ignored() {
        let mut config = base_config();
        config
            .apply_env(|k| (k == ENV_BACKEND_URL).then(|| "  ".to_string()))
            .unwrap();
        assert_eq!(config.backend().url, "http://localhost:5000");
    }

    #[test]
    fn test_env_bad_timeout_errors() {
        let mut config = base_config();
        let err = config
            .apply_env(|k| (k == ENV_REQUEST_TIMEOUT).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_REQUEST_TIMEOUT));
    }

    #[test]
    fn test_validate_flags_problems() {
        let mut config = base_config();
        assert!(config.validate().is_empty());
        config.toml.backend.url = "ftp://nope".to_string();
        config.toml.clips.min_duration_secs = 200.0;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 2);
        assert!(config.ensure_usable().is_err());
    }

    #[test]
    fn test_clip_bounds_from_config() {
        let mut config = base_config();
        config.toml.clips.min_duration_secs = 15.0;
        let bounds = config.clip_bounds();
        assert_eq!(bounds.min, 15.0);
        assert_eq!(bounds.max, 180.0);
    }
}
