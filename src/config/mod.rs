//! Configuration for heapscope
//!
//! Settings are layered, later sources winning:
//! 1. Built-in defaults
//! 2. User config (`~/.config/heapscope/config.toml`)
//! 3. Project config (`heapscope.toml` in the working directory, or the file
//!    given with `--config`)
//! 4. Environment variables (`HEAPSCOPE_SHOW_HIDDEN`)
//!
//! # Configuration Format
//!
//! ```toml
//! # heapscope.toml
//!
//! [paths]
//! show_hidden = false
//! length_limit = 15
//! steps_per_call = 100000
//! max_paths = 10
//!
//! [output]
//! format = "text"   # or "json"
//! top = 20
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::snapshot::PathFinderOptions;

/// File name of the project-level config
pub const PROJECT_CONFIG_FILE: &str = "heapscope.toml";

/// Environment variable overriding `paths.show_hidden`
pub const SHOW_HIDDEN_ENV: &str = "HEAPSCOPE_SHOW_HIDDEN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeapscopeConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Retaining-path search settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Walk through hidden edges and nodes
    pub show_hidden: Option<bool>,

    /// Paths of this many edges or more are not explored (default: 15)
    pub length_limit: Option<usize>,

    /// Search steps per resumable call (default: 100000)
    pub steps_per_call: Option<usize>,

    /// Paths printed by `heapscope paths` (default: 10)
    pub max_paths: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Output format: text or json (default: text)
    pub format: Option<String>,

    /// Rows shown by `summary` and `classes` (default: 20)
    pub top: Option<usize>,
}

impl HeapscopeConfig {
    /// Load config from all sources.
    ///
    /// `explicit` replaces the project file lookup in `dir`. A file that
    /// fails to parse is skipped with a warning.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Self {
        let mut config = Self::load_layers(Self::user_config_path(), explicit, dir);
        config.apply_show_hidden_override(std::env::var(SHOW_HIDDEN_ENV).ok().as_deref());
        config
    }

    fn load_layers(user: Option<PathBuf>, explicit: Option<&Path>, dir: &Path) -> Self {
        let mut config = HeapscopeConfig::default();

        if let Some(user_config) = user.filter(|p| p.exists()).and_then(|p| load_layer(&p)) {
            config.merge(user_config);
        }

        let project_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => dir.join(PROJECT_CONFIG_FILE),
        };
        if project_path.exists() {
            if let Some(project_config) = load_layer(&project_path) {
                config.merge(project_config);
            }
        } else if explicit.is_some() {
            warn!("Config file {} does not exist", project_path.display());
        }

        config
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("heapscope").join("config.toml"))
    }

    /// Merge another config into this one (other takes priority)
    fn merge(&mut self, other: HeapscopeConfig) {
        if other.paths.show_hidden.is_some() {
            self.paths.show_hidden = other.paths.show_hidden;
        }
        if other.paths.length_limit.is_some() {
            self.paths.length_limit = other.paths.length_limit;
        }
        if other.paths.steps_per_call.is_some() {
            self.paths.steps_per_call = other.paths.steps_per_call;
        }
        if other.paths.max_paths.is_some() {
            self.paths.max_paths = other.paths.max_paths;
        }
        if other.output.format.is_some() {
            self.output.format = other.output.format;
        }
        if other.output.top.is_some() {
            self.output.top = other.output.top;
        }
    }

    fn apply_show_hidden_override(&mut self, value: Option<&str>) {
        match value.map(str::trim) {
            Some("1") | Some("true") | Some("yes") => self.paths.show_hidden = Some(true),
            Some("0") | Some("false") | Some("no") => self.paths.show_hidden = Some(false),
            Some(other) => warn!("Ignoring {}={:?}", SHOW_HIDDEN_ENV, other),
            None => {}
        }
    }

    pub fn show_hidden(&self) -> bool {
        self.paths.show_hidden.unwrap_or(false)
    }

    pub fn max_paths(&self) -> usize {
        self.paths.max_paths.unwrap_or(10)
    }

    pub fn format(&self) -> &str {
        self.output.format.as_deref().unwrap_or("text")
    }

    pub fn top(&self) -> usize {
        self.output.top.unwrap_or(20)
    }

    /// Path finder settings, falling back to the finder's own defaults
    pub fn path_finder_options(&self) -> PathFinderOptions {
        let defaults = PathFinderOptions::default();
        PathFinderOptions {
            show_hidden: self.show_hidden(),
            length_limit: self.paths.length_limit.unwrap_or(defaults.length_limit),
            steps_per_call: self
                .paths
                .steps_per_call
                .filter(|&steps| steps > 0)
                .unwrap_or(defaults.steps_per_call),
        }
    }
}

fn load_layer(path: &Path) -> Option<HeapscopeConfig> {
    match load_toml_config(path) {
        Ok(config) => {
            debug!("Loaded config from {}", path.display());
            Some(config)
        }
        Err(e) => {
            warn!("Failed to load {}: {}", path.display(), e);
            None
        }
    }
}

/// Load configuration from a TOML file
fn load_toml_config(path: &Path) -> anyhow::Result<HeapscopeConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: HeapscopeConfig = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HeapscopeConfig::default();
        assert!(!config.show_hidden());
        assert_eq!(config.max_paths(), 10);
        assert_eq!(config.format(), "text");
        assert_eq!(config.top(), 20);
        assert_eq!(config.path_finder_options(), PathFinderOptions::default());
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
[paths]
show_hidden = true
length_limit = 8
max_paths = 3

[output]
format = "json"
"#;
        let config: HeapscopeConfig = toml::from_str(toml_str).unwrap();
        assert!(config.show_hidden());
        assert_eq!(config.max_paths(), 3);
        assert_eq!(config.format(), "json");
        assert_eq!(config.top(), 20);

        let options = config.path_finder_options();
        assert_eq!(options.length_limit, 8);
        assert_eq!(options.steps_per_call, 100_000);
        assert!(options.show_hidden);
    }

    #[test]
    fn test_project_overrides_user() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");
        std::fs::write(&user, "[paths]\nmax_paths = 4\nlength_limit = 9\n").unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[paths]\nmax_paths = 7\n",
        )
        .unwrap();

        let config = HeapscopeConfig::load_layers(Some(user), None, dir.path());
        assert_eq!(config.max_paths(), 7);
        assert_eq!(config.paths.length_limit, Some(9));
    }

    #[test]
    fn test_explicit_path_replaces_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[output]\ntop = 5\n").unwrap();
        let explicit = dir.path().join("other.toml");
        std::fs::write(&explicit, "[output]\ntop = 50\n").unwrap();

        let config = HeapscopeConfig::load_layers(None, Some(&explicit), dir.path());
        assert_eq!(config.top(), 50);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[paths\nshow_hidden = ").unwrap();

        let config = HeapscopeConfig::load_layers(None, None, dir.path());
        assert_eq!(config, HeapscopeConfig::default());
    }

    #[test]
    fn test_show_hidden_override() {
        let mut config = HeapscopeConfig::default();
        config.apply_show_hidden_override(Some("1"));
        assert!(config.show_hidden());
        config.apply_show_hidden_override(Some("false"));
        assert!(!config.show_hidden());
        config.apply_show_hidden_override(Some("maybe"));
        assert!(!config.show_hidden());
        config.apply_show_hidden_override(None);
        assert_eq!(config.paths.show_hidden, Some(false));
    }
}
