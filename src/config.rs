//! YAML configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::list::ListDefinition;
use crate::store::FetchMode;
use crate::{Error, Result};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub rebuild: RebuildConfig,
    /// List definitions, in declaration order.
    #[serde(default)]
    pub lists: Vec<ListDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("rackradar.db")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RebuildConfig {
    /// Read each membership result fully before building its union
    #[serde(default)]
    pub buffer_results: bool,
}

impl RebuildConfig {
    pub fn fetch_mode(&self) -> FetchMode {
        FetchMode::from_buffered(self.buffer_results)
    }
}

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        log::debug!("loaded {} lists from {:?}", config.lists.len(), path);
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject list sets that cannot be built unambiguously.
    ///
    /// Unknown include or exclude names are not errors here; they are
    /// reported when the lists are ordered and compiled.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for def in &self.lists {
            let name = def.name.as_str();
            if name.trim().is_empty() {
                return Err(Error::Config("list with an empty name".to_string()));
            }
            if name.chars().any(char::is_whitespace) {
                return Err(Error::Config(format!(
                    "list name {:?} contains whitespace",
                    name
                )));
            }
            if !seen.insert(name) {
                return Err(Error::Config(format!("duplicate list {}", name)));
            }
            let empty_pattern = def
                .match_filters
                .values()
                .chain(def.ignore_filters.values())
                .flatten()
                .any(|p| p.is_empty());
            if empty_pattern {
                return Err(Error::Config(format!("list {} has an empty pattern", name)));
            }
        }
        Ok(())
    }

    pub fn list(&self, name: &str) -> Option<&ListDefinition> {
        self.lists.iter().find(|l| l.name == name)
    }
}
