//! Loads the static YAML mapping file into a typed [`SyncConfig`].
//!
//! This is the only place where untrusted YAML is parsed and mapped to the
//! internal structs the orchestrator consumes. Validation policy follows the
//! tool's skip-vs-fail split:
//! - unreadable file, malformed YAML or duplicate repository names are fatal
//!   ([`ConfigError`]);
//! - duplicate target paths are logged and tolerated (last write wins);
//! - repositories that are configured but not cloned on disk are none of the
//!   loader's business; the orchestrator skips them per run.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ConfigError;

/// Character-count thresholds used to classify thin content. Reporting only;
/// a page below either threshold is still written.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ContentThresholds {
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,
    #[serde(default = "default_critical_content_length")]
    pub critical_content_length: usize,
}

fn default_min_content_length() -> usize {
    500
}

fn default_critical_content_length() -> usize {
    100
}

impl Default for ContentThresholds {
    fn default() -> Self {
        Self {
            min_content_length: default_min_content_length(),
            critical_content_length: default_critical_content_length(),
        }
    }
}

/// One (source, target) pair. `source` is relative to the repository clone,
/// `target` is relative to the base directory and points under the docs tree.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadmeMapping {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// All mappings for one source repository, in configured order.
#[derive(Debug, Clone)]
pub struct RepositoryMapping {
    pub name: String,
    pub main_readme: Option<ReadmeMapping>,
    pub sub_readmes: Vec<ReadmeMapping>,
}

impl RepositoryMapping {
    /// Main README first, then the sub-READMEs in configured order.
    pub fn mappings(&self) -> impl Iterator<Item = &ReadmeMapping> {
        self.main_readme.iter().chain(self.sub_readmes.iter())
    }
}

/// The fully loaded mapping configuration for one run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub thresholds: ContentThresholds,
    pub repository_urls: BTreeMap<String, String>,
    pub repositories: Vec<RepositoryMapping>,
}

impl SyncConfig {
    /// Attribution URL for a repository. Unknown repositories link nowhere,
    /// matching the banner's fallback anchor.
    pub fn repo_url(&self, name: &str) -> &str {
        self.repository_urls
            .get(name)
            .map(String::as_str)
            .unwrap_or("#")
    }
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    content_thresholds: ContentThresholds,
    #[serde(default)]
    repository_urls: BTreeMap<String, String>,
    repositories: Vec<RawRepository>,
}

#[derive(Deserialize)]
struct RawRepository {
    name: String,
    #[serde(default)]
    main_readme: Option<ReadmeMapping>,
    #[serde(default)]
    sub_readmes: Vec<ReadmeMapping>,
}

/// Loads and validates the mapping file. Read-only; never touches anything
/// besides the config path itself.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SyncConfig, ConfigError> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| ConfigError::Unreadable {
        path: path_ref.to_path_buf(),
        source: e,
    })?;

    let raw: RawConfig =
        serde_yaml::from_str(&config_content).map_err(|e| ConfigError::Malformed {
            path: path_ref.to_path_buf(),
            source: e,
        })?;

    let mut names = BTreeSet::new();
    for repo in &raw.repositories {
        if !names.insert(repo.name.clone()) {
            return Err(ConfigError::DuplicateRepository {
                name: repo.name.clone(),
            });
        }
    }

    let repositories: Vec<RepositoryMapping> = raw
        .repositories
        .into_iter()
        .map(|r| RepositoryMapping {
            name: r.name,
            main_readme: r.main_readme,
            sub_readmes: r.sub_readmes,
        })
        .collect();

    // Duplicate targets are a config smell, not a failure: the later mapping
    // overwrites the earlier one.
    let mut targets = BTreeSet::new();
    for repo in &repositories {
        for mapping in repo.mappings() {
            if !targets.insert(mapping.target.clone()) {
                warn!(
                    repo = %repo.name,
                    target = %mapping.target.display(),
                    "duplicate target path in config; last write wins"
                );
            }
        }
    }

    info!(
        repositories = repositories.len(),
        min_content_length = raw.content_thresholds.min_content_length,
        "Config loaded successfully"
    );

    Ok(SyncConfig {
        thresholds: raw.content_thresholds,
        repository_urls: raw.repository_urls,
        repositories,
    })
}
