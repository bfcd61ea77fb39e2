use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ProwLensError;
use crate::logs::CompactionLevel;

/// Configuration file structure for ProwLens.
///
/// Every threshold and marker the log pipeline relies on lives here so that
/// drift in the CI log format can be absorbed without touching the algorithms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Where job logs and artifacts are served from
    #[serde(default)]
    pub storage: StorageConfig,

    /// Compaction thresholds and structural filter settings
    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Start/end markers for block extraction
    #[serde(default)]
    pub markers: MarkersConfig,

    /// Event timeline correlation settings
    #[serde(default)]
    pub timeline: TimelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Base URL for top-level build logs
    #[serde(default = "default_build_log_base")]
    pub build_log_base: String,

    /// Base URL for browsable job artifacts
    #[serde(default = "default_artifacts_base")]
    pub artifacts_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompactionConfig {
    /// Level used when none is requested
    #[serde(default)]
    pub default_level: CompactionLevel,

    /// Number of retained lines each new line is compared against
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    #[serde(default = "default_aggressive")]
    pub aggressive: f64,

    #[serde(default = "default_moderate")]
    pub moderate: f64,

    #[serde(default = "default_conservative")]
    pub conservative: f64,

    #[serde(default = "default_exact")]
    pub exact: f64,

    /// Structural filtering only runs above this threshold
    #[serde(default = "default_structural_cutoff")]
    pub structural_cutoff: f64,

    /// First line starting with this prefix opens the monitored-test block
    #[serde(default = "default_block_start_prefix")]
    pub block_start_prefix: String,

    /// Status lines dropped inside the monitored-test block
    #[serde(default = "default_status_prefixes")]
    pub status_prefixes: Vec<String>,
}

/// A pair of markers delimiting a block of log text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlockMarkers {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarkersConfig {
    #[serde(default = "default_failing_markers")]
    pub failing: BlockMarkers,

    #[serde(default = "default_flaky_markers")]
    pub flaky: BlockMarkers,

    #[serde(default = "default_monitor_markers")]
    pub monitor: BlockMarkers,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TimelineConfig {
    /// Keep listing events after the first one attributed to the requested test
    #[serde(default)]
    pub return_all_matches: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            build_log_base: default_build_log_base(),
            artifacts_base: default_artifacts_base(),
        }
    }
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            default_level: CompactionLevel::default(),
            window_size: default_window_size(),
            aggressive: default_aggressive(),
            moderate: default_moderate(),
            conservative: default_conservative(),
            exact: default_exact(),
            structural_cutoff: default_structural_cutoff(),
            block_start_prefix: default_block_start_prefix(),
            status_prefixes: default_status_prefixes(),
        }
    }
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            failing: default_failing_markers(),
            flaky: default_flaky_markers(),
            monitor: default_monitor_markers(),
        }
    }
}

impl CompactionConfig {
    /// Similarity threshold configured for a compaction level.
    pub fn threshold(&self, level: CompactionLevel) -> f64 {
        match level {
            CompactionLevel::Aggressive => self.aggressive,
            CompactionLevel::Moderate => self.moderate,
            CompactionLevel::Conservative => self.conservative,
            CompactionLevel::Exact => self.exact,
        }
    }
}

fn default_build_log_base() -> String {
    "https://storage.googleapis.com/test-platform-results/logs".to_string()
}

fn default_artifacts_base() -> String {
    "https://gcsweb-ci.apps.ci.l2s4.p1.openshiftapps.com/gcs/test-platform-results/logs".to_string()
}

fn default_window_size() -> usize {
    5
}

fn default_aggressive() -> f64 {
    0.5
}

fn default_moderate() -> f64 {
    0.8
}

fn default_conservative() -> f64 {
    0.9
}

fn default_exact() -> f64 {
    1.0
}

fn default_structural_cutoff() -> f64 {
    0.6
}

fn default_block_start_prefix() -> String {
    "started:".to_string()
}

fn default_status_prefixes() -> Vec<String> {
    vec![
        "started:".to_string(),
        "passed: ".to_string(),
        "skipped: ".to_string(),
    ]
}

fn default_failing_markers() -> BlockMarkers {
    BlockMarkers {
        start: "Failing tests:".to_string(),
        end: "Writing JUnit report to".to_string(),
    }
}

fn default_flaky_markers() -> BlockMarkers {
    BlockMarkers {
        start: "Flaky tests:".to_string(),
        end: "Failing tests:".to_string(),
    }
}

fn default_monitor_markers() -> BlockMarkers {
    BlockMarkers {
        start: "Shutting down the monitor".to_string(),
        end: "Writing JUnit report to".to_string(),
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./prowlens.toml, ./prowlens.json, ./prowlens.yaml, ./prowlens.yml
    /// 3. `<user config dir>/prowlens/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Ok(Self::default());
            }
            return Self::load_from_path(path);
        }

        let mut candidates: Vec<PathBuf> = [
            "prowlens.toml",
            "prowlens.json",
            "prowlens.yaml",
            "prowlens.yml",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();

        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("prowlens").join("config.toml"));
        }

        for candidate in &candidates {
            if candidate.exists() {
                return Self::load_from_path(candidate);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        let c = &self.compaction;
        if c.window_size == 0 {
            return Err(ProwLensError::Config(
                "compaction.window-size must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("aggressive", c.aggressive),
            ("moderate", c.moderate),
            ("conservative", c.conservative),
            ("exact", c.exact),
            ("structural-cutoff", c.structural_cutoff),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ProwLensError::Config(format!(
                    "compaction.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        for (name, markers) in [
            ("failing", &self.markers.failing),
            ("flaky", &self.markers.flaky),
            ("monitor", &self.markers.monitor),
        ] {
            if markers.start.is_empty() || markers.end.is_empty() {
                return Err(ProwLensError::Config(format!(
                    "markers.{name} needs both a start and an end marker"
                )));
            }
        }
        Ok(())
    }
}
