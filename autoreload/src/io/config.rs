//! Autoreload configuration stored in `autoreload.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::staleness::DEFAULT_GRACE;

/// File name looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "autoreload.toml";

/// Autoreload configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults
/// below. Command-line flags are applied on top with [`apply_overrides`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutoreloadConfig {
    /// Heartbeat pulse and watcher poll interval, in milliseconds.
    pub interval_ms: u64,

    /// Slack on top of `interval_ms` before a heartbeat counts as stale.
    pub grace_ms: u64,

    /// Files, directories (watched recursively) or glob patterns.
    pub watch: Vec<String>,

    /// Also watch the binary being supervised.
    pub watch_executable: bool,

    /// Where the heartbeat file lives. Defaults to the system temp directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_dir: Option<PathBuf>,
}

impl Default for AutoreloadConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            grace_ms: DEFAULT_GRACE.as_millis() as u64,
            watch: Vec::new(),
            watch_executable: true,
            heartbeat_dir: None,
        }
    }
}

impl AutoreloadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(anyhow!("interval_ms must be > 0"));
        }
        if let Some(pattern) = self.watch.iter().find(|p| p.trim().is_empty()) {
            return Err(anyhow!("watch patterns must be non-empty (got {pattern:?})"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

/// Values given on the command line; `None` keeps the file's value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub interval_ms: Option<u64>,
    pub grace_ms: Option<u64>,
    /// Appended to the file's patterns.
    pub watch: Vec<String>,
    pub watch_executable: Option<bool>,
    pub heartbeat_dir: Option<PathBuf>,
}

/// Apply command-line overrides to a loaded config.
pub fn apply_overrides(
    mut base: AutoreloadConfig,
    overrides: &ConfigOverrides,
) -> Result<AutoreloadConfig> {
    if let Some(interval_ms) = overrides.interval_ms {
        base.interval_ms = interval_ms;
    }
    if let Some(grace_ms) = overrides.grace_ms {
        base.grace_ms = grace_ms;
    }
    base.watch.extend(overrides.watch.iter().cloned());
    if let Some(watch_executable) = overrides.watch_executable {
        base.watch_executable = watch_executable;
    }
    if let Some(dir) = &overrides.heartbeat_dir {
        base.heartbeat_dir = Some(dir.clone());
    }
    base.validate()?;
    Ok(base)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AutoreloadConfig::default()`.
pub fn load_config(path: &Path) -> Result<AutoreloadConfig> {
    if !path.exists() {
        let cfg = AutoreloadConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AutoreloadConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AutoreloadConfig::default());
        assert_eq!(cfg.interval(), Duration::from_secs(1));
        assert_eq!(cfg.grace(), DEFAULT_GRACE);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("autoreload.toml");
        fs::write(&path, "interval_ms = 250\nwatch = [\"src\", \"*.toml\"]\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.interval_ms, 250);
        assert_eq!(cfg.watch, vec!["src", "*.toml"]);
        assert_eq!(cfg.grace_ms, AutoreloadConfig::default().grace_ms);
        assert!(cfg.watch_executable);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("autoreload.toml");
        fs::write(&path, "interval_ms = 0\n").expect("write");

        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("interval_ms must be > 0"));
    }

    #[test]
    fn unparsable_file_names_the_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("autoreload.toml");
        fs::write(&path, "interval_ms = \"soon\"\n").expect("write");

        let err = load_config(&path).expect_err("invalid");
        assert!(err.to_string().contains("autoreload.toml"));
    }

    #[test]
    fn overrides_replace_scalars_and_extend_patterns() {
        let base = AutoreloadConfig {
            watch: vec!["src".to_string()],
            ..AutoreloadConfig::default()
        };
        let overrides = ConfigOverrides {
            interval_ms: Some(100),
            grace_ms: Some(0),
            watch: vec!["Cargo.toml".to_string()],
            watch_executable: Some(false),
            heartbeat_dir: Some(PathBuf::from("/tmp")),
        };

        let merged = apply_overrides(base, &overrides).expect("merge");
        assert_eq!(merged.interval_ms, 100);
        assert_eq!(merged.grace_ms, 0);
        assert_eq!(merged.watch, vec!["src", "Cargo.toml"]);
        assert!(!merged.watch_executable);
        assert_eq!(merged.heartbeat_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn empty_overrides_keep_the_base() {
        let base = AutoreloadConfig::default();
        let merged = apply_overrides(base.clone(), &ConfigOverrides::default()).expect("merge");
        assert_eq!(merged, base);
    }

    #[test]
    fn overrides_are_validated() {
        let overrides = ConfigOverrides {
            interval_ms: Some(0),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(AutoreloadConfig::default(), &overrides).is_err());
    }
}
