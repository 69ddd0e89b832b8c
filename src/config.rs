//! Explicit configuration for the resolver, tree, and archive helpers.
//!
//! Everything the helpers would otherwise read from process-wide constants
//! lives here: the namespace roots used to build identifiers, the directory
//! names skipped when zipping a tree, and the permission mode applied when a
//! path has to be forced writable. A `Config` is a plain value; callers build
//! one (or load it from JSON) and hand it to the components that need it.

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming a config file when no explicit path is given.
pub const CONFIG_ENV: &str = "COREKIT_CONFIG";

/// Mode bits applied when a path is forced writable (`rwxrwxrwx`).
pub const WORLD_WRITABLE_MODE: u32 = 0o777;

/// Version-control and housekeeping names never descended into when zipping.
pub const DEFAULT_SKIP_NAMES: &[&str] = &[".git", ".svn", ".hg", ".htaccess", ".gitkeep"];

const CONFIG_SCHEMA: &str = include_str!("../schema/config.schema.json");

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub namespaces: Namespaces,
    pub archive: ArchiveSettings,
    pub tree: TreeSettings,
}

/// Root segments for the three identifier scopes.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Namespaces {
    pub core: String,
    pub extensions: String,
    pub modules: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            core: "Core".to_string(),
            extensions: "Extensions".to_string(),
            modules: "Modules".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArchiveSettings {
    pub skip_names: Vec<String>,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            skip_names: DEFAULT_SKIP_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeSettings {
    pub writable_mode: u32,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            writable_mode: WORLD_WRITABLE_MODE,
        }
    }
}

impl Config {
    /// Pick a configuration source.
    ///
    /// An explicit path wins, then `COREKIT_CONFIG` when it is set and
    /// non-empty, then the built-in defaults. A named file that fails to load
    /// is an error rather than a silent fallback.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return load_config_from_path(path);
        }
        if let Some(path) = config_path_from_env() {
            return load_config_from_path(&path)
                .with_context(|| format!("loading config named by {CONFIG_ENV}"));
        }
        Ok(Self::default())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    let value = env::var_os(CONFIG_ENV)?;
    if value.is_empty() {
        return None;
    }
    Some(PathBuf::from(value))
}

/// Read, schema-check, and parse a JSON config file.
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let value: Value = serde_json::from_str(&data)
        .with_context(|| format!("parsing config {}", path.display()))?;
    validate_against_schema(&value)
        .with_context(|| format!("config {} failed schema validation", path.display()))?;
    let config: Config = serde_json::from_value(value)
        .with_context(|| format!("decoding config {}", path.display()))?;
    Ok(config)
}

fn validate_against_schema(value: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(CONFIG_SCHEMA).context("parsing embedded config schema")?;
    let compiled =
        JSONSchema::compile(&schema).map_err(|err| anyhow!("compiling config schema: {err}"))?;

    if let Err(errors) = compiled.validate(value) {
        let details = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        bail!("{details}");
    }
    Ok(())
}
