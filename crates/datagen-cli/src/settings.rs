use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File read when `--config` is not given; missing is fine.
pub const DEFAULT_SETTINGS_FILE: &str = "datagen.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("toml decode error in {path}: {source}")]
    TomlDecode {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Defaults for the `generate` command; flags win over these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliSettings {
    pub seed: Option<u64>,
    pub export_feature_names: bool,
    pub export_instance_ids: bool,
    pub log_file: Option<PathBuf>,
}

/// Load settings from `path`, or from `datagen.toml` in the working
/// directory when it exists.
pub fn load_settings(path: Option<&Path>) -> Result<CliSettings, SettingsError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
    };

    if !required && !path.exists() {
        return Ok(CliSettings::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
        path: path.clone(),
        source,
    })?;
    parse_settings(&content).map_err(|source| SettingsError::TomlDecode { path, source })
}

fn parse_settings(content: &str) -> Result<CliSettings, toml::de::Error> {
    toml::from_str(content)
}
