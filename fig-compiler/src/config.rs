// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Store of the configured formats.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration of one format, as persisted in `formats.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatConfig {
    pub name: String,
    /// Path of the source descriptor.
    pub yaml_file: String,
    /// Directory receiving the reformed descriptor and the generated
    /// code.
    pub output_dir: String,
    /// Name of the generated Rust module.
    pub module_name: String,
}

impl FormatConfig {
    /// Return the file name of the reformed descriptor.
    pub fn reformed_file_name(&self) -> String {
        format!("{}.yaml", self.module_name)
    }

    /// Return the path of the reformed descriptor.
    pub fn reformed_path(&self) -> PathBuf {
        Path::new(&self.output_dir).join(self.reformed_file_name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file '{path}': {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write configuration file '{path}': {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("failed to parse configuration file '{path}': {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("failed to serialize the configuration: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Load the configured formats.
/// A missing configuration file is an empty configuration.
pub fn load(path: &Path) -> Result<Vec<FormatConfig>, ConfigError> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            log::info!("configuration file '{}' not found, using an empty configuration", path.display());
            return Ok(vec![]);
        }
        Err(source) => return Err(ConfigError::Read { path: path.to_owned(), source }),
    };
    let configs: Vec<FormatConfig> = serde_json::from_str(&data)
        .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })?;
    log::info!("loaded {} format configurations from {}", configs.len(), path.display());
    Ok(configs)
}

/// Save the configured formats, sorted by name.
pub fn save(path: &Path, configs: &[FormatConfig]) -> Result<(), ConfigError> {
    let mut configs = configs.to_vec();
    configs.sort_by(|a, b| a.name.cmp(&b.name));
    let data = serde_json::to_string_pretty(&configs).map_err(ConfigError::Serialize)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|source| ConfigError::Write { path: path.to_owned(), source })?;
    }
    std::fs::write(path, data + "\n").map_err(|source| ConfigError::Write { path: path.to_owned(), source })
}

/// Locations used by the bootstrap and generation pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_path: PathBuf,
    /// Directory scanned for source descriptors.
    pub sources_dir: PathBuf,
    /// Parent directory of the generated formats.
    pub formats_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let config_path = Path::new("config").join("formats.json");
        let config_path = if config_path.exists() { config_path } else { PathBuf::from("formats.json") };
        Settings { config_path, sources_dir: PathBuf::from("sources"), formats_dir: PathBuf::from("formats") }
    }
}

impl Settings {
    /// Override the default settings with the provided values.
    pub fn new(config_path: Option<&str>) -> Settings {
        let mut settings = Settings::default();
        if let Some(path) = config_path {
            settings.config_path = PathBuf::from(path);
        }
        settings
    }
}
