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

//! Bootstrap and generation of the configured formats.
//!
//! Bootstrapping validates the source descriptors found in the
//! sources directory, writes their reformed version into the formats
//! directory, and records them in the configuration. Generation
//! emits the codecs of the configured formats from their reformed
//! descriptors.

use codespan_reporting::term::termcolor;
use heck::ToUpperCamelCase;
use std::path::{Path, PathBuf};

use crate::config::{self, ConfigError, FormatConfig, Settings};
use crate::driver::{self, EmitSummary};
use crate::select::SelectionError;
use crate::{analyzer, ast, backends, parser, reset};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("format selection failed: {0}")]
    Selection(#[from] SelectionError),
    #[error("failed to load descriptor '{path}':\n{message}")]
    Load { path: String, message: String },
    #[error("descriptor '{path}' is invalid:\n{message}")]
    Invalid { path: String, message: String },
    #[error("{context}: {source}")]
    Io { context: String, source: std::io::Error },
    #[error("failed to serialize descriptor: {0}")]
    Serialize(String),
}

fn io_error(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> PipelineError {
    let context = context.into();
    move |source| PipelineError::Io { context, source }
}

/// Render diagnostics as plain text.
fn render(sources: &ast::SourceDatabase, diagnostics: &analyzer::Diagnostics) -> String {
    let mut buffer = termcolor::Buffer::no_color();
    match diagnostics.emit(sources, &mut buffer) {
        Ok(()) => String::from_utf8_lossy(buffer.as_slice()).into_owned(),
        Err(err) => format!("could not render diagnostics: {err}"),
    }
}

/// Load and validate a descriptor file. The returned descriptor has
/// its legacy placeholders reformed.
pub fn load_descriptor(path: &Path) -> Result<ast::Descriptor, PipelineError> {
    let name = path.to_string_lossy().into_owned();
    let mut sources = ast::SourceDatabase::new();
    let descriptor = parser::parse_file(&mut sources, &name).map_err(|diagnostic| {
        let diagnostics = analyzer::Diagnostics { diagnostics: vec![diagnostic] };
        PipelineError::Load { path: name.clone(), message: render(&sources, &diagnostics) }
    })?;
    analyzer::analyze(&descriptor)
        .map_err(|diagnostics| PipelineError::Invalid { path: name, message: render(&sources, &diagnostics) })
}

/// Derive the configuration of a format from the path of its source
/// descriptor: `sources/BMP.yml` becomes the module `bmp` generated in
/// `formats/bmp`.
pub fn format_config(settings: &Settings, yaml_file: &Path) -> FormatConfig {
    let module_name = yaml_file
        .file_stem()
        .map(|stem| ast::to_field_id(&stem.to_string_lossy()))
        .unwrap_or_default();
    FormatConfig {
        name: module_name.to_upper_camel_case(),
        yaml_file: yaml_file.to_string_lossy().into_owned(),
        output_dir: settings.formats_dir.join(&module_name).to_string_lossy().into_owned(),
        module_name,
    }
}

/// List the descriptor files of the sources directory, sorted by
/// path.
pub fn scan_sources(sources_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let context = format!("failed to read source directory '{}'", sources_dir.display());
    let mut files = vec![];
    for entry in std::fs::read_dir(sources_dir).map_err(io_error(context.clone()))? {
        let path = entry.map_err(io_error(context.clone()))?.path();
        let is_yaml = matches!(path.extension().and_then(|ext| ext.to_str()), Some("yml" | "yaml"));
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Write the reformed descriptor of a format.
fn write_reformed(format: &FormatConfig, descriptor: &ast::Descriptor) -> Result<PathBuf, PipelineError> {
    std::fs::create_dir_all(&format.output_dir)
        .map_err(io_error(format!("failed to create '{}'", format.output_dir)))?;
    let path = format.reformed_path();
    let yaml = backends::yaml::generate(descriptor).map_err(PipelineError::Serialize)?;
    std::fs::write(&path, yaml).map_err(io_error(format!("failed to write '{}'", path.display())))?;
    Ok(path)
}

/// Bootstrap the formats selected from the sources directory.
///
/// Descriptors that fail validation are logged and skipped. Returns
/// the configurations of the bootstrapped formats.
pub fn bootstrap(
    settings: &Settings,
    select: impl FnOnce(&[PathBuf]) -> Result<Vec<PathBuf>, SelectionError>,
) -> Result<Vec<FormatConfig>, PipelineError> {
    log::info!("scanning '{}' for source descriptors", settings.sources_dir.display());
    let files = scan_sources(&settings.sources_dir)?;
    if files.is_empty() {
        log::info!("no descriptor found in '{}'", settings.sources_dir.display());
        return Ok(vec![]);
    }
    let selected = select(&files)?;
    let mut configs = config::load(&settings.config_path)?;
    let mut bootstrapped = vec![];

    for yaml_file in selected {
        log::info!("bootstrapping {}", yaml_file.display());
        let format = format_config(settings, &yaml_file);
        let descriptor = match load_descriptor(&yaml_file) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                log::error!("{err}");
                continue;
            }
        };
        let path = write_reformed(&format, &descriptor)?;
        log::info!("wrote reformed descriptor {}", path.display());

        match configs.iter_mut().find(|config| config.yaml_file == format.yaml_file) {
            Some(config) => {
                config.output_dir = format.output_dir.clone();
                config.module_name = format.module_name.clone();
            }
            None => configs.push(format.clone()),
        }
        bootstrapped.push(format);
    }

    if !bootstrapped.is_empty() {
        config::save(&settings.config_path, &configs)?;
        log::info!("configuration file {} updated", settings.config_path.display());
    }
    Ok(bootstrapped)
}

/// Generate the code of a configured format.
///
/// Generated files of a previous run are removed first. The reformed
/// descriptor is used when present, otherwise the source descriptor
/// is validated and reformed on the fly.
pub fn generate_format(format: &FormatConfig, test_scaffold: bool) -> Result<EmitSummary, PipelineError> {
    log::info!("generating format {}", format.name);
    let output_dir = Path::new(&format.output_dir);
    reset::clear_generated_artifacts(output_dir, &[])
        .map_err(io_error(format!("failed to reset '{}'", format.output_dir)))?;

    let reformed_path = format.reformed_path();
    let mut descriptor = if reformed_path.exists() {
        log::info!("using reformed descriptor {}", reformed_path.display());
        load_descriptor(&reformed_path)?
    } else {
        log::warn!("reformed descriptor {} not found, validating {}", reformed_path.display(), format.yaml_file);
        load_descriptor(Path::new(&format.yaml_file))?
    };
    if descriptor.name.is_empty() {
        descriptor.name = format.module_name.clone();
    }
    driver::emit(&descriptor, output_dir, &format.reformed_file_name(), test_scaffold)
        .map_err(io_error(format!("failed to emit '{}'", format.output_dir)))
}

/// Generate the code of the configured formats picked by `select`.
/// Failures are logged and do not prevent the generation of the
/// other formats. Returns the number of successfully generated
/// formats.
pub fn run_generation(
    settings: &Settings,
    select: impl FnOnce(&[FormatConfig]) -> Result<Vec<FormatConfig>, SelectionError>,
    test_scaffold: bool,
) -> Result<usize, PipelineError> {
    let configs = config::load(&settings.config_path)?;
    if configs.is_empty() {
        log::info!(
            "no format configured in {}, run with --bootstrap to configure formats from '{}'",
            settings.config_path.display(),
            settings.sources_dir.display()
        );
        return Ok(0);
    }
    let mut generated = 0;
    for format in select(&configs)? {
        match generate_format(&format, test_scaffold) {
            Ok(summary) if summary.is_success() => generated += 1,
            Ok(summary) => log::error!("{}: {} records failed", format.name, summary.failed.len()),
            Err(err) => log::error!("{}: {}", format.name, err),
        }
    }
    Ok(generated)
}
