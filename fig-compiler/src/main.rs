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

//! FIG format descriptor validator and codec generator.

use argh::FromArgs;
use codespan_reporting::term::{self, termcolor};
use std::fmt;
use std::path::{Path, PathBuf};

use fig_compiler::config::{FormatConfig, Settings};
use fig_compiler::select::{self, SelectionError};
use fig_compiler::{analyzer, ast, backends, driver, parser, pipeline};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Rust,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "rust" => Ok(Self::Rust),
            "yaml" => Ok(Self::Yaml),
            _ => Err(format!("could not parse {input:?}, valid option are 'rust', 'yaml'.")),
        }
    }
}

#[derive(FromArgs, Debug)]
/// FIG format descriptor validator and codec generator.
struct Opt {
    #[argh(switch)]
    /// print tool version and exit.
    version: bool,

    #[argh(option, default = "OutputFormat::Rust")]
    /// generate output in this format ("rust", "yaml").
    /// The output is printed on stdout unless '--output-dir' is provided.
    output_format: OutputFormat,

    #[argh(option)]
    /// directory where generated files should go.
    /// Only valid with an input file.
    output_dir: Option<String>,

    #[argh(option)]
    /// path of the formats configuration file.
    /// Defaults to 'config/formats.json', or 'formats.json' if the former does not exist.
    config: Option<String>,

    #[argh(switch)]
    /// configure the formats found in the 'sources' directory.
    bootstrap: bool,

    #[argh(option)]
    /// comma separated list of the entries to process (e.g. "1,3,4"),
    /// instead of prompting for a selection.
    select: Option<String>,

    #[argh(switch)]
    /// validate the input file and report the outcome, without generating code.
    check: bool,

    #[argh(switch)]
    /// write a test scaffold module next to the generated modules.
    test_scaffold: bool,

    #[argh(positional)]
    /// input descriptor file.
    input_file: Option<String>,
}

/// Select entries from the list provided on the command line, or
/// prompt for the selection.
fn choose<T: Clone + fmt::Display>(
    opt: &Opt,
    title: &str,
    candidates: &[T],
) -> Result<Vec<T>, SelectionError> {
    match &opt.select {
        Some(selection) => Ok(select::parse_selection(selection, candidates.len())?
            .into_iter()
            .map(|index| candidates[index].clone())
            .collect()),
        None => select::choose_subset(
            title,
            candidates,
            &mut std::io::stdin().lock(),
            &mut std::io::stdout().lock(),
        ),
    }
}

/// Display adapter for the format selection menu.
#[derive(Clone)]
struct FormatEntry(FormatConfig);

impl fmt::Display for FormatEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.0.name, self.0.yaml_file, self.0.output_dir)
    }
}

/// Display adapter for the source file selection menu.
#[derive(Clone)]
struct SourceEntry(PathBuf);

impl fmt::Display for SourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

fn emit_diagnostics(sources: &ast::SourceDatabase, diagnostics: &analyzer::Diagnostics) {
    let writer = termcolor::StandardStream::stderr(termcolor::ColorChoice::Auto);
    let result = diagnostics.emit(sources, &mut writer.lock());
    if let Err(err) = result {
        eprintln!("could not print analyzer diagnostics: {err}");
    }
}

fn generate_backend(opt: &Opt, input_file: &str) -> Result<(), String> {
    let mut sources = ast::SourceDatabase::new();
    let mut descriptor = match parser::parse_file(&mut sources, input_file) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            let writer = termcolor::StandardStream::stderr(termcolor::ColorChoice::Auto);
            let config = term::Config::default();
            if let Err(err) = term::emit(&mut writer.lock(), &config, &sources, &err) {
                eprintln!("could not print error: {err}");
            }
            return Err(String::from("Error while parsing input"));
        }
    };

    let report = analyzer::validate(&mut descriptor);
    if report.has_errors() || opt.check {
        emit_diagnostics(&sources, &report.diagnostics);
    }
    if report.has_errors() {
        return Err(String::from("Analysis failed"));
    }
    if opt.check {
        println!(
            "{}: {} valid fields, {} reformed fields, {} warnings",
            input_file,
            report.valid,
            report.reformed,
            report.warnings().count()
        );
        return Ok(());
    }

    match (opt.output_format, &opt.output_dir) {
        (OutputFormat::Rust, Some(output_dir)) => {
            let descriptor_file = driver::descriptor_file_name(&descriptor);
            let output_dir = Path::new(output_dir);
            let summary = driver::emit(&descriptor, output_dir, &descriptor_file, opt.test_scaffold)
                .map_err(|err| format!("failed to write generated files: {err}"))?;
            if !summary.is_success() {
                return Err(format!("{} records could not be generated", summary.failed.len()));
            }
        }
        (OutputFormat::Rust, None) => {
            println!("{}", backends::rust::generate(&descriptor).map_err(|err| err.to_string())?);
        }
        (OutputFormat::Yaml, Some(output_dir)) => {
            let path = Path::new(output_dir).join(driver::descriptor_file_name(&descriptor));
            let yaml = backends::yaml::generate(&descriptor)?;
            std::fs::create_dir_all(output_dir)
                .and_then(|_| std::fs::write(&path, yaml))
                .map_err(|err| format!("failed to write {}: {err}", path.display()))?;
        }
        (OutputFormat::Yaml, None) => {
            print!("{}", backends::yaml::generate(&descriptor)?);
        }
    }
    Ok(())
}

fn run_configured(opt: &Opt) -> Result<(), String> {
    let settings = Settings::new(opt.config.as_deref());
    if opt.bootstrap {
        let bootstrapped = pipeline::bootstrap(&settings, |files| {
            let entries = files.iter().cloned().map(SourceEntry).collect::<Vec<_>>();
            Ok(choose(opt, "Available source descriptors", &entries)?.into_iter().map(|e| e.0).collect())
        })
        .map_err(|err| err.to_string())?;
        log::info!("bootstrapped {} formats", bootstrapped.len());
    } else {
        let generated = pipeline::run_generation(
            &settings,
            |configs| {
                let entries = configs.iter().cloned().map(FormatEntry).collect::<Vec<_>>();
                Ok(choose(opt, "Configured formats", &entries)?.into_iter().map(|e| e.0).collect())
            },
            opt.test_scaffold,
        )
        .map_err(|err| err.to_string())?;
        log::info!("generated {} formats", generated);
    }
    Ok(())
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opt: Opt = argh::from_env();

    if opt.version {
        println!("figc {}\nCopyright (C) 2026 Google LLC", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    match opt.input_file.as_ref() {
        Some(input_file) => generate_backend(&opt, input_file),
        None if opt.check || opt.output_dir.is_some() => {
            Err("'--check' and '--output-dir' require an input file".to_owned())
        }
        None => run_configured(&opt),
    }
}
