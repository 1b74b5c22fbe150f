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

use std::io;
use std::path::Path;

/// Remove the generated Rust files of an output directory, except
/// the files named in `preserve`. The directory is created if it does
/// not exist. Returns the number of removed files.
pub fn clear_generated_artifacts(dir: &Path, preserve: &[&str]) -> io::Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else { continue };
        if !entry.file_type()?.is_file()
            || !file_name.ends_with(".rs")
            || preserve.contains(&file_name)
        {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                log::debug!("removed generated file {}", entry.path().display());
                removed += 1;
            }
            Err(err) => log::warn!("failed to remove {}: {}", entry.path().display(), err),
        }
    }
    log::info!("removed {} generated file(s) from {}", removed, dir.display());
    Ok(removed)
}
