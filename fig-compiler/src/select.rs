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

//! Selection of a subset of candidates from a numbered menu.

use std::fmt;
use std::io::{self, BufRead, Write};

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("invalid selection '{entry}': please enter numbers between 1 and {count}, separated by commas")]
    InvalidEntry { entry: String, count: usize },
    #[error("failed to read the selection: {0}")]
    Io(#[from] io::Error),
}

/// Parse a selection of the form `1,3,4` into zero-based indices.
///
/// An empty selection selects all candidates. Duplicate entries are
/// ignored, the order of first occurrence is kept.
pub fn parse_selection(input: &str, count: usize) -> Result<Vec<usize>, SelectionError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok((0..count).collect());
    }
    let mut indices = vec![];
    for entry in input.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let index = entry
            .parse::<usize>()
            .ok()
            .filter(|index| (1..=count).contains(index))
            .ok_or_else(|| SelectionError::InvalidEntry { entry: entry.to_owned(), count })?;
        if !indices.contains(&(index - 1)) {
            indices.push(index - 1);
        }
    }
    Ok(indices)
}

/// Print the numbered list of candidates to `output`, read the
/// selection from `input`, and return the selected candidates.
pub fn choose_subset<T: Clone + fmt::Display>(
    title: &str,
    candidates: &[T],
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<Vec<T>, SelectionError> {
    if candidates.is_empty() {
        return Ok(vec![]);
    }
    writeln!(output, "\n{title}:")?;
    for (index, candidate) in candidates.iter().enumerate() {
        writeln!(output, "{}. {}", index + 1, candidate)?;
    }
    write!(output, "\nSelect entries (e.g., 1,3,4), or press Enter for all: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(parse_selection(&line, candidates.len())?
        .into_iter()
        .map(|index| candidates[index].clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("", 3).unwrap(), vec![0, 1, 2]);
        assert_eq!(parse_selection("  \n", 2).unwrap(), vec![0, 1]);
        assert_eq!(parse_selection("1,3", 3).unwrap(), vec![0, 2]);
        assert_eq!(parse_selection(" 3 , 1,3,, ", 3).unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_parse_invalid_selection() {
        for input in ["0", "4", "a", "1,-2"] {
            assert!(
                matches!(parse_selection(input, 3), Err(SelectionError::InvalidEntry { count: 3, .. })),
                "{input}"
            );
        }
    }

    #[test]
    fn test_choose_subset() {
        let candidates = vec!["bmp.yml".to_owned(), "wav.yml".to_owned(), "png.yml".to_owned()];
        let mut input = "2,3\n".as_bytes();
        let mut output = vec![];
        let selected = choose_subset("Available source files", &candidates, &mut input, &mut output).unwrap();
        assert_eq!(selected, vec!["wav.yml".to_owned(), "png.yml".to_owned()]);

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Available source files:"));
        assert!(output.contains("1. bmp.yml\n2. wav.yml\n3. png.yml\n"));
    }

    #[test]
    fn test_choose_subset_empty_input() {
        let candidates = vec![1, 2];
        let mut input = "".as_bytes();
        let selected = choose_subset("Numbers", &candidates, &mut input, &mut io::sink()).unwrap();
        assert_eq!(selected, vec![1, 2]);
    }
}
