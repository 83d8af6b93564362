// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 16 October 2026

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// The image files named by `path`: the file itself, or the regular
/// files of a directory ordered by file name.
pub(crate) fn discover(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("failed to access {}", path.display()))?;

    if !metadata.is_dir() {
        return Ok(vec![path.to_owned()]);
    }

    let mut files = vec![];
    for entry in std::fs::read_dir(path)
        .with_context(|| format!("failed to open directory {}", path.display()))?
    {
        let entry = entry.with_context(|| format!("failed to read directory {}", path.display()))?;
        let file = entry.path();

        if file.is_file() {
            files.push(file);
        } else {
            log::debug!("skipping {}", file.display());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// How each of `files` is named in the output: the path as given for a
/// single file, the bare file name for the contents of a directory.
pub(crate) fn display_names(input: &Path, files: &[PathBuf]) -> Vec<String> {
    if !input.is_dir() {
        return files.iter().map(|file| file.display().to_string()).collect();
    }

    files
        .iter()
        .map(|file| match file.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => file.display().to_string(),
        })
        .collect()
}
