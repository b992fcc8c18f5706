#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use glob::glob;
use which::which;

/// Finds and returns the path to the C++ compiler.
///
/// `TALLY_CXX` takes precedence; otherwise `g++`, then `clang++`, is looked
/// up on the PATH.
pub fn cxx_path() -> Result<OsString> {
    if let Ok(cxx) = std::env::var("TALLY_CXX") {
        let cxx = cxx.trim();
        if !cxx.is_empty() {
            return Ok(OsString::from(cxx));
        }
    }

    which("g++")
        .or_else(|_| which("clang++"))
        .map(PathBuf::into_os_string)
        .context("Cannot find a C++ compiler on path (g++ or clang++)")
}

/// A glob utility function to find paths to files with certain extension
///
/// * `extension`: the file extension to find paths for
/// * `search_depth`: how many folders deep to search for
/// * `root_dir`: the root directory where search starts
pub fn find_files(extension: &str, search_depth: i8, root_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pattern = root_dir.to_path_buf();

    for _ in 0..search_depth {
        pattern.push("**");
    }

    pattern.push(format!("*.{extension}"));
    let pattern = pattern
        .to_str()
        .context("Could not convert root_dir to string")?
        .to_string();

    let mut found: Vec<PathBuf> = glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .collect();
    found.sort();
    Ok(found)
}

/// Recursively copies `src` into `dst`, creating `dst` if needed.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst).with_context(|| format!("Could not create {}", dst.display()))?;
    for entry in
        std::fs::read_dir(src).with_context(|| format!("Could not read {}", src.display()))?
    {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).with_context(|| {
                format!("Could not copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}
