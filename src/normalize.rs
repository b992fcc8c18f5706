#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use anyhow::Context;

/// Errors raised while normalizing one source file. Always scoped to that
/// file; the batch continues.
#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    /// The file decodes as neither UTF-8 nor GBK.
    #[error("{path} decodes as neither UTF-8 nor GBK")]
    Encoding {
        /// The offending file.
        path: PathBuf,
    },
    /// Any other I/O failure around the rewrite.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Blocking idioms stripped so batch execution cannot hang on stdin.
const BLOCKING_IDIOMS: [&str; 3] = ["system(\"pause\");", "system (\"pause\");", "getchar()"];

/// Decodes submitted source bytes, trying UTF-8 first and GBK second.
fn decode(bytes: &[u8], path: &Path) -> Result<String, NormalizeError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }
    let (text, _, had_errors) = encoding_rs::GBK.decode(bytes);
    if had_errors {
        return Err(NormalizeError::Encoding {
            path: path.to_path_buf(),
        });
    }
    Ok(text.into_owned())
}

/// Applies the textual patch to decoded source text.
///
/// Strips the known blocking idioms and, when no line mentions both
/// `include` and `algorithm`, injects `#include<algorithm>` immediately
/// after the first line. This is not a parser; nothing else is altered.
fn patch(text: &str) -> String {
    let mut has_algorithm = false;
    let mut lines: Vec<String> = Vec::new();

    for line in text.lines() {
        if line.contains("include") && line.contains("algorithm") {
            has_algorithm = true;
        }
        let mut line = line.to_string();
        for idiom in BLOCKING_IDIOMS {
            if line.contains(idiom) {
                line = line.replace(idiom, "");
            }
        }
        lines.push(line);
    }

    if !has_algorithm && !lines.is_empty() {
        lines.insert(1, "#include<algorithm>".to_string());
    }

    let mut patched = lines.join("\n");
    patched.push('\n');
    patched
}

/// Rewrites `path` in place as normalized UTF-8: legacy encoding decoded,
/// blocking idioms stripped, required header ensured.
pub fn normalize_source(path: &Path) -> Result<(), NormalizeError> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Could not read {} for normalizing", path.display()))?;
    let text = decode(&bytes, path)?;
    let patched = patch(&text);
    std::fs::write(path, patched)
        .with_context(|| format!("Could not rewrite {}", path.display()))?;
    Ok(())
}
