#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{process, util::cxx_path};

/// The build result for one source file. A missing artifact is an implicit
/// compile failure.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// The source file handed to the builder.
    pub source:   PathBuf,
    /// The produced executable, when compilation succeeded.
    pub artifact: Option<PathBuf>,
}

/// The external build collaborator: turns each source file into a runnable
/// artifact in `bin_dir`, or fails for that source. One outcome is returned
/// per input, in input order.
#[allow(async_fn_in_trait)]
pub trait Builder {
    /// Builds the whole source set into `bin_dir`.
    async fn build(&self, sources: &[PathBuf], bin_dir: &Path) -> Result<Vec<BuildOutcome>>;
}

/// Builder that drives a C++ compiler found on the PATH (or named by
/// `TALLY_CXX`), one deadline-bounded invocation per source.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    /// Compiler binary to invoke.
    compiler: OsString,
    /// Wall-clock deadline per compiler invocation.
    timeout:  Duration,
}

impl CommandBuilder {
    /// Locates the compiler and configures the per-invocation deadline.
    pub fn discover(timeout: Duration) -> Result<Self> {
        Ok(Self {
            compiler: cxx_path()?,
            timeout,
        })
    }

    /// Creates a builder around an explicit compiler binary.
    pub fn with_compiler(compiler: impl Into<OsString>, timeout: Duration) -> Self {
        Self {
            compiler: compiler.into(),
            timeout,
        }
    }

    /// The artifact path a source compiles to.
    fn artifact_path(source: &Path, bin_dir: &Path) -> Result<PathBuf> {
        let stem = source
            .file_stem()
            .with_context(|| format!("{} has no file stem", source.display()))?;
        Ok(bin_dir.join(stem))
    }
}

impl Builder for CommandBuilder {
    async fn build(&self, sources: &[PathBuf], bin_dir: &Path) -> Result<Vec<BuildOutcome>> {
        info!("Compiling {} sources", sources.len());
        let mut outcomes = Vec::with_capacity(sources.len());

        for source in sources {
            let artifact = Self::artifact_path(source, bin_dir)?;
            let args = vec![
                source.clone().into_os_string(),
                OsString::from("-O2"),
                OsString::from("-o"),
                artifact.clone().into_os_string(),
            ];

            let produced = match process::run_collect(
                &self.compiler,
                &args,
                None,
                Some(self.timeout),
            )
            .await
            {
                Ok(collected) if collected.status.success() && artifact.exists() => {
                    debug!("Compiled {}", source.display());
                    true
                }
                Ok(collected) => {
                    warn!(
                        "Compilation failed for {}: {}",
                        source.display(),
                        String::from_utf8_lossy(&collected.stderr).trim()
                    );
                    false
                }
                Err(e) => {
                    warn!("Compiler did not finish for {}: {e:#}", source.display());
                    false
                }
            };

            outcomes.push(BuildOutcome {
                source: source.clone(),
                artifact: produced.then_some(artifact),
            });
        }

        Ok(outcomes)
    }
}
