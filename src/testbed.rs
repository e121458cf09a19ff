use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::PipelineError;

/// Exclusive working area for one benchmark run.
///
/// Owns the run directory tree and a lock file guarding the base
/// directory against concurrent runs. Inputs placed here are never
/// mutated; every later stage writes new files.
#[derive(Debug)]
pub struct Testbed {
    run_dir: PathBuf,
    lock: PathBuf,
}

impl Testbed {
    /// Claim `base` for this run and lay out the run directory tree:
    /// `<base>/runs/<runid>/{inputs,normalized,<variant>/{compressed,restored}}`
    /// with `<base>/runs/latest` pointing at the new run.
    pub fn create(base: &Path, runid: &str, config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base)?;
        let lock = base.join("lock");
        match OpenOptions::new().write(true).create_new(true).open(&lock) {
            Ok(mut f) => writeln!(f, "{}", std::process::id())?,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let pid = std::fs::read_to_string(&lock).unwrap_or_default();
                anyhow::bail!(
                    "Working directory `{}` is locked by another run (pid {}). \
                     Remove `{}` if that run is gone.",
                    base.display(),
                    pid.trim(),
                    lock.display()
                );
            }
            Err(e) => return Err(e.into()),
        }

        let runs_dir = base.join("runs");
        let run_dir = runs_dir.join(runid);
        std::fs::create_dir_all(run_dir.join("inputs"))?;
        std::fs::create_dir_all(run_dir.join("normalized"))?;
        for variant in &config.variants {
            std::fs::create_dir_all(run_dir.join(&variant.name).join("compressed"))?;
            std::fs::create_dir_all(run_dir.join(&variant.name).join("restored"))?;
        }

        let latest = runs_dir.join("latest");
        if latest.exists() || latest.is_symlink() {
            if latest.is_dir() && !latest.is_symlink() {
                std::fs::remove_dir(&latest)?;
            } else {
                std::fs::remove_file(&latest)?;
            }
        }
        #[cfg(target_os = "windows")]
        std::os::windows::fs::symlink_dir(&run_dir, latest)?;
        #[cfg(not(target_os = "windows"))]
        std::os::unix::fs::symlink(&run_dir, latest)?;

        Ok(Self { run_dir, lock })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn inputs_dir(&self) -> PathBuf {
        self.run_dir.join("inputs")
    }

    pub fn normalized_dir(&self) -> PathBuf {
        self.run_dir.join("normalized")
    }

    pub fn compressed_dir(&self, variant: &str) -> PathBuf {
        self.run_dir.join(variant).join("compressed")
    }

    pub fn restored_dir(&self, variant: &str) -> PathBuf {
        self.run_dir.join(variant).join("restored")
    }

    pub fn report_path(&self) -> PathBuf {
        self.run_dir.join("report.json")
    }

    /// Place `src` into the inputs dir under `name`. Prefers a hard
    /// link; falls back to a byte copy when linking fails (e.g. the
    /// corpus lives on another filesystem).
    pub fn materialize(&self, src: &Path, name: &str) -> Result<PathBuf, PipelineError> {
        let dest = self.inputs_dir().join(name);
        if std::fs::hard_link(src, &dest).is_ok() {
            return Ok(dest);
        }
        match std::fs::copy(src, &dest) {
            Ok(_) => Ok(dest),
            Err(e) => Err(PipelineError::io(src, e)),
        }
    }
}

impl Drop for Testbed {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.lock);
    }
}
