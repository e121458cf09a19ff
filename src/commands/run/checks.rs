use std::path::Path;
use std::process::{Command, Stdio};

use colored::Colorize;

use crate::config::Config;
use crate::error::PipelineError;

/// Environment checks that must pass before any work starts. A failure
/// here aborts the run with exit code 2; warnings are collected and
/// dumped in one block.
struct EnvChecker {
    warnings: Vec<String>,
}

impl EnvChecker {
    fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_owned());
    }

    /// A program responds if it can be spawned at all; its exit status
    /// is irrelevant since version-probe flags differ between tools.
    fn responds(program: &str, probe_arg: &str) -> bool {
        Command::new(program)
            .arg(probe_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn check(&mut self, config: &Config) -> Result<(), PipelineError> {
        if !Self::responds(&config.converter, "-version") {
            return Err(PipelineError::Environment(format!(
                "converter `{}` cannot be executed; install it or set `converter` in the config",
                config.converter
            )));
        }
        for variant in &config.variants {
            if let Some(shim) = &variant.shim {
                if !Self::responds(shim, "--version") {
                    return Err(PipelineError::Environment(format!(
                        "shim `{}` required by variant {} cannot be executed",
                        shim, variant.name
                    )));
                }
            }
            for (role, bin) in [
                ("compressor", &variant.compress),
                ("decompressor", &variant.decompress),
            ] {
                if !bin.is_file() {
                    return Err(PipelineError::Environment(format!(
                        "{} `{}` of variant {} not found",
                        role,
                        bin.display(),
                        variant.name
                    )));
                }
                if variant.shim.is_none() && !is_executable(bin) {
                    self.warn(format!(
                        "`{}` is not marked executable; its invocations will likely fail",
                        bin.display()
                    ));
                }
            }
        }
        Ok(())
    }

    fn dump_warnings(&self) {
        if self.warnings.is_empty() {
            return;
        }
        eprintln!("{}\n", "WARNING".bold().black().on_red());
        for msg in &self.warnings {
            eprintln!("{} {}", "•".bright_red(), msg.red());
        }
        eprintln!();
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

/// Verify the external converter, every variant binary, and every
/// declared shim before the run starts.
pub fn environment_checks(config: &Config) -> Result<(), PipelineError> {
    let mut checker = EnvChecker::new();
    checker.check(config)?;
    checker.dump_warnings();
    Ok(())
}
