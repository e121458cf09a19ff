use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::config::{self, Config};
use crate::error::PipelineError;
use crate::invoke::invoke;

/// Boundary to the external image converter.
///
/// The converter is a black box with the contract
/// `<converter> <input> <output>`: on success the output path holds a
/// canonical-format rendering of the input. Failures never propagate
/// past this boundary as anything but a `Conversion` error for the one
/// file involved.
pub struct Normalizer<'a> {
    converter: &'a str,
    timeout: Duration,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            converter: &config.converter,
            timeout: config.timeout(),
        }
    }

    /// Produce the canonical rendering of `input` at `output`.
    ///
    /// Already-canonical inputs are byte-copied so the converter cannot
    /// introduce re-encoding drift (and the external call is saved).
    pub fn normalize(&self, input: &Path, output: &Path) -> Result<(), PipelineError> {
        if config::is_canonical(input) {
            std::fs::copy(input, output).map_err(|e| PipelineError::io(input, e))?;
            return Ok(());
        }
        let mut cmd = Command::new(self.converter);
        cmd.arg(input).arg(output);
        let inv = invoke(&mut cmd, self.timeout).map_err(|e| PipelineError::Conversion {
            path: input.to_owned(),
            reason: format!("failed to launch `{}`: {}", self.converter, e),
        })?;
        if !inv.success() {
            return Err(PipelineError::Conversion {
                path: input.to_owned(),
                reason: inv.describe_failure(),
            });
        }
        if !output.is_file() {
            return Err(PipelineError::Conversion {
                path: input.to_owned(),
                reason: format!("`{}` exited 0 but produced no output", self.converter),
            });
        }
        Ok(())
    }
}
