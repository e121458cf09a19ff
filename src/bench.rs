use std::io::{self, Write};
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;

use crate::config::{Config, VariantConfig};
use crate::corpus;
use crate::invoke::invoke;
use crate::record::{self, FileRecord, VariantResult, FAILED_TIME_MS};
use crate::report::Report;
use crate::testbed::Testbed;

/// Minimum of the sampled wall-clock durations. Taking the minimum (not
/// mean or median) isolates steady-state cost from OS scheduling noise
/// on the cold first touch. Sentinel when no sample succeeded.
pub fn best_duration(samples: &[f64]) -> f64 {
    samples
        .iter()
        .copied()
        .fold(FAILED_TIME_MS, |best, s| {
            if best < 0.0 || s < best {
                s
            } else {
                best
            }
        })
}

/// Outcome of the repeated invocations of one timed operation.
struct TimedInvocations {
    /// Wall-clock duration of each successful attempt, in ms.
    samples: Vec<f64>,
    /// Digest of the artifact left by the last successful attempt.
    artifact_hash: Option<String>,
    /// False when two attempts left differing artifacts.
    deterministic: bool,
}

/// Drives the external compressor builds over the prepared corpus.
///
/// Timed invocations run strictly sequentially: no two of them ever
/// execute concurrently, so the min-of-k signal is never corrupted by
/// sibling contention.
pub struct BenchRunner<'a> {
    config: &'a Config,
    testbed: &'a Testbed,
}

impl<'a> BenchRunner<'a> {
    pub fn new(config: &'a Config, testbed: &'a Testbed) -> Self {
        Self { config, testbed }
    }

    /// Benchmark every prepared record against every variant, finalize
    /// each record, and flush the report after each file so an abort
    /// loses nothing that was finished.
    ///
    /// Returns `true` when the run was interrupted before completing.
    pub fn run(
        &self,
        records: Vec<FileRecord>,
        report: &mut Report,
        report_path: &Path,
        cancel: &AtomicBool,
    ) -> anyhow::Result<bool> {
        let order = self.config.variant_names();
        let name_len = records
            .iter()
            .map(|r| r.filename.len())
            .max()
            .unwrap_or(0)
            + 3;
        let mut interrupted = false;
        'files: for mut record in records {
            if cancel.load(Ordering::SeqCst) {
                interrupted = true;
                break;
            }
            print!("{}", record.filename.blue().bold());
            (0..name_len - record.filename.len()).for_each(|_| print!(" "));
            io::stdout().flush()?;
            if record.error.is_some() {
                println!("{}", "skipped".red());
                report.records.push(record);
                report.write(report_path)?;
                continue;
            }
            for (index, variant) in self.config.variants.iter().enumerate() {
                if cancel.load(Ordering::SeqCst) {
                    // Unfinished records are dropped, not reported.
                    interrupted = true;
                    println!();
                    break 'files;
                }
                const KEYS: &str = "abcdefghijklmnopqrstuvwxyz";
                let key = KEYS.chars().nth(index % KEYS.len()).unwrap().to_string();
                let result = self.bench_variant(&record, variant);
                match &result {
                    r if r.compress_time_ms < 0.0 || r.decompress_time_ms < 0.0 => {
                        print!("{}", "✘".red())
                    }
                    r if !r.identical => print!("{}", key.yellow()),
                    _ => print!("{}", key.green()),
                }
                io::stdout().flush()?;
                record.variants.insert(variant.name.clone(), Some(result));
            }
            println!();
            record::aggregate(&mut record, &order);
            report.records.push(record);
            report.write(report_path)?;
        }
        Ok(interrupted)
    }

    /// Benchmark one (file, variant) pair: compress k times, stat the
    /// artifact, decompress k times, hash the restored file.
    fn bench_variant(&self, record: &FileRecord, variant: &VariantConfig) -> VariantResult {
        let (Some(normalized_path), Some(normalized_size), Some(normalized_hash)) = (
            record.normalized_path.as_deref(),
            record.normalized_size,
            record.normalized_hash.as_deref(),
        ) else {
            return VariantResult::failed();
        };

        let compressed = self
            .testbed
            .compressed_dir(&variant.name)
            .join(format!("{}.cmp", record.filename));
        let restored = self
            .testbed
            .restored_dir(&variant.name)
            .join(format!("{}.{}", record.filename, crate::config::CANONICAL_EXT));

        let compress =
            self.timed_invocations(variant, &variant.compress, normalized_path, &compressed);
        let compress_time_ms = best_duration(&compress.samples);
        if compress_time_ms < 0.0 {
            log::warn!(
                "All {} compress attempts failed for `{}` with variant {}",
                self.config.repeats,
                record.filename,
                variant.name
            );
            return VariantResult::failed();
        }
        if !compress.deterministic {
            log::error!(
                "Variant {} compressed `{}` to different bytes across repeats; discarding its metrics",
                variant.name,
                record.filename
            );
            return VariantResult::failed();
        }
        // Size of the artifact the last successful invocation left behind.
        let compressed_size = std::fs::metadata(&compressed).ok().map(|m| m.len());

        let decompress =
            self.timed_invocations(variant, &variant.decompress, &compressed, &restored);
        let mut decompress_time_ms = best_duration(&decompress.samples);
        if decompress_time_ms < 0.0 {
            log::warn!(
                "All {} decompress attempts failed for `{}` with variant {}",
                self.config.repeats,
                record.filename,
                variant.name
            );
        } else if !decompress.deterministic {
            log::error!(
                "Variant {} restored `{}` to different bytes across repeats; discarding its timing",
                variant.name,
                record.filename
            );
            decompress_time_ms = FAILED_TIME_MS;
        }

        let restored_hash = if decompress_time_ms >= 0.0 {
            decompress.artifact_hash
        } else {
            None
        };
        let identical = matches!(&restored_hash, Some(h) if h == normalized_hash);

        VariantResult {
            compressed_size,
            compress_time_ms,
            decompress_time_ms,
            compress_speed_bps: record::compress_speed_bps(normalized_size, compress_time_ms),
            round_trip_time_ms: if decompress_time_ms >= 0.0 {
                Some(compress_time_ms + decompress_time_ms)
            } else {
                None
            },
            restored_hash,
            identical,
        }
    }

    /// Invoke one external operation `repeats` times sequentially,
    /// recording each successful attempt's wall-clock duration and
    /// hashing the artifact after every attempt so non-deterministic
    /// output fails loudly instead of being silently measured.
    fn timed_invocations(
        &self,
        variant: &VariantConfig,
        program: &Path,
        input: &Path,
        output: &Path,
    ) -> TimedInvocations {
        let mut samples = Vec::with_capacity(self.config.repeats);
        let mut artifact_hash: Option<String> = None;
        let mut deterministic = true;
        for _ in 0..self.config.repeats {
            let mut cmd = build_command(variant, program, input, output);
            let inv = match invoke(&mut cmd, self.config.timeout()) {
                Ok(inv) => inv,
                Err(e) => {
                    log::warn!("Failed to launch `{}`: {}", program.display(), e);
                    continue;
                }
            };
            if !inv.success() {
                log::warn!(
                    "`{}` on `{}`: {}",
                    program.display(),
                    input.display(),
                    inv.describe_failure()
                );
                continue;
            }
            match corpus::hash_file(output) {
                Ok(hash) => {
                    if let Some(prev) = &artifact_hash {
                        if prev != &hash {
                            deterministic = false;
                        }
                    }
                    artifact_hash = Some(hash);
                }
                Err(e) => {
                    log::warn!(
                        "`{}` exited 0 but left no readable artifact at `{}`: {}",
                        program.display(),
                        output.display(),
                        e
                    );
                    continue;
                }
            }
            samples.push(inv.elapsed_ms());
        }
        TimedInvocations {
            samples,
            artifact_hash,
            deterministic,
        }
    }
}

/// `[shim] <program> [args] <input> <output>`
fn build_command(
    variant: &VariantConfig,
    program: &Path,
    input: &Path,
    output: &Path,
) -> Command {
    let mut cmd = match &variant.shim {
        Some(shim) => {
            let mut cmd = Command::new(shim);
            cmd.arg(program);
            cmd
        }
        None => Command::new(program),
    };
    cmd.args(&variant.args);
    cmd.arg(input).arg(output);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn best_duration_takes_the_minimum() {
        assert_eq!(best_duration(&[120.0, 95.0, 130.0]), 95.0);
    }

    #[test]
    fn best_duration_of_no_samples_is_the_sentinel() {
        assert_eq!(best_duration(&[]), FAILED_TIME_MS);
    }

    #[test]
    fn shim_wraps_the_program() {
        let variant = VariantConfig {
            name: "0.5".to_owned(),
            compress: PathBuf::from("pack.exe"),
            decompress: PathBuf::from("unpack.exe"),
            args: vec!["-q".to_owned()],
            shim: Some("wine".to_owned()),
        };
        let cmd = build_command(
            &variant,
            &variant.compress,
            Path::new("in.png"),
            Path::new("out.cmp"),
        );
        assert_eq!(cmd.get_program(), "wine");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["pack.exe", "-q", "in.png", "out.cmp"]);
    }
}
