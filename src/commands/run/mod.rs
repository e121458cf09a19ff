use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use rayon::prelude::*;

use crate::bench::BenchRunner;
use crate::config::{self, Config};
use crate::corpus::{self, SourceFile};
use crate::meta::{generate_runid, RunInfo};
use crate::normalize::Normalizer;
use crate::record::FileRecord;
use crate::report::Report;
use crate::testbed::Testbed;

mod checks;

/// Benchmark the configured compressor variants over an image corpus
#[derive(Parser)]
pub struct RunArgs {
    /// Root directory to scan for images
    #[arg(default_value = ".")]
    pub dir: PathBuf,
    /// Path to the config file
    #[arg(long, default_value = "pixbench.toml")]
    pub config: PathBuf,
    /// Repeated invocations per timed operation (the minimum is kept)
    #[arg(short = 'k', long)]
    pub repeats: Option<usize>,
    /// Per-invocation timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Base working directory for run artifacts
    #[arg(long)]
    pub workdir: Option<PathBuf>,
    /// Carry over results from the previous report for files that were
    /// already fully benchmarked
    #[arg(long, default_value = "false")]
    pub resume: bool,
    /// Worker threads for hashing and normalization
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl RunArgs {
    pub fn run(&self) -> anyhow::Result<()> {
        let mut config = Config::load(&self.config)?;
        if let Some(k) = self.repeats {
            config.repeats = k;
        }
        if let Some(t) = self.timeout {
            config.timeout_secs = t;
        }
        if let Some(dir) = &self.workdir {
            config.workdir = dir.clone();
        }
        checks::environment_checks(&config)?;
        if let Some(jobs) = self.jobs {
            rayon::ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build_global()?;
        }
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let cancel = cancel.clone();
            ctrlc::set_handler(move || {
                eprintln!("\nInterrupted. Finishing the current file...");
                cancel.store(true, Ordering::SeqCst);
            })?;
        }
        execute(&config, &self.dir, self.resume, &cancel)?;
        Ok(())
    }
}

pub struct RunSummary {
    pub report_path: PathBuf,
    pub interrupted: bool,
}

/// Drive the whole pipeline: collect, dedup, materialize, normalize,
/// benchmark, aggregate, write. Split out of [`RunArgs`] so it can be
/// driven without a CLI.
pub fn execute(
    config: &Config,
    corpus_root: &Path,
    resume: bool,
    cancel: &AtomicBool,
) -> anyhow::Result<RunSummary> {
    // Corpus
    let candidates = corpus::collect_files(corpus_root)?;
    let candidate_count = candidates.len();
    let sources = corpus::dedup(candidates);
    if sources.is_empty() {
        anyhow::bail!("No image files found under `{}`", corpus_root.display());
    }

    // Previous results for best-effort resumption
    let previous = if resume {
        Report::load_latest(&config.workdir)
    } else {
        None
    };
    let done = previous
        .as_ref()
        .map(|r| r.completed_keys(&config.variant_names()))
        .unwrap_or_default();

    // Run scaffolding
    let (runid, start_time) = generate_runid();
    let testbed = Testbed::create(&config.workdir, &runid, config)?;
    let mut run_info = RunInfo::new(config, corpus_root, runid.clone(), start_time);
    run_info.dump(&testbed.run_dir().join("config.toml"))?;

    print_before_run(&runid, config, &testbed, sources.len(), candidate_count);

    let variant_names = config.variant_names();
    let mut report = Report::new(
        runid,
        variant_names.clone(),
        start_time.to_utc().timestamp(),
    );
    let report_path = testbed.report_path();

    // Finished records from the previous run go straight to the report.
    let prev_by_key = previous
        .as_ref()
        .map(|r| r.records_by_key())
        .unwrap_or_default();
    let mut to_bench = Vec::new();
    for src in sources {
        match prev_by_key.get(&src.dedup_key()) {
            Some(prev) if done.contains(&src.dedup_key()) => {
                log::info!("Carrying over previous result for `{}`", src.name);
                report.records.push((*prev).clone());
            }
            _ => to_bench.push(src),
        }
    }
    report.write(&report_path)?;

    // Materialize and normalize off the timed path, in parallel.
    let normalizer = Normalizer::new(config);
    let records: Vec<FileRecord> = to_bench
        .par_iter()
        .map(|src| prepare(src, &variant_names, &testbed, &normalizer))
        .collect();

    // Timed benchmarking, strictly sequential.
    let runner = BenchRunner::new(config, &testbed);
    let interrupted = runner.run(records, &mut report, &report_path, cancel)?;

    if !interrupted {
        report.finished_utc = Some(chrono::Local::now().to_utc().timestamp());
    }
    report.write(&report_path)?;

    run_info.finish_timestamp_utc = report.finished_utc;
    run_info.dump(&testbed.run_dir().join("config.toml"))?;

    print_after_run(&report, &report_path, interrupted);
    Ok(RunSummary {
        report_path,
        interrupted,
    })
}

/// Materialize one unique input into the testbed and produce its
/// canonical rendering. Failures are recorded on the returned record,
/// never propagated: one bad file must not stop the run.
fn prepare(
    src: &SourceFile,
    variant_names: &[String],
    testbed: &Testbed,
    normalizer: &Normalizer,
) -> FileRecord {
    let mut record = FileRecord::new(src, variant_names);
    let input = match testbed.materialize(&src.path, &src.name) {
        Ok(path) => path,
        Err(e) => {
            log::warn!("{}", e);
            record.error = Some(e.to_string());
            return record;
        }
    };
    let normalized = testbed
        .normalized_dir()
        .join(format!("{}.{}", src.name, config::CANONICAL_EXT));
    if let Err(e) = normalizer.normalize(&input, &normalized) {
        log::warn!("{}", e);
        record.error = Some(e.to_string());
        return record;
    }
    match std::fs::metadata(&normalized) {
        Ok(meta) => record.normalized_size = Some(meta.len()),
        Err(e) => {
            record.error = Some(format!("failed to stat `{}`: {}", normalized.display(), e));
            return record;
        }
    }
    match corpus::hash_file(&normalized) {
        Ok(hash) => record.normalized_hash = Some(hash),
        Err(e) => {
            record.error = Some(format!("failed to hash `{}`: {}", normalized.display(), e));
            return record;
        }
    }
    record.normalized_path = Some(normalized);
    record
}

fn print_before_run(
    runid: &str,
    config: &Config,
    testbed: &Testbed,
    unique: usize,
    candidates: usize,
) {
    print_md!("# {}\n\n", runid);
    print_md!("* workdir: `{}`", testbed.run_dir().display());
    print_md!("* files: `{}` unique of `{}` candidates", unique, candidates);
    print_md!(
        "* variants: `{}`",
        config
            .variants
            .iter()
            .map(|v| v.name.as_str())
            .collect::<Vec<_>>()
            .join("`, `")
    );
    print_md!("* repeats: `{}`", config.repeats);
    print_md!("* timeout: `{}s`", config.timeout_secs);
    println!();
    println!("{}\n", "Running Benchmarks...".blue());
}

fn print_after_run(report: &Report, report_path: &Path, interrupted: bool) {
    if interrupted {
        println!(
            "\n{}\n",
            "✋ Benchmarking interrupted. Finished records were kept.".yellow()
        );
    } else {
        println!("\n{}\n", "✔ Benchmarking Finished.".green());
    }
    let failed: Vec<_> = report
        .records
        .iter()
        .filter(|r| r.error.is_some())
        .collect();
    if !failed.is_empty() {
        eprintln!("{}", format!("{} file(s) were skipped:", failed.len()).red());
        for r in &failed {
            eprintln!(
                "{} {}: {}",
                "•".bright_red(),
                r.filename.red(),
                r.error.as_deref().unwrap_or_default().red()
            );
        }
        eprintln!();
    }
    let mismatched = report
        .records
        .iter()
        .filter(|r| r.error.is_none() && r.is_identical == Some(false))
        .count();
    if mismatched > 0 {
        println!(
            "{}\n",
            format!("{} file(s) did not round-trip identically.", mismatched).yellow()
        );
    }
    print_md!("Full report at:\n");
    print_md!("* `{}`\n\n", report_path.display());
    print_md!("Please run `pixbench report` to view results.\n");
}
