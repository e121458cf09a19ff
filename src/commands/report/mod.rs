use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;

use crate::config::Config;
use crate::meta::RunInfo;
use crate::record::FileRecord;
use crate::report::Report;
use crate::utils::md::MarkdownPrinter;

pub(crate) mod data;

/// Analyze and report benchmark results
#[derive(Parser)]
pub struct ReportArgs {
    /// The run id to report. Defaults to the latest run.
    pub run_id: Option<String>,
    /// Path to the config file (locates the working directory)
    #[arg(long, default_value = "pixbench.toml")]
    pub config: PathBuf,
    /// Base working directory holding the runs
    #[arg(long)]
    pub workdir: Option<PathBuf>,
}

impl ReportArgs {
    fn find_workdir(&self) -> PathBuf {
        if let Some(dir) = &self.workdir {
            return dir.clone();
        }
        Config::load(&self.config)
            .map(|c| c.workdir)
            .unwrap_or_else(|_| PathBuf::from("pixbench"))
    }

    fn find_run_dir(&self) -> anyhow::Result<PathBuf> {
        let runs_dir = self.find_workdir().join("runs");
        let run_dir = match &self.run_id {
            Some(run_id) => runs_dir.join(run_id),
            None => runs_dir.join("latest"),
        };
        if !run_dir.exists() {
            anyhow::bail!("Run dir not found: {}", run_dir.display());
        }
        Ok(run_dir)
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let run_dir = self.find_run_dir()?;
        let report_path = run_dir.join("report.json");
        if !report_path.is_file() {
            anyhow::bail!("Benchmark report not found: {}", report_path.display());
        }
        let report = Report::load(&report_path)?;
        // Run metadata is best-effort; the report alone is enough.
        let run_info = RunInfo::load(&run_dir.join("config.toml")).ok();

        let mut printer = MarkdownPrinter::new();
        printer.add(format!("# [{}] Benchmark Results\n\n", report.runid));
        printer.add(format!(
            "* Start Time (UTC): `{}`\n",
            format_timestamp(Some(report.created_utc))
        ));
        printer.add(format!(
            "* Finish Time (UTC): `{}`\n",
            format_timestamp(report.finished_utc)
        ));
        if let Some(info) = &run_info {
            printer.add(format!("* OS: `{}`\n", info.platform.os));
            printer.add(format!("* CPU: `{}`\n", info.platform.cpu_model));
            printer.add(format!(
                "* Memory: `{} GB`\n",
                info.platform.memory_size >> 30
            ));
        }
        printer.add(format!(
            "* Baseline: `{}`\n",
            report.variants.first().map(String::as_str).unwrap_or("?")
        ));

        printer.add("\n## Per-file Results\n\n");
        self.add_per_file_table(&mut printer, &report);

        printer.add("\n## Summary\n\n");
        self.add_summary_table(&mut printer, &report);

        printer.dump();
        Ok(())
    }

    fn add_per_file_table(&self, printer: &mut MarkdownPrinter, report: &Report) {
        let mut header = vec!["File".to_owned(), "Normalized".to_owned()];
        for v in &report.variants {
            header.push(format!("{} size", v));
            header.push(format!("{} ratio%", v));
            header.push(format!("{} c ms", v));
            header.push(format!("{} d ms", v));
        }
        header.push("Identical".to_owned());
        let rows: Vec<Vec<String>> = report
            .records
            .iter()
            .map(|r| self.per_file_row(r, &report.variants))
            .collect();
        printer.add_table(&header, &rows);
    }

    fn per_file_row(&self, record: &FileRecord, variants: &[String]) -> Vec<String> {
        let mut row = vec![
            record.filename.clone(),
            record
                .normalized_size
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_owned()),
        ];
        for v in variants {
            match record.variants.get(v).and_then(|r| r.as_ref()) {
                Some(result) => {
                    row.push(
                        result
                            .compressed_size
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "-".to_owned()),
                    );
                    row.push(
                        record
                            .ratios
                            .get(v)
                            .and_then(|r| r.as_ref())
                            .and_then(|r| r.to_normalized)
                            .map(|r| format!("{:.1}", r))
                            .unwrap_or_else(|| "-".to_owned()),
                    );
                    row.push(format_time(result.compress_time_ms));
                    row.push(format_time(result.decompress_time_ms));
                }
                None => row.extend(["-", "-", "-", "-"].map(str::to_owned)),
            }
        }
        row.push(match record.is_identical {
            Some(true) => "yes".to_owned(),
            Some(false) => "no".to_owned(),
            None => "-".to_owned(),
        });
        row
    }

    fn add_summary_table(&self, printer: &mut MarkdownPrinter, report: &Report) {
        let summaries = data::summarize(&report.records, &report.variants);
        let header: Vec<String> = [
            "Variant",
            "Files",
            "Failures",
            "Identical",
            "Total bytes",
            "Mean ratio%",
            "Geomean ratio%",
            "Mean c ms",
            "Mean d ms",
        ]
        .map(str::to_owned)
        .to_vec();
        let rows: Vec<Vec<String>> = summaries
            .iter()
            .map(|s| {
                vec![
                    s.name.clone(),
                    s.files.to_string(),
                    s.failures.to_string(),
                    s.identical.to_string(),
                    s.total_compressed.to_string(),
                    format_opt(s.mean_ratio),
                    format_opt(s.geomean_ratio),
                    format_opt(s.mean_compress_ms),
                    format_opt(s.mean_decompress_ms),
                ]
            })
            .collect();
        printer.add_table(&header, &rows);
    }
}

fn format_timestamp(ts: Option<i64>) -> String {
    match ts.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)) {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "N/A".to_owned(),
    }
}

fn format_time(ms: f64) -> String {
    if ms < 0.0 {
        "failed".to_owned()
    } else {
        format!("{:.1}", ms)
    }
}

fn format_opt(x: Option<f64>) -> String {
    x.map(|x| format!("{:.1}", x)).unwrap_or_else(|| "-".to_owned())
}
