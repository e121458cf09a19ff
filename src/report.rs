use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::record::FileRecord;

/// The persisted report document: one record per unique input file,
/// plus enough run metadata to diff two reports.
///
/// Field names are stable across runs. Records are appended as each
/// file finishes and the whole document is rewritten atomically, so an
/// aborted run always leaves a valid report holding exactly the
/// finished records.
#[derive(Serialize, Deserialize, Debug)]
pub struct Report {
    pub runid: String,
    #[serde(rename = "created-utc")]
    pub created_utc: i64,
    #[serde(rename = "finished-utc")]
    pub finished_utc: Option<i64>,
    /// Variant names in configured order; index 0 is the baseline.
    pub variants: Vec<String>,
    pub records: Vec<FileRecord>,
}

impl Report {
    pub fn new(runid: String, variants: Vec<String>, created_utc: i64) -> Self {
        Self {
            runid,
            created_utc,
            finished_utc: None,
            variants,
            records: Vec::new(),
        }
    }

    /// Atomically (re)write the report: a torn write can never clobber
    /// the previous valid document.
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read report `{}`: {}", path.display(), e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// The report of the most recent run under `workdir`, if any.
    pub fn load_latest(workdir: &Path) -> Option<Self> {
        let path = latest_report_path(workdir);
        if path.is_file() {
            Self::load(&path).ok()
        } else {
            None
        }
    }

    /// Dedup keys of records that carry a result for every variant in
    /// `variants`. Used for best-effort resumption.
    pub fn completed_keys(&self, variants: &[String]) -> HashSet<(u64, String)> {
        self.records
            .iter()
            .filter(|r| variants.iter().all(|v| matches!(r.variants.get(v), Some(Some(_)))))
            .map(|r| r.dedup_key())
            .collect()
    }

    /// Records keyed by their dedup key for O(1) lookup.
    pub fn records_by_key(&self) -> HashMap<(u64, String), &FileRecord> {
        self.records.iter().map(|r| (r.dedup_key(), r)).collect()
    }
}

pub fn latest_report_path(workdir: &Path) -> PathBuf {
    workdir.join("runs").join("latest").join("report.json")
}
