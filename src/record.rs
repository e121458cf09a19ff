use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::corpus::SourceFile;

/// Timing recorded when every repeat of an invocation failed.
pub const FAILED_TIME_MS: f64 = -1.0;

/// Per-variant measurements for one input file. Written exactly once by
/// the benchmark runner and never modified afterwards; everything
/// derived lives on the owning [`FileRecord`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VariantResult {
    #[serde(rename = "compressed-size")]
    pub compressed_size: Option<u64>,
    /// Best-of-k wall-clock compress time, or [`FAILED_TIME_MS`].
    #[serde(rename = "compress-time-ms")]
    pub compress_time_ms: f64,
    /// Best-of-k wall-clock decompress time, or [`FAILED_TIME_MS`].
    #[serde(rename = "decompress-time-ms")]
    pub decompress_time_ms: f64,
    /// Bytes of normalized input compressed per second.
    #[serde(rename = "compress-speed-bps")]
    pub compress_speed_bps: Option<f64>,
    #[serde(rename = "round-trip-time-ms")]
    pub round_trip_time_ms: Option<f64>,
    #[serde(rename = "restored-hash")]
    pub restored_hash: Option<String>,
    /// True iff the restored file's digest matches the normalized one.
    pub identical: bool,
}

impl VariantResult {
    /// Result for a variant whose every compress attempt failed.
    pub fn failed() -> Self {
        Self {
            compressed_size: None,
            compress_time_ms: FAILED_TIME_MS,
            decompress_time_ms: FAILED_TIME_MS,
            compress_speed_bps: None,
            round_trip_time_ms: None,
            restored_hash: None,
            identical: false,
        }
    }
}

/// Compression ratios of one variant, in percent. Smaller is better.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VariantRatios {
    #[serde(rename = "to-original")]
    pub to_original: Option<f64>,
    #[serde(rename = "to-normalized")]
    pub to_normalized: Option<f64>,
}

/// Cross-variant deltas, all computed as `variant − baseline`.
///
/// The baseline is the first-listed variant. A positive time diff means
/// the baseline was faster; a positive ratio diff means the baseline
/// compressed better (smaller ratio).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VariantDeltas {
    #[serde(rename = "size-diff")]
    pub size_diff: Option<i64>,
    #[serde(rename = "ratio-diff")]
    pub ratio_diff: Option<f64>,
    #[serde(rename = "normalized-ratio-diff")]
    pub normalized_ratio_diff: Option<f64>,
    #[serde(rename = "compress-time-diff-ms")]
    pub compress_time_diff_ms: Option<f64>,
    #[serde(rename = "decompress-time-diff-ms")]
    pub decompress_time_diff_ms: Option<f64>,
    #[serde(rename = "round-trip-diff-ms")]
    pub round_trip_diff_ms: Option<f64>,
}

/// One unique input image and everything measured about it.
///
/// Created at dedup time, enriched in place as the file moves through
/// the pipeline, finalized by [`aggregate`]. Every configured variant
/// has a key in `variants`, `ratios` and (except the baseline) `deltas`
/// from the start, so the serialized schema is identical for complete
/// and partial-failure records.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FileRecord {
    pub filename: String,
    #[serde(rename = "original-size")]
    pub original_size: u64,
    #[serde(rename = "original-hash")]
    pub original_hash: String,
    #[serde(rename = "normalized-path")]
    pub normalized_path: Option<PathBuf>,
    #[serde(rename = "normalized-size")]
    pub normalized_size: Option<u64>,
    #[serde(rename = "normalized-hash")]
    pub normalized_hash: Option<String>,
    pub variants: BTreeMap<String, Option<VariantResult>>,
    pub ratios: BTreeMap<String, Option<VariantRatios>>,
    pub deltas: BTreeMap<String, Option<VariantDeltas>>,
    /// AND across all variants' fidelity checks.
    #[serde(rename = "is-identical")]
    pub is_identical: Option<bool>,
    /// Why the file dropped out of the pipeline, when it did.
    pub error: Option<String>,
}

impl FileRecord {
    pub fn new(src: &SourceFile, variant_names: &[String]) -> Self {
        Self {
            filename: src.name.clone(),
            original_size: src.size,
            original_hash: src.hash.clone(),
            normalized_path: None,
            normalized_size: None,
            normalized_hash: None,
            variants: variant_names.iter().map(|n| (n.clone(), None)).collect(),
            ratios: variant_names.iter().map(|n| (n.clone(), None)).collect(),
            deltas: variant_names
                .iter()
                .skip(1)
                .map(|n| (n.clone(), None))
                .collect(),
            is_identical: None,
            error: None,
        }
    }

    pub fn dedup_key(&self) -> (u64, String) {
        (self.original_size, self.original_hash.clone())
    }

    /// True when every configured variant has a recorded result.
    pub fn benchmarked(&self) -> bool {
        !self.variants.is_empty() && self.variants.values().all(|v| v.is_some())
    }
}

/// `normalized_size / (compress_time_ms / 1000)` in bytes per second.
/// Undefined (never a division) for sentinel or zero timings.
pub fn compress_speed_bps(normalized_size: u64, compress_time_ms: f64) -> Option<f64> {
    if compress_time_ms <= 0.0 {
        return None;
    }
    Some(normalized_size as f64 / (compress_time_ms / 1000.0))
}

fn ratio_percent(compressed: Option<u64>, denom: Option<u64>) -> Option<f64> {
    match (compressed, denom) {
        (Some(c), Some(d)) if d > 0 => Some(c as f64 / d as f64 * 100.0),
        _ => None,
    }
}

fn time_diff(a: f64, b: f64) -> Option<f64> {
    if a >= 0.0 && b >= 0.0 {
        Some(b - a)
    } else {
        None
    }
}

/// Finalize a record once all variants have reported: fidelity AND,
/// per-variant ratios, and `B − A` deltas of every non-baseline variant
/// against the first-listed baseline.
///
/// Must run strictly after the per-file variant loop; it reads
/// `variants` but never writes it.
pub fn aggregate(record: &mut FileRecord, order: &[String]) {
    let Some((baseline_name, rest)) = order.split_first() else {
        return;
    };
    record.is_identical = Some(
        !record.variants.is_empty()
            && record
                .variants
                .values()
                .all(|v| matches!(v, Some(r) if r.identical)),
    );
    for name in order {
        let ratios = record.variants.get(name).and_then(|v| v.as_ref()).map(|r| {
            VariantRatios {
                to_original: ratio_percent(r.compressed_size, Some(record.original_size)),
                to_normalized: ratio_percent(r.compressed_size, record.normalized_size),
            }
        });
        record.ratios.insert(name.clone(), ratios);
    }
    let baseline = record
        .variants
        .get(baseline_name)
        .cloned()
        .flatten();
    for name in rest {
        let delta = match (&baseline, record.variants.get(name).and_then(|v| v.as_ref())) {
            (Some(a), Some(b)) => Some(deltas_between(record, a, b)),
            _ => None,
        };
        record.deltas.insert(name.clone(), delta);
    }
}

fn deltas_between(record: &FileRecord, a: &VariantResult, b: &VariantResult) -> VariantDeltas {
    let original = Some(record.original_size);
    let ratio_diff = |denom: Option<u64>| {
        match (
            ratio_percent(a.compressed_size, denom),
            ratio_percent(b.compressed_size, denom),
        ) {
            (Some(ra), Some(rb)) => Some(rb - ra),
            _ => None,
        }
    };
    VariantDeltas {
        size_diff: match (a.compressed_size, b.compressed_size) {
            (Some(sa), Some(sb)) => Some(sb as i64 - sa as i64),
            _ => None,
        },
        ratio_diff: ratio_diff(original),
        normalized_ratio_diff: ratio_diff(record.normalized_size),
        compress_time_diff_ms: time_diff(a.compress_time_ms, b.compress_time_ms),
        decompress_time_diff_ms: time_diff(a.decompress_time_ms, b.decompress_time_ms),
        round_trip_diff_ms: match (a.round_trip_time_ms, b.round_trip_time_ms) {
            (Some(ta), Some(tb)) => Some(tb - ta),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(results: &[(&str, Option<VariantResult>)]) -> FileRecord {
        let src = SourceFile {
            path: PathBuf::from("cat.png"),
            name: "cat.png".to_owned(),
            size: 4_000_000,
            hash: "deadbeef".to_owned(),
        };
        let names: Vec<String> = results.iter().map(|(n, _)| n.to_string()).collect();
        let mut record = FileRecord::new(&src, &names);
        record.normalized_size = Some(2_000_000);
        record.normalized_hash = Some("cafebabe".to_owned());
        for (name, result) in results {
            record.variants.insert(name.to_string(), result.clone());
        }
        record
    }

    fn ok_result(size: u64, compress_ms: f64, decompress_ms: f64) -> VariantResult {
        VariantResult {
            compressed_size: Some(size),
            compress_time_ms: compress_ms,
            decompress_time_ms: decompress_ms,
            compress_speed_bps: compress_speed_bps(2_000_000, compress_ms),
            round_trip_time_ms: Some(compress_ms + decompress_ms),
            restored_hash: Some("cafebabe".to_owned()),
            identical: true,
        }
    }

    #[test]
    fn speed_is_bytes_per_second() {
        // 2,000,000 bytes in 500ms is 4,000,000 bytes per second.
        assert_eq!(compress_speed_bps(2_000_000, 500.0), Some(4_000_000.0));
    }

    #[test]
    fn speed_is_undefined_for_failed_timings() {
        assert_eq!(compress_speed_bps(2_000_000, FAILED_TIME_MS), None);
        assert_eq!(compress_speed_bps(2_000_000, 0.0), None);
    }

    #[test]
    fn diffs_are_b_minus_a() {
        // Variant "0.4" is listed first, so it is the baseline (A).
        // A positive time diff must mean A was faster.
        let order = vec!["0.4".to_owned(), "0.5".to_owned()];
        let mut record = record_with(&[
            ("0.4", Some(ok_result(1_000_000, 100.0, 40.0))),
            ("0.5", Some(ok_result(800_000, 150.0, 60.0))),
        ]);
        aggregate(&mut record, &order);
        let deltas = record.deltas["0.5"].as_ref().unwrap();
        assert_eq!(deltas.compress_time_diff_ms, Some(50.0));
        assert_eq!(deltas.decompress_time_diff_ms, Some(20.0));
        assert_eq!(deltas.round_trip_diff_ms, Some(70.0));
        assert_eq!(deltas.size_diff, Some(-200_000));
        // B compressed to 20% of original, A to 25%: negative diff,
        // meaning B compressed better.
        assert_eq!(deltas.ratio_diff, Some(-5.0));
        assert_eq!(deltas.normalized_ratio_diff, Some(-10.0));
        assert_eq!(record.is_identical, Some(true));
    }

    #[test]
    fn ratios_are_percentages_of_both_sizes() {
        let order = vec!["0.4".to_owned(), "0.5".to_owned()];
        let mut record = record_with(&[
            ("0.4", Some(ok_result(1_000_000, 100.0, 40.0))),
            ("0.5", Some(ok_result(800_000, 150.0, 60.0))),
        ]);
        aggregate(&mut record, &order);
        let ratios = record.ratios["0.4"].as_ref().unwrap();
        assert_eq!(ratios.to_original, Some(25.0));
        assert_eq!(ratios.to_normalized, Some(50.0));
    }

    #[test]
    fn failed_variant_yields_null_deltas_and_breaks_fidelity() {
        let order = vec!["0.4".to_owned(), "0.5".to_owned()];
        let mut record = record_with(&[
            ("0.4", Some(ok_result(1_000_000, 100.0, 40.0))),
            ("0.5", Some(VariantResult::failed())),
        ]);
        aggregate(&mut record, &order);
        let deltas = record.deltas["0.5"].as_ref().unwrap();
        assert_eq!(deltas.compress_time_diff_ms, None);
        assert_eq!(deltas.size_diff, None);
        assert_eq!(record.is_identical, Some(false));
        // The failed variant still has defined ratios entry (null inner values).
        let ratios = record.ratios["0.5"].as_ref().unwrap();
        assert_eq!(ratios.to_original, None);
    }

    #[test]
    fn missing_variant_leaves_null_deltas() {
        let order = vec!["0.4".to_owned(), "0.5".to_owned()];
        let mut record = record_with(&[
            ("0.4", Some(ok_result(1_000_000, 100.0, 40.0))),
            ("0.5", None),
        ]);
        aggregate(&mut record, &order);
        assert_eq!(record.deltas["0.5"], None);
        assert!(!record.benchmarked());
        assert_eq!(record.is_identical, Some(false));
    }
}
