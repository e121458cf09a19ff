use crate::record::FileRecord;

/// Aggregate numbers for one variant across all benchmarked records.
#[derive(Debug, PartialEq)]
pub struct VariantSummary {
    pub name: String,
    /// Records with a result for this variant.
    pub files: usize,
    /// Records where this variant failed outright.
    pub failures: usize,
    /// Records whose round trip was bit-identical.
    pub identical: usize,
    pub total_compressed: u64,
    /// Mean/geomean of the compressed-to-normalized ratio, percent.
    pub mean_ratio: Option<f64>,
    pub geomean_ratio: Option<f64>,
    pub mean_compress_ms: Option<f64>,
    pub mean_decompress_ms: Option<f64>,
}

pub fn summarize(records: &[FileRecord], variants: &[String]) -> Vec<VariantSummary> {
    variants
        .iter()
        .map(|name| {
            let mut summary = VariantSummary {
                name: name.clone(),
                files: 0,
                failures: 0,
                identical: 0,
                total_compressed: 0,
                mean_ratio: None,
                geomean_ratio: None,
                mean_compress_ms: None,
                mean_decompress_ms: None,
            };
            let mut ratios = Vec::new();
            let mut compress_ms = Vec::new();
            let mut decompress_ms = Vec::new();
            for record in records {
                let Some(Some(result)) = record.variants.get(name) else {
                    continue;
                };
                summary.files += 1;
                if result.compress_time_ms < 0.0 || result.decompress_time_ms < 0.0 {
                    summary.failures += 1;
                }
                if result.identical {
                    summary.identical += 1;
                }
                summary.total_compressed += result.compressed_size.unwrap_or(0);
                if let Some(ratio) = record
                    .ratios
                    .get(name)
                    .and_then(|r| r.as_ref())
                    .and_then(|r| r.to_normalized)
                {
                    ratios.push(ratio);
                }
                if result.compress_time_ms >= 0.0 {
                    compress_ms.push(result.compress_time_ms);
                }
                if result.decompress_time_ms >= 0.0 {
                    decompress_ms.push(result.decompress_time_ms);
                }
            }
            summary.mean_ratio = mean(&ratios);
            summary.geomean_ratio = geomean(&ratios);
            summary.mean_compress_ms = mean(&compress_ms);
            summary.mean_decompress_ms = mean(&decompress_ms);
            summary
        })
        .collect()
}

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Geometric mean. Defined only for strictly positive samples.
pub fn geomean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() || xs.iter().any(|x| *x <= 0.0) {
        return None;
    }
    let log_sum: f64 = xs.iter().map(|x| x.ln()).sum();
    Some((log_sum / xs.len() as f64).exp())
}
