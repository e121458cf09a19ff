//! The benchmark configuration, loaded from `pixbench.toml`.
//!
//! # Example:
//!
//! ```toml
//! repeats = 3            # Optional. Timed invocations per operation
//! timeout-secs = 60      # Optional. Per-invocation timeout
//! converter = "magick"   # Optional. External converter program
//! workdir = "pixbench"   # Optional. Where run artifacts live
//!
//! # The builds under comparison. The first entry is the baseline that
//! # all deltas are computed against.
//! [[variants]]
//! name = "0.4"
//! compress = "tools/pack-0.4.exe"
//! decompress = "tools/unpack-0.4.exe"
//! shim = "wine"
//!
//! [[variants]]
//! name = "0.5"
//! compress = "tools/pack-0.5.exe"
//! decompress = "tools/unpack-0.5.exe"
//! shim = "wine"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Input extensions accepted by the collector (case-insensitive).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "gif", "tga", "tif", "tiff", "pcx", "ppm", "pgm", "webp",
];

/// Extension of the canonical uncompressed raster format all variants
/// are fed with.
pub const CANONICAL_EXT: &str = "png";

fn three() -> usize {
    3
}

fn sixty() -> u64 {
    60
}

fn default_converter() -> String {
    "magick".to_owned()
}

fn default_workdir() -> PathBuf {
    PathBuf::from("pixbench")
}

// Scalar fields come before `variants` so the TOML serializer never has
// to emit a value after an array of tables.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Repeated invocations per timed operation; the minimum wall-clock
    /// duration is recorded.
    #[serde(default = "three")]
    pub repeats: usize,
    /// Per-invocation timeout in seconds.
    #[serde(default = "sixty", rename = "timeout-secs")]
    pub timeout_secs: u64,
    /// External converter producing the canonical format, invoked as
    /// `<converter> <input> <output>`.
    #[serde(default = "default_converter")]
    pub converter: String,
    /// Base directory for run artifacts and reports.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    /// Compressor builds under comparison. Order is significant: the
    /// first entry is the baseline that all deltas are computed against.
    pub variants: Vec<VariantConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VariantConfig {
    /// Variant identifier, e.g. a version string like `0.5`.
    pub name: String,
    /// Compressor binary, invoked as `compress <input> <output>`.
    pub compress: PathBuf,
    /// Decompressor binary, invoked as `decompress <input> <output>`.
    pub decompress: PathBuf,
    /// Extra arguments inserted before the input/output paths.
    #[serde(default)]
    pub args: Vec<String>,
    /// Execution shim for non-native builds (e.g. `wine`). When set,
    /// the binary is run as `<shim> <binary> ...`.
    #[serde(default)]
    pub shim: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        if !path.is_file() {
            anyhow::bail!("Failed to load config file `{}`", path.display());
        }
        let s = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.variants.is_empty() {
            anyhow::bail!("No variants configured");
        }
        for (i, v) in self.variants.iter().enumerate() {
            if v.name.is_empty() {
                anyhow::bail!("Variant #{} has an empty name", i);
            }
            if self.variants[..i].iter().any(|o| o.name == v.name) {
                anyhow::bail!("Duplicate variant name `{}`", v.name);
            }
        }
        if self.repeats == 0 {
            anyhow::bail!("`repeats` must be at least 1");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("`timeout-secs` must be at least 1");
        }
        Ok(())
    }

    /// The first-listed variant. All deltas are `other − baseline`.
    pub fn baseline(&self) -> &VariantConfig {
        &self.variants[0]
    }

    pub fn variant_names(&self) -> Vec<String> {
        self.variants.iter().map(|v| v.name.clone()).collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// True if `path` already carries the canonical format extension.
pub fn is_canonical(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(CANONICAL_EXT))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in() {
        let config: Config = toml::from_str(
            r#"
            [[variants]]
            name = "0.4"
            compress = "tools/pack-0.4.exe"
            decompress = "tools/unpack-0.4.exe"

            [[variants]]
            name = "0.5"
            compress = "tools/pack-0.5.exe"
            decompress = "tools/unpack-0.5.exe"
            shim = "wine"
            "#,
        )
        .unwrap();
        assert_eq!(config.repeats, 3);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.converter, "magick");
        assert_eq!(config.baseline().name, "0.4");
        assert_eq!(config.variants[1].shim.as_deref(), Some("wine"));
        config.validate().unwrap();
    }

    #[test]
    fn duplicate_variant_names_rejected() {
        let config: Config = toml::from_str(
            r#"
            [[variants]]
            name = "0.4"
            compress = "a"
            decompress = "b"

            [[variants]]
            name = "0.4"
            compress = "c"
            decompress = "d"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn canonical_extension_is_case_insensitive() {
        assert!(is_canonical(Path::new("a/b/photo.PNG")));
        assert!(is_canonical(Path::new("photo.png")));
        assert!(!is_canonical(Path::new("photo.jpeg")));
        assert!(!is_canonical(Path::new("photo")));
    }
}
