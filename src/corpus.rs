use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::IMAGE_EXTENSIONS;
use crate::error::PipelineError;

/// One unique input image, identified by its (size, digest) pair.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Original location of the file.
    pub path: PathBuf,
    /// Base name the file is materialized under. Unique within a run.
    pub name: String,
    pub size: u64,
    pub hash: String,
}

impl SourceFile {
    pub fn dedup_key(&self) -> (u64, String) {
        (self.size, self.hash.clone())
    }
}

/// SHA-256 hex digest of a file's content. Used only as an equality
/// surrogate, never for anything security-sensitive.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Recursively collect candidate image files under `root`.
///
/// Directories and zero-byte files are excluded. A missing or unreadable
/// root is fatal; unreadable entries below it are logged and skipped.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let meta = std::fs::metadata(root).map_err(|e| PipelineError::io(root, e))?;
    if !meta.is_dir() {
        return Err(PipelineError::io(
            root,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) if meta.len() == 0 => {
                log::warn!("Skipping empty file `{}`", entry.path().display());
            }
            Ok(_) => files.push(entry.into_path()),
            Err(e) => {
                log::warn!("Failed to stat `{}`: {}", entry.path().display(), e);
            }
        }
    }
    Ok(files)
}

/// Collapse files with identical (size, digest) pairs.
///
/// Every candidate is hashed (size alone is not a sufficient key).
/// Hashing runs on the rayon pool; the scan that decides which duplicate
/// survives walks the candidates in their original order, so the
/// first-seen file always wins. Base names are made unique with a
/// numeric suffix when two distinct files collide on one.
pub fn dedup(paths: Vec<PathBuf>) -> Vec<SourceFile> {
    let hashed: Vec<Option<(PathBuf, u64, String)>> = paths
        .par_iter()
        .map(|path| {
            let size = match std::fs::metadata(path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    log::warn!("Failed to stat `{}`: {}", path.display(), e);
                    return None;
                }
            };
            match hash_file(path) {
                Ok(hash) => Some((path.clone(), size, hash)),
                Err(e) => {
                    log::warn!("Failed to hash `{}`: {}", path.display(), e);
                    None
                }
            }
        })
        .collect();

    let mut seen = HashSet::new();
    let mut names = HashSet::new();
    let mut unique = Vec::new();
    for (path, size, hash) in hashed.into_iter().flatten() {
        if !seen.insert((size, hash.clone())) {
            log::info!("Skipping duplicate `{}`", path.display());
            continue;
        }
        let name = unique_name(&path, &mut names);
        unique.push(SourceFile {
            path,
            name,
            size,
            hash,
        });
    }
    unique
}

fn unique_name(path: &Path, names: &mut HashSet<String>) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_owned());
    if names.insert(base.clone()) {
        return base;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_owned());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    for n in 1.. {
        let candidate = format!("{}-{}{}", stem, n, ext);
        if names.insert(candidate.clone()) {
            return candidate;
        }
    }
    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_image(Path::new("photo.JPG")));
        assert!(is_image(Path::new("photo.png")));
        assert!(is_image(Path::new("dir/photo.TifF")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("archive")));
    }

    #[test]
    fn colliding_base_names_get_suffixed() {
        let mut names = HashSet::new();
        assert_eq!(unique_name(Path::new("a/cat.png"), &mut names), "cat.png");
        assert_eq!(unique_name(Path::new("b/cat.png"), &mut names), "cat-1.png");
        assert_eq!(unique_name(Path::new("c/cat.png"), &mut names), "cat-2.png");
    }
}
