#![allow(unused)]

use std::fs;
use std::path::{Path, PathBuf};

use pixbench::config::{Config, VariantConfig};
use tempdir::TempDir;

/// Write an executable shell script and return its path.
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

/// An identity tool: copies its input to its output.
pub fn copy_tool(dir: &Path, name: &str) -> PathBuf {
    script(dir, name, "cp \"$1\" \"$2\"")
}

/// A tool that always fails without producing output.
pub fn failing_tool(dir: &Path, name: &str) -> PathBuf {
    script(dir, name, "exit 1")
}

/// Scratch tree for one test: a corpus dir, a tools dir with fake
/// external binaries, and a working directory for the run.
pub struct TestRig {
    pub tmp: TempDir,
    pub corpus: PathBuf,
    pub tools: PathBuf,
    pub workdir: PathBuf,
}

impl TestRig {
    pub fn new() -> Self {
        let tmp = TempDir::new("pixbench").unwrap();
        let corpus = tmp.path().join("corpus");
        let tools = tmp.path().join("tools");
        let workdir = tmp.path().join("work");
        fs::create_dir_all(&corpus).unwrap();
        fs::create_dir_all(&tools).unwrap();
        Self {
            tmp,
            corpus,
            tools,
            workdir,
        }
    }

    pub fn image(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.corpus.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Config with two identity variants and a copying "converter".
    /// Every tool round-trips losslessly, so fidelity checks pass.
    pub fn config(&self) -> Config {
        Config {
            repeats: 2,
            timeout_secs: 10,
            converter: copy_tool(&self.tools, "convert")
                .to_string_lossy()
                .into_owned(),
            workdir: self.workdir.clone(),
            variants: vec![
                self.variant("0.4", "cp \"$1\" \"$2\""),
                self.variant("0.5", "cp \"$1\" \"$2\""),
            ],
        }
    }

    /// A variant whose compressor runs `compress_body` and whose
    /// decompressor is an identity copy.
    pub fn variant(&self, name: &str, compress_body: &str) -> VariantConfig {
        VariantConfig {
            name: name.to_owned(),
            compress: script(&self.tools, &format!("pack-{}", name), compress_body),
            decompress: copy_tool(&self.tools, &format!("unpack-{}", name)),
            args: Vec::new(),
            shim: None,
        }
    }
}
