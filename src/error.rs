use std::path::PathBuf;

/// Failure classes of the benchmark pipeline.
///
/// `Environment` aborts the run before any work starts. The other
/// classes are scoped to a single file (or a single file/variant pair),
/// get recorded on the report, and never abort the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("missing external dependency: {0}")]
    Environment(String),

    #[error("i/o failure on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("conversion failed for `{path}`: {reason}")]
    Conversion { path: PathBuf, reason: String },

    #[error("subprocess `{program}` failed: {reason}")]
    Subprocess { program: String, reason: String },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code when this error surfaces at the CLI boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Environment(_) => 2,
            _ => 1,
        }
    }

    /// Short class tag used for the end-of-run failure summary.
    pub fn class(&self) -> &'static str {
        match self {
            PipelineError::Environment(_) => "environment",
            PipelineError::Io { .. } => "io",
            PipelineError::Conversion { .. } => "conversion",
            PipelineError::Subprocess { .. } => "subprocess",
        }
    }
}
