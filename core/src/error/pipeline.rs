use thiserror::Error;

/// Stable error codes shared by the CLI exit mapping and the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    GenerationExhausted,
    Upstream,
    MalformedInput,
    SandboxFailure,
    Timeout,
    Store,
    InvalidRequest,
    Io,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerationExhausted => "GENERATION_EXHAUSTED",
            Self::Upstream => "UPSTREAM_ERROR",
            Self::MalformedInput => "MALFORMED_INPUT",
            Self::SandboxFailure => "SANDBOX_FAILURE",
            Self::Timeout => "TIMEOUT",
            Self::Store => "STORE_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Io => "IO_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Object store failures. Kept separate so store implementations do not
/// depend on the pipeline taxonomy.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("store io error on {key}: {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Typed outcome of every pipeline stage.
///
/// No stage raises past its own boundary: generation, sandbox execution and
/// analysis all return one of these so the caller gets a structured failure
/// with a human-readable message.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Every attempt produced a structurally invalid test plan.
    #[error("no valid test plan after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    /// The generative model failed; the text is surfaced verbatim.
    #[error("upstream model error: {0}")]
    Upstream(String),

    /// Raw results were unreadable, lacked required columns, or were empty.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The isolated run failed. `console` carries the full container output.
    #[error("sandbox run failed ({}): {reason}", exit_code_label(.exit_code))]
    SandboxFailure {
        exit_code: Option<i64>,
        reason: String,
        console: String,
    },

    /// A wait budget elapsed. The underlying work may still be running.
    #[error("{stage} timed out after {after_secs}s")]
    Timeout { stage: &'static str, after_secs: u64 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The executor could not run the work at all (closed, no handler).
    #[error("internal error: {0}")]
    Internal(String),
}

fn exit_code_label(code: &Option<i64>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}

impl PipelineError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::GenerationExhausted { .. } => ErrorCode::GenerationExhausted,
            Self::Upstream(_) => ErrorCode::Upstream,
            Self::MalformedInput(_) => ErrorCode::MalformedInput,
            Self::SandboxFailure { .. } => ErrorCode::SandboxFailure,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Store(_) => ErrorCode::Store,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::Io(_) => ErrorCode::Io,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Attempt count, where the failure carries one.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::GenerationExhausted { attempts } => Some(*attempts),
            _ => None,
        }
    }

    pub fn sandbox(exit_code: Option<i64>, reason: impl Into<String>, console: String) -> Self {
        Self::SandboxFailure {
            exit_code,
            reason: reason.into(),
            console,
        }
    }
}
