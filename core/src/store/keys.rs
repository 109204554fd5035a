use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::PipelineError;

pub const KEY_ROOT: &str = "uploads";

/// day-month-year_hour-minute-second, shared by all artifact kinds.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y_%H-%M-%S";

/// The caller on whose behalf artifacts are scoped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(raw: impl Into<String>) -> Result<Self, PipelineError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::InvalidRequest("principal is empty".into()));
        }
        if trimmed.contains('/')
            || trimmed.contains('\\')
            || trimmed.contains("..")
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(PipelineError::InvalidRequest(format!(
                "principal '{trimmed}' contains forbidden characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `uploads/{principal}/`
    pub fn prefix(&self) -> String {
        format!("{KEY_ROOT}/{}/", self.0)
    }

    pub fn key(&self, filename: &str) -> String {
        format!("{}{filename}", self.prefix())
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    TestPlan,
    RawResults,
    Report,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::TestPlan => "jmx",
            Self::RawResults => "jtl",
            Self::Report => "md",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_ascii_lowercase().as_str() {
            "jmx" => Some(Self::TestPlan),
            "jtl" => Some(Self::RawResults),
            "md" => Some(Self::Report),
            _ => None,
        }
    }

    fn stem(self) -> &'static str {
        match self {
            Self::TestPlan | Self::RawResults => "test_plan",
            Self::Report => "analysis",
        }
    }

    pub fn filename_at(self, at: DateTime<Local>) -> String {
        format!(
            "{}_{}.{}",
            self.stem(),
            at.format(TIMESTAMP_FORMAT),
            self.extension()
        )
    }

    pub fn filename_now(self) -> String {
        self.filename_at(Local::now())
    }

    /// Reject names with the wrong extension or any path component.
    pub fn check_filename(self, name: &str) -> Result<(), PipelineError> {
        let suffix = format!(".{}", self.extension());
        if name.len() <= suffix.len() || !name.ends_with(&suffix) {
            return Err(PipelineError::InvalidRequest(format!(
                "invalid file '{name}': must be a {suffix} file"
            )));
        }
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(PipelineError::InvalidRequest(format!(
                "invalid file '{name}': path components are not allowed"
            )));
        }
        Ok(())
    }
}
