use serde::Serialize;

pub const NO_SUMMARY: &str = "No summary found.";

/// Console lines that start with the summary marker, joined by newlines.
/// Never empty: falls back to [`NO_SUMMARY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExecutionSummary(String);

impl ExecutionSummary {
    pub fn from_console(console: &str, marker: &str) -> Self {
        let lines: Vec<&str> = console
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with(marker))
            .collect();
        if lines.is_empty() {
            Self(NO_SUMMARY.to_string())
        } else {
            Self(lines.join("\n"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == NO_SUMMARY
    }
}

impl std::fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
