//! Raw results → per-label metrics → model-written narrative report.

mod aggregate;
mod analyzer;
mod narrate;
mod normalize;
mod parse;

pub use aggregate::{aggregate, AggregatedMetrics};
pub use analyzer::{AnalysisReport, ResultAnalyzer};
pub use narrate::{build_analysis_prompt, render_bullets};
pub use normalize::{normalize, strip_markdown_fence, unwrap_json_analysis, NORMALIZE_CHAIN};
pub use parse::{parse_records, ExecutionRecord, REQUIRED_COLUMNS};
