use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::PipelineError;

use super::parse::ExecutionRecord;

/// Per-label statistics. Floats are rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedMetrics {
    pub label: String,
    pub avg_response_time_ms: f64,
    pub error_rate_pct: f64,
    pub throughput: u64,
    pub concurrent_users: u64,
}

#[derive(Default)]
struct Acc {
    elapsed_total: u128,
    errors: u64,
    count: u64,
    max_threads: u64,
}

/// Group by label, one row per label, ordered by label. Any response code
/// other than exactly `"200"` counts as an error.
pub fn aggregate(records: &[ExecutionRecord]) -> Result<Vec<AggregatedMetrics>, PipelineError> {
    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for record in records {
        let acc = groups.entry(record.label.as_str()).or_default();
        acc.elapsed_total += u128::from(record.elapsed_ms);
        acc.count += 1;
        if record.response_code != "200" {
            acc.errors += 1;
        }
        acc.max_threads = acc.max_threads.max(record.active_threads);
    }

    if groups.is_empty() {
        return Err(PipelineError::MalformedInput(
            "result set contains no records".into(),
        ));
    }

    Ok(groups
        .into_iter()
        .map(|(label, acc)| AggregatedMetrics {
            label: label.to_string(),
            avg_response_time_ms: round2(acc.elapsed_total as f64 / acc.count as f64),
            error_rate_pct: round2(acc.errors as f64 * 100.0 / acc.count as f64),
            throughput: acc.count,
            concurrent_users: acc.max_threads,
        })
        .collect())
}

/// Half-way cases go to the even neighbour: 1.125 → 1.12.
fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}
