mod common;

use common::LOGIN_RESULTS;
use loadpilot_core::analysis::{aggregate, parse_records, render_bullets};
use loadpilot_core::api::PipelineError;
use pretty_assertions::assert_eq;

#[test]
fn two_label_example() {
    let csv = "label,elapsed,responseCode,allThreads\nA,100,200,5\nA,300,500,5\nB,200,200,2\n";
    let rows = aggregate(&parse_records(csv.as_bytes()).unwrap()).unwrap();
    assert_eq!(
        render_bullets(&rows),
        "- **A**: Avg Time = `200.0ms`, Errors = `50.0%`, Throughput = `2`, Users = `5`\n\
         - **B**: Avg Time = `200.0ms`, Errors = `0.0%`, Throughput = `1`, Users = `2`"
    );
}

#[test]
fn real_jmeter_output_with_extra_columns() {
    let records = parse_records(LOGIN_RESULTS.as_bytes()).unwrap();
    assert_eq!(records.len(), 50);
    let rows = aggregate(&records).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].error_rate_pct, 4.0);
}

#[test]
fn empty_or_incomplete_sets_are_malformed() {
    let header_only = "label,elapsed,responseCode,allThreads\n";
    let err = aggregate(&parse_records(header_only.as_bytes()).unwrap()).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedInput(_)));

    let without_threads: String = LOGIN_RESULTS.replace(",allThreads,", ",threads,");
    let err = parse_records(without_threads.as_bytes()).unwrap_err();
    assert_eq!(err.error_code().as_str(), "MALFORMED_INPUT");
}
