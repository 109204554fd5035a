use crate::error::PipelineError;

pub const REQUIRED_COLUMNS: [&str; 4] = ["label", "elapsed", "responseCode", "allThreads"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub label: String,
    pub elapsed_ms: u64,
    pub response_code: String,
    pub active_threads: u64,
}

/// Parse a comma-delimited result set with a header row. Columns other than
/// [`REQUIRED_COLUMNS`] are ignored.
pub fn parse_records(data: &[u8]) -> Result<Vec<ExecutionRecord>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::MalformedInput(format!("unreadable header row: {e}")))?
        .clone();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|c| position(*c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MalformedInput(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }
    // All four are present past this point.
    let [label, elapsed, code, threads] = REQUIRED_COLUMNS.map(|c| position(c).unwrap_or_default());

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let row = row.map_err(|e| PipelineError::MalformedInput(format!("line {line}: {e}")))?;
        let field = |idx: usize, name: &str| {
            row.get(idx).map(str::trim).ok_or_else(|| {
                PipelineError::MalformedInput(format!("line {line}: missing value for {name}"))
            })
        };
        let number = |idx: usize, name: &str| -> Result<u64, PipelineError> {
            let raw = field(idx, name)?;
            raw.parse().map_err(|_| {
                PipelineError::MalformedInput(format!(
                    "line {line}: {name} must be a non-negative integer, got '{raw}'"
                ))
            })
        };

        records.push(ExecutionRecord {
            label: field(label, "label")?.to_string(),
            elapsed_ms: number(elapsed, "elapsed")?,
            response_code: field(code, "responseCode")?.to_string(),
            active_threads: number(threads, "allThreads")?,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const JTL: &str = "timeStamp,elapsed,label,responseCode,responseMessage,success,allThreads\n\
        1700000000000,120,login,200,OK,true,5\n\
        1700000000100,340,login,500,Server Error,false,5\n";

    #[test]
    fn reads_required_columns_in_any_order() {
        let records = parse_records(JTL.as_bytes()).unwrap();
        assert_eq!(
            records,
            vec![
                ExecutionRecord {
                    label: "login".into(),
                    elapsed_ms: 120,
                    response_code: "200".into(),
                    active_threads: 5,
                },
                ExecutionRecord {
                    label: "login".into(),
                    elapsed_ms: 340,
                    response_code: "500".into(),
                    active_threads: 5,
                },
            ]
        );
    }

    #[test]
    fn header_only_is_an_empty_set() {
        let records = parse_records(b"label,elapsed,responseCode,allThreads\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn names_missing_columns() {
        let err = parse_records(b"label,elapsed,responseCode\nlogin,1,200\n").unwrap_err();
        match err {
            PipelineError::MalformedInput(msg) => assert!(msg.contains("allThreads"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            parse_records(b""),
            Err(PipelineError::MalformedInput(_))
        ));
    }

    #[test]
    fn rejects_bad_numbers_and_short_rows() {
        let bad = b"label,elapsed,responseCode,allThreads\nlogin,-4,200,1\n";
        match parse_records(bad).unwrap_err() {
            PipelineError::MalformedInput(msg) => assert!(msg.starts_with("line 2:"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
        let short = b"label,elapsed,responseCode,allThreads\nlogin,4\n";
        assert!(matches!(
            parse_records(short),
            Err(PipelineError::MalformedInput(_))
        ));
    }
}
