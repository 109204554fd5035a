use super::aggregate::AggregatedMetrics;

/// One markdown bullet per label.
pub fn render_bullets(rows: &[AggregatedMetrics]) -> String {
    rows.iter()
        .map(|row| {
            format!(
                "- **{}**: Avg Time = `{}ms`, Errors = `{}%`, Throughput = `{}`, Users = `{}`",
                row.label,
                decimal(row.avg_response_time_ms),
                decimal(row.error_rate_pct),
                row.throughput,
                row.concurrent_users
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_analysis_prompt(summary: &str) -> String {
    format!(
        "You are a performance analysis expert. Analyze this result:\n\n{summary}\n\n\
         Provide a detailed markdown analysis. No code blocks. No additional explanations."
    )
}

/// Whole numbers keep one decimal place (`200.0`), others print as-is.
fn decimal(x: f64) -> String {
    if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bullets_follow_row_order() {
        let rows = vec![
            AggregatedMetrics {
                label: "A".into(),
                avg_response_time_ms: 200.0,
                error_rate_pct: 50.0,
                throughput: 2,
                concurrent_users: 5,
            },
            AggregatedMetrics {
                label: "B".into(),
                avg_response_time_ms: 123.45,
                error_rate_pct: 0.0,
                throughput: 1,
                concurrent_users: 2,
            },
        ];
        assert_eq!(
            render_bullets(&rows),
            "- **A**: Avg Time = `200.0ms`, Errors = `50.0%`, Throughput = `2`, Users = `5`\n\
             - **B**: Avg Time = `123.45ms`, Errors = `0.0%`, Throughput = `1`, Users = `2`"
        );
    }

    #[test]
    fn prompt_embeds_summary() {
        let prompt = build_analysis_prompt("- **A**: ...");
        assert!(prompt.contains("Analyze this result:\n\n- **A**: ...\n\nProvide"));
        assert!(prompt.ends_with("No additional explanations."));
    }
}
