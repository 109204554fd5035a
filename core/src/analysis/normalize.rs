const MARKDOWN_FENCE: &str = "```markdown";
const FENCE: &str = "```";

/// Applied in order. Each step returns its input untouched when its pattern
/// does not match, so the chain never fails.
pub const NORMALIZE_CHAIN: [fn(String) -> String; 2] = [unwrap_json_analysis, strip_markdown_fence];

pub fn normalize(raw: impl Into<String>) -> String {
    NORMALIZE_CHAIN
        .iter()
        .fold(raw.into(), |text, step| step(text))
}

/// `{"analysis": "..."}` → the string inside.
pub fn unwrap_json_analysis(text: String) -> String {
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(text.trim()) else {
        return text;
    };
    match map.get("analysis") {
        Some(serde_json::Value::String(inner)) => inner.clone(),
        _ => text,
    }
}

/// Drops a leading ```` ```markdown ```` marker and, if present, the closing
/// fence. Inner content is only trimmed.
pub fn strip_markdown_fence(text: String) -> String {
    let Some(rest) = text.trim().strip_prefix(MARKDOWN_FENCE) else {
        return text;
    };
    let rest = rest.trim();
    rest.strip_suffix(FENCE).unwrap_or(rest).trim().to_string()
}
