use std::sync::OnceLock;

use regex::Regex;

static XML_FENCE: OnceLock<Regex> = OnceLock::new();

fn xml_fence() -> &'static Regex {
    XML_FENCE.get_or_init(|| Regex::new(r"(?s)```xml(.*?)```").expect("XML_FENCE is valid"))
}

/// Content of the first ```xml fenced block, or the whole response when the
/// model did not fence its answer.
pub fn extract_fenced_xml(response: &str) -> String {
    match xml_fence().captures(response).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => response.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_fenced_block() {
        let response = "Here you go:\n```xml\n<a/>\n```\nand\n```xml\n<b/>\n```";
        assert_eq!(extract_fenced_xml(response), "<a/>");
    }

    #[test]
    fn falls_back_to_whole_response() {
        assert_eq!(extract_fenced_xml("  <a/>\n"), "<a/>");
        // An unterminated fence is not a fence.
        assert_eq!(extract_fenced_xml("```xml\n<a/>"), "```xml\n<a/>");
    }
}
