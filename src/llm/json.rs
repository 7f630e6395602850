//! Pull JSON out of free-form model output.

/// Best-effort JSON object from model output.
///
/// Looks, in order, for a bare object, a ```` ```json ```` fence, a plain
/// fence wrapping an object, then the outermost `{ ... }` span. Falls back
/// to the trimmed input so the caller's parse error shows what came back.
pub fn extract_json_object(text: &str) -> String {
    let text = text.trim();
    if text.starts_with('{') {
        return text.to_string();
    }

    if let Some(inner) = fenced(text, "```json") {
        return inner.to_string();
    }
    if let Some(inner) = fenced(text, "```").filter(|inner| inner.starts_with('{')) {
        return inner.to_string();
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(open), Some(close)) if close > open => text[open..=close].to_string(),
        _ => text.to_string(),
    }
}

/// Trimmed body of the first fence opened by `marker`.
fn fenced<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let body = &text[text.find(marker)? + marker.len()..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_object_untouched() {
        let input = r#"{"sentiment": "positive"}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn object_in_markdown_block() {
        let input = "```json\n{\"tone\": \"formal\"}\n```";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.contains("formal"));
    }

    #[test]
    fn object_in_plain_fence() {
        let input = "Result:\n```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(input), "{\"a\": 1}");
    }

    #[test]
    fn object_embedded_in_text() {
        let input = "Here you go: {\"topics\": []} hope it helps";
        assert_eq!(extract_json_object(input), "{\"topics\": []}");
    }

    #[test]
    fn no_object_returns_trimmed_input() {
        assert_eq!(extract_json_object("  nothing here "), "nothing here");
    }
}
