//! Extraction of JSON payloads from raw model output.
//!
//! Models wrap JSON in prose or markdown fences often enough that callers
//! never parse raw output directly.

/// Extract the first JSON object from model output.
///
/// Handles bare JSON, fenced code blocks, and JSON embedded in surrounding
/// prose by scanning from the first `{` to its matching close brace.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();

    // Fast path: the whole response is the object.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in trimmed[start..].char_indices() {
        if in_string {
            match ch {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &trimmed[start..start + offset + ch.len_utf8()];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}
