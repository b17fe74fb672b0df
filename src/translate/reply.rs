use serde_json::Value;

/// Outcome of decoding one batch answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchReply {
    /// Same number of strings as the batch, in batch order
    Translated(Vec<String>),
    /// Anything unusable; the batch keeps its source strings
    Malformed(String),
}

/// Decode the text payload of an answer for a batch of `expected` strings.
///
/// Only the length is checked: a reply of the right size is accepted even if
/// the model reordered it. Numbers and booleans inside the array are taken as
/// their JSON text; any other element makes the reply malformed.
pub fn parse_reply(text: &str, expected: usize) -> BatchReply {
    let value: Value = match serde_json::from_str(strip_code_fence(text)) {
        Ok(v) => v,
        Err(e) => return BatchReply::Malformed(format!("not JSON: {}", e)),
    };

    let Value::Array(items) = value else {
        return BatchReply::Malformed("reply is not a JSON array".to_string());
    };

    if items.len() != expected {
        return BatchReply::Malformed(format!(
            "expected {} strings, got {}",
            expected,
            items.len()
        ));
    }

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            Value::String(s) => out.push(s),
            Value::Number(n) => out.push(n.to_string()),
            Value::Bool(b) => out.push(b.to_string()),
            other => {
                return BatchReply::Malformed(format!(
                    "element {} is not a string: {}",
                    idx, other
                ));
            }
        }
    }

    BatchReply::Translated(out)
}

/// Drop a surrounding Markdown code fence, which some models add even when a
/// JSON response was requested.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}
