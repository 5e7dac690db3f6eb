//! Locate the JSON object inside a free-form model reply

use crate::error::AnalysisError;

const FENCE: &str = "```";

/// Return the JSON object embedded in `reply`
///
/// A fenced code block wins when present. Otherwise brace pairs are matched in
/// one pass outside string literals and the earliest-starting balanced
/// candidate that parses as a JSON object is returned.
pub fn extract_json_object(reply: &str) -> Result<&str, AnalysisError> {
    if let Some(fenced) = fenced_block(reply) {
        if let Some(object) = first_object(fenced) {
            return Ok(object);
        }
    }

    first_object(reply).ok_or_else(|| {
        AnalysisError::Parse(format!(
            "no JSON object found in reply ({} chars)",
            reply.chars().count()
        ))
    })
}

/// Contents of the first ``` fenced block, without the language tag
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_fence = &text[open + FENCE.len()..];
    // skip the info string ("json", "JSON", ...) up to the end of the line
    let body_start = after_fence.find('\n').map_or(0, |newline| newline + 1);
    let body = &after_fence[body_start..];
    let close = body.find(FENCE).unwrap_or(body.len());
    Some(body[..close].trim())
}

fn first_object(text: &str) -> Option<&str> {
    let mut spans = balanced_spans(text);
    spans.sort_unstable_by_key(|&(start, _)| start);
    spans
        .into_iter()
        .map(|(start, end)| &text[start..end])
        .find(|candidate| {
            serde_json::from_str::<serde_json::Value>(candidate)
                .map_or(false, |value| value.is_object())
        })
}

/// Byte spans of every matched `{...}` pair, found in a single pass
///
/// Quotes only open string literals inside a brace; at the top level they are
/// prose. Unmatched braces yield no span.
fn balanced_spans(text: &str) -> Vec<(usize, usize)> {
    let mut open = Vec::new();
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(offset),
            '}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, offset + ch.len_utf8()));
                }
            }
            _ => {}
        }
    }

    spans
}
