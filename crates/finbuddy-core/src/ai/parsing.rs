//! Payload extraction from raw model replies
//!
//! Model replies often wrap the JSON payload in a fenced code block or pad
//! it with prose. These helpers strip the noise and pull out the first
//! top-level brace-delimited object.

use regex::Regex;

use crate::error::{Error, Result};

use super::types::Classification;

/// Strip a leading/trailing fenced code block marker, if present.
/// Case-insensitive, with an optional `json` language tag.
fn strip_code_fence(text: &str) -> String {
    let fence = Regex::new(r"(?is)^```(?:json)?\s*|\s*```$").expect("valid fence regex");
    fence.replace_all(text.trim(), "").trim().to_string()
}

/// Locate the first top-level `{...}` object by brace depth counting.
/// Returns the slice including both braces, or None if no balanced object
/// exists.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}

/// Parse a classification payload from a raw model reply.
///
/// Failure carries the (truncated) raw text so the caller can log it for
/// diagnostics. There is no retry at this layer; the classifier decides
/// what a parse failure means.
pub fn extract_payload(raw: &str) -> Result<Classification> {
    let cleaned = strip_code_fence(raw);

    let json_str = first_json_object(&cleaned).ok_or_else(|| {
        Error::InvalidData(format!(
            "No JSON object found in model reply | Raw: {}",
            truncate(raw, 200)
        ))
    })?;

    serde_json::from_str(json_str).map_err(|e| {
        Error::InvalidData(format!(
            "Invalid classification JSON: {} | Raw: {}",
            e,
            truncate(json_str, 200)
        ))
    })
}
