//! Decoding of structured model output.
//!
//! Models wrap JSON in prose or markdown fences. The decoder strips fences,
//! locates the outermost object, parses it into the target type and runs
//! the type's own validation. Callers construct their fallback on `Err`.

use errors::DecodeError;
use serde::de::DeserializeOwned;

const EXCERPT_LEN: usize = 120;

/// A type that can be decoded from model output and checked afterwards.
pub trait StructuredOutput: DeserializeOwned {
    /// Post-parse schema checks. Defaults to accepting anything that parsed.
    fn validate(&self) -> Result<(), DecodeError> {
        Ok(())
    }
}

impl StructuredOutput for serde_json::Value {}

fn excerpt(raw: &str) -> String {
    raw.chars().take(EXCERPT_LEN).collect()
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Returns the slice between the first `{` and the last `}`.
pub fn extract_json_object(raw: &str) -> Result<&str, DecodeError> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&text[start..=end]),
        _ => Err(DecodeError::NoJsonObject {
            excerpt: excerpt(text),
        }),
    }
}

pub fn decode_structured<T: StructuredOutput>(raw: &str) -> Result<T, DecodeError> {
    let json = extract_json_object(raw)?;
    let value: T = serde_json::from_str(json).map_err(|e| DecodeError::InvalidJson {
        reason: e.to_string(),
        excerpt: excerpt(json),
    })?;
    value.validate()?;
    Ok(value)
}
