// Snapshot extractor: isolate one JSON object from noisy command output (banners, MOTD, warnings)

use crate::error::SampleError;
use crate::models::RawSnapshot;
use serde_json::{Map, Value};
use tracing::debug;

/// Parses the whole trimmed output as one object; failing that, the span from the first `{`
/// to the last `}`. Anything else is a `MalformedResponse`.
pub fn extract_object(output: &str) -> Result<Map<String, Value>, SampleError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(SampleError::malformed("empty output", output));
    }

    let first_err = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(obj)) => return Ok(obj),
        Ok(other) => format!("top-level JSON is not an object ({})", short_kind(&other)),
        Err(e) => e.to_string(),
    };

    let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        debug!(reason = %first_err, "command output holds no JSON object");
        return Err(SampleError::malformed(first_err, output));
    };
    if end <= start {
        return Err(SampleError::malformed(first_err, output));
    }

    match serde_json::from_str::<Map<String, Value>>(&trimmed[start..=end]) {
        Ok(obj) => {
            debug!(
                prefix_len = start,
                suffix_len = trimmed.len() - end - 1,
                "parsed JSON after trimming surrounding text"
            );
            Ok(obj)
        }
        Err(e) => Err(SampleError::malformed(e.to_string(), output)),
    }
}

/// Extracts and coerces the raw snapshot. Coercion diagnostics are logged, never raised.
pub fn parse_snapshot(output: &str) -> Result<RawSnapshot, SampleError> {
    let obj = extract_object(output)?;
    let raw = RawSnapshot::from_object(&obj);
    for d in &raw.diagnostics {
        debug!(diagnostic = %d, "field coercion");
    }
    Ok(raw)
}

fn short_kind(v: &Value) -> &'static str {
    match v {
        Value::Array(_) => "list",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Object(_) => "object",
    }
}
