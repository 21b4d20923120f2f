//! Marker-tagged result envelope printed by the extractor process.
//!
//! The process may log freely before the payload. A successful run prints
//! `SUCCESS:` followed by one JSON object; a failed run prints
//! `ERROR:<message>` and optionally `TRACEBACK:<text>`. A marker at the start
//! of a line wins; otherwise the first occurrence anywhere is used, which
//! covers libraries that leave a partial line or `\r` progress output behind.

use serde_json::Value;

pub const SUCCESS_MARKER: &str = "SUCCESS:";
pub const ERROR_MARKER: &str = "ERROR:";
pub const TRACEBACK_MARKER: &str = "TRACEBACK:";

/// Why an output stream did not yield a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Neither marker was found.
    MissingMarker,
    /// The `SUCCESS:` marker was present but not followed by a JSON object.
    Malformed(String),
    /// The process reported its own failure.
    Reported {
        message: String,
        traceback: Option<String>,
    },
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingMarker => write!(f, "no {SUCCESS_MARKER} payload in extractor output"),
            Self::Malformed(e) => write!(f, "malformed payload: {e}"),
            Self::Reported { message, .. } => write!(f, "extractor reported: {message}"),
        }
    }
}

/// Byte offset just past `marker`, preferring one that starts a line.
fn marker_end(output: &str, marker: &str) -> Option<usize> {
    let mut offset = 0;
    for line in output.split_inclusive(['\n', '\r']) {
        let trimmed = line.trim_start();
        if trimmed.starts_with(marker) {
            return Some(offset + (line.len() - trimmed.len()) + marker.len());
        }
        offset += line.len();
    }
    output.find(marker).map(|at| at + marker.len())
}

fn rest_of_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

/// Recover the JSON payload from the extractor's stdout.
pub fn parse_envelope(output: &str) -> Result<Value, EnvelopeError> {
    if let Some(start) = marker_end(output, SUCCESS_MARKER) {
        // Only the first JSON value counts; anything printed after it is noise.
        let mut values = serde_json::Deserializer::from_str(&output[start..]).into_iter::<Value>();
        return match values.next() {
            Some(Ok(value @ Value::Object(_))) => Ok(value),
            Some(Ok(other)) => Err(EnvelopeError::Malformed(format!(
                "expected a JSON object, found {}",
                kind_of(&other)
            ))),
            Some(Err(e)) => Err(EnvelopeError::Malformed(e.to_string())),
            None => Err(EnvelopeError::Malformed("empty payload".into())),
        };
    }

    if let Some(start) = marker_end(output, ERROR_MARKER) {
        let message = rest_of_line(&output[start..]).to_string();
        let traceback = marker_end(output, TRACEBACK_MARKER)
            .map(|tb| output[tb..].trim().to_string())
            .filter(|tb| !tb.is_empty());
        return Err(EnvelopeError::Reported { message, traceback });
    }

    Err(EnvelopeError::MissingMarker)
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
