// Per-host sampling errors. Each one is recovered by the poller with a fallback record.

use thiserror::Error;

/// Longest slice of remote output kept in an error for diagnostics.
pub const OUTPUT_EXCERPT_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    /// The channel could not be established, dropped, or timed out.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The remote command ran but produced no usable output.
    #[error("command failed: {0}")]
    CommandFailed(String),
    /// The output held no parsable JSON object.
    #[error("malformed response: {reason}; output: {excerpt:?}")]
    MalformedResponse { reason: String, excerpt: String },
}

impl SampleError {
    pub fn malformed(reason: impl Into<String>, output: &str) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            excerpt: excerpt(output),
        }
    }

    /// Short machine-friendly label for logs and status records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "connection_failed",
            Self::CommandFailed(_) => "command_failed",
            Self::MalformedResponse { .. } => "malformed_response",
        }
    }
}

/// First `OUTPUT_EXCERPT_LEN` characters of `s`, char-boundary safe.
pub fn excerpt(s: &str) -> String {
    match s.char_indices().nth(OUTPUT_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
