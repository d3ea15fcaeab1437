/// Typed tool failures. Tools never panic or leak transport errors —
/// every failure lands in one of these buckets so the caller can decide
/// whether to retry or surface.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// Connectivity failure reaching an external service. Retryable.
    #[error("network: {0}")]
    Network(String),

    /// The operation exceeded its deadline. Retryable.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The arguments did not match the tool's input schema. Not retried.
    #[error("validation: {0}")]
    Validation(String),

    /// The service rejected the request permanently (auth, policy,
    /// disallowed action). Not retried.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl ToolError {
    /// Whether a retry can possibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ToolError::Network(_) | ToolError::Timeout(_))
    }

    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ToolError::Timeout(e.to_string())
        } else if e.is_status() {
            let status = e.status().map(|s| s.as_u16()).unwrap_or(0);
            if status == 429 || status >= 500 {
                ToolError::Network(e.to_string())
            } else {
                ToolError::Permanent(e.to_string())
            }
        } else {
            ToolError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ToolError::Network("down".into()).is_transient());
        assert!(ToolError::Timeout("slow".into()).is_transient());
        assert!(!ToolError::Validation("bad args".into()).is_transient());
        assert!(!ToolError::Permanent("denied".into()).is_transient());
    }
}
