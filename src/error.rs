//! Error types for the collaborators around the pulse engine. The engine itself
//! has no failure modes.

/// Failure reported by a feedback or object provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The upstream service ran out of quota (HTTP 429 / RESOURCE_EXHAUSTED).
    /// Surfaces the "use a personal key" prompt.
    #[error("provider quota exceeded")]
    QuotaExceeded,
    /// Network, transport or anything else; recovered silently.
    #[error("{0}")]
    Failed(String),
    #[error("malformed provider response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ProviderError {
    /// Sort an error message from the JS side into quota vs generic failure.
    pub fn classify<T: Into<String>>(message: T) -> Self {
        let message = message.into();
        let quota = ["429", "QUOTA_EXCEEDED", "RESOURCE_EXHAUSTED"]
            .iter()
            .any(|marker| message.contains(marker));
        if quota {
            Self::QuotaExceeded
        } else {
            Self::Failed(message)
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("local storage unavailable")]
    Unavailable,
    #[error("storage write rejected: {0}")]
    Write(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_quota_markers() {
        assert!(ProviderError::classify("got status 429 Too Many Requests").is_quota());
        assert!(ProviderError::classify("QUOTA_EXCEEDED").is_quota());
        assert!(ProviderError::classify("{\"status\":\"RESOURCE_EXHAUSTED\"}").is_quota());
        let generic = ProviderError::classify("network down");
        assert!(!generic.is_quota());
        assert_eq!(generic.to_string(), "network down");
    }
}
