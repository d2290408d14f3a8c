/// Shared error type used across all deepsearch crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The transport failed before the stream could be consumed.
    #[error("network: {0}")]
    Network(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_display() {
        let e = Error::Network("connection refused".into());
        assert_eq!(e.to_string(), "network: connection refused");
    }

    #[test]
    fn backend_error_display() {
        let e = Error::Backend {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(e.to_string(), "backend returned 502: bad gateway");
    }

    #[test]
    fn json_error_converts() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: Error = err.into();
        assert!(e.to_string().starts_with("JSON:"));
    }
}
