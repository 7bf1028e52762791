/// Errors raised by the session engine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("session bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("server unavailable: HTTP {0}")]
    Unavailable(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transport closed by remote")]
    TransportClosed,

    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not connected")]
    NotConnected,
}

impl Error {
    /// Whether a reconnect may recover from this error.
    ///
    /// Only transport-level failures qualify; bootstrap rejections, bad
    /// patterns and malformed envelopes do not.
    pub fn is_reconnectable(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_)
                | Error::Transport(_)
                | Error::TransportClosed
                | Error::Http(_)
                | Error::Unavailable(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_reconnectable() {
        assert!(Error::TransportClosed.is_reconnectable());
        assert!(Error::Transport("reset".into()).is_reconnectable());
        assert!(Error::Unavailable(503).is_reconnectable());
    }

    #[test]
    fn test_protocol_errors_are_not_reconnectable() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!Error::MalformedFrame(json_err).is_reconnectable());
        assert!(!Error::Bootstrap("invalid_auth".into()).is_reconnectable());
        assert!(!Error::NotConnected.is_reconnectable());
    }
}
