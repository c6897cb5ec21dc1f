use thiserror::Error;

/// Top-level error type for the `filterctl-api` crate.
///
/// Covers every failure mode of the command gateway: authentication,
/// transport, HTTP-level gateway errors, and router-side command rejection.
/// `filterctl-core` classifies these into device-level outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Gateway refused the credentials (HTTP 401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Gateway ─────────────────────────────────────────────────────
    /// Non-success HTTP response from the command gateway itself.
    #[error("Gateway error (HTTP {status}): {message}")]
    Gateway { status: u16, message: String },

    // ── Router ──────────────────────────────────────────────────────
    /// The router executed the command and reported an error in its output.
    #[error("Router rejected `{command}`: {output}")]
    CommandRejected { command: String, output: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the credentials were refused.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Gateway { status, .. } => *status == 503 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if the router reported that the addressed object
    /// does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::CommandRejected { output, .. } => output.to_lowercase().contains("not found"),
            _ => false,
        }
    }
}
