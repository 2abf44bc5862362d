//! Attempt failure taxonomy.
//!
//! The state machine's decision table keys off these categories, not off
//! transport error types. Classification walks the reqwest error source
//! chain and pattern-matches the accumulated text; the chain shape differs
//! between hyper, rustls, and the OS, but the category strings are stable.

/// One failed attempt, bucketed for the decision table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    /// Response entity exceeded the configured cap. Terminal.
    #[error("response body too large ({0} bytes)")]
    BodyTooLarge(u64),

    /// The single-connection pool had nothing to hand out. Retried free.
    #[error("no free connections available to host")]
    NoFreeConnection,

    /// Name resolution failed. Retried free once with a `www.` prefix.
    #[error("dns lookup failed: {0}")]
    Dns(String),

    /// Certificate valid, but not for this hostname.
    #[error("tls certificate not valid for host: {0}")]
    TlsWrongHost(String),

    /// Certificate chain does not lead to a trusted root.
    #[error("tls certificate signed by unknown authority: {0}")]
    TlsUnknownAuthority(String),

    /// Certificate outside its validity window.
    #[error("tls certificate expired or not yet valid: {0}")]
    TlsExpiredCert(String),

    /// Peer aborted the handshake with an internal-error alert.
    #[error("remote tls internal error: {0}")]
    TlsInternalError(String),

    /// TCP connect actively refused. Terminal.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Server hung up before the first response byte. Retried silently.
    #[error("server closed connection before returning a response")]
    ClosedBeforeResponse,

    /// Anything else; the text becomes a synthesized warning token.
    #[error("{0}")]
    Other(String),
}

/// Bucket a transport error from one attempt.
pub fn classify(err: &reqwest::Error) -> AttemptFailure {
    let chain = chain_text(err);
    let lower = chain.to_lowercase();
    let cause = root_cause(err);

    if lower.contains("invalid peer certificate") {
        return if lower.contains("notvalidforname") {
            AttemptFailure::TlsWrongHost(cause)
        } else if lower.contains("unknownissuer") {
            AttemptFailure::TlsUnknownAuthority(cause)
        } else if lower.contains("expired") || lower.contains("notvalidyet") {
            AttemptFailure::TlsExpiredCert(cause)
        } else {
            AttemptFailure::Other(cause)
        };
    }

    if lower.contains("alert") && lower.contains("internalerror") {
        return AttemptFailure::TlsInternalError(cause);
    }

    if lower.contains("dns error") || lower.contains("failed to lookup address") {
        return AttemptFailure::Dns(cause);
    }

    if lower.contains("connection refused") {
        return AttemptFailure::ConnectionRefused(cause);
    }

    if lower.contains("connection closed before message completed") || lower.contains("incompletemessage") {
        return AttemptFailure::ClosedBeforeResponse;
    }

    if lower.contains("no available connection") || lower.contains("pool exhausted") {
        return AttemptFailure::NoFreeConnection;
    }

    if err.is_timeout() {
        return AttemptFailure::Other("operation timed out".to_string());
    }

    AttemptFailure::Other(cause)
}

/// Every Display in the source chain, newline-joined.
fn chain_text(err: &reqwest::Error) -> String {
    let mut texts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        texts.push(inner.to_string());
        source = inner.source();
    }
    texts.join("\n")
}

/// The innermost error's text; the outer layers mostly repeat the URL.
fn root_cause(err: &reqwest::Error) -> String {
    let mut current: &dyn std::error::Error = err;
    while let Some(inner) = current.source() {
        current = inner;
    }
    current.to_string()
}
