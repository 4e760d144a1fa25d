use std::fmt;

/// Why a transport-level call never produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The configured request or relay timeout elapsed.
    Timeout,
    /// The caller's cancellation token fired.
    Cancelled,
    /// Connection, TLS, relay delivery or any other collaborator failure.
    Delivery,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Delivery => write!(f, "delivery"),
        }
    }
}

/// Every failure a single provider call can end in. All kinds are terminal:
/// nothing in this crate retries.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("HTTP error {status}: {status_text}")]
    Http { status: u16, status_text: String },

    #[error("Gateway error {code}: {message}")]
    Gateway { message: String, code: String },

    #[error("Could not {method} from endpoint `{url}`: {reason}")]
    Transport {
        method: String,
        url: String,
        failure: TransportFailure,
        reason: String,
    },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl SequencerError {
    pub(crate) fn transport(
        method: impl fmt::Display,
        url: impl Into<String>,
        failure: TransportFailure,
        reason: impl fmt::Display,
    ) -> Self {
        Self::Transport {
            method: method.to_string(),
            url: url.into(),
            failure,
            reason: reason.to_string(),
        }
    }

    /// Upstream status code, when the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                failure: TransportFailure::Timeout,
                ..
            }
        )
    }
}

/// Problems building providers or resolving settings. Never produced by a call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Network {network_id} requires relay routing but no relay SDK factory is configured")]
    MissingRelaySdk { network_id: String },

    #[error("Invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Relay SDK construction failed: {0}")]
    RelaySdk(String),
}

pub type Result<T> = std::result::Result<T, SequencerError>;
