//! Error types for provider discovery and config generation.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building providers or generating config.
///
/// Provider-scoped variants ([`MissingCredential`](Error::MissingCredential),
/// [`Authentication`](Error::Authentication),
/// [`UpstreamUnavailable`](Error::UpstreamUnavailable),
/// [`MalformedResponse`](Error::MalformedResponse),
/// [`InvalidConfiguration`](Error::InvalidConfiguration)) are downgraded to
/// per-provider diagnostics by the fetcher. Run-scoped variants
/// ([`NoProvidersConfigured`](Error::NoProvidersConfigured),
/// [`OutputWriteFailure`](Error::OutputWriteFailure)) abort the fetch cycle.
#[derive(Debug, Error)]
pub enum Error {
    /// A discovery provider needs a credential and none was configured.
    #[error("missing credential for provider: {provider}")]
    MissingCredential { provider: String },

    /// The upstream rejected the credential (401/403).
    #[error("authentication rejected by {provider} (HTTP {status})")]
    Authentication { provider: String, status: u16 },

    /// The upstream could not be reached or answered with garbage.
    #[error("{provider} unavailable: {reason}")]
    UpstreamUnavailable { provider: String, reason: String },

    /// A reachable upstream answered with an error status or an
    /// undecodable body. Never treated as "not running".
    #[error("{provider} returned a malformed response: {reason}")]
    MalformedResponse { provider: String, reason: String },

    /// A provider declaration or settings block is malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A required field references an unset `${VAR}` placeholder.
    #[error("environment variable {var} is not set (required by field `{field}`)")]
    MissingEnvironmentVariable { var: String, field: String },

    /// The declaration's `type` tag is not registered.
    #[error("unknown provider type: {0}")]
    UnknownProviderType(String),

    /// No enabled providers remain after construction.
    #[error("no providers configured")]
    NoProvidersConfigured,

    /// Two providers produced the same routable name under the strict policy.
    #[error("duplicate model name `{model_name}` from {first} and {second}")]
    DuplicateService {
        model_name: String,
        first: String,
        second: String,
    },

    /// The generated document could not be written.
    #[error("failed to write {}: {source}", path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization/deserialization error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short, stable label for one-line per-provider reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingCredential { .. } => "missing credential",
            Error::Authentication { .. } => "authentication failed",
            Error::UpstreamUnavailable { .. } => "unreachable",
            Error::MalformedResponse { .. } => "malformed response",
            Error::InvalidConfiguration(_) => "invalid configuration",
            Error::MissingEnvironmentVariable { .. } => "missing environment variable",
            Error::UnknownProviderType(_) => "unknown provider type",
            Error::NoProvidersConfigured => "no providers",
            Error::DuplicateService { .. } => "duplicate model",
            Error::OutputWriteFailure { .. } => "write failed",
            Error::Yaml(_) | Error::Serialization(_) => "malformed data",
            Error::Io(_) => "io",
        }
    }

    /// Whether this error is scoped to a single provider.
    pub fn is_provider_scoped(&self) -> bool {
        matches!(
            self,
            Error::MissingCredential { .. }
                | Error::Authentication { .. }
                | Error::UpstreamUnavailable { .. }
                | Error::MalformedResponse { .. }
                | Error::InvalidConfiguration(_)
                | Error::MissingEnvironmentVariable { .. }
                | Error::UnknownProviderType(_)
        )
    }

    pub(crate) fn unavailable(provider: &str, reason: impl Into<String>) -> Self {
        Error::UpstreamUnavailable {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }
}
