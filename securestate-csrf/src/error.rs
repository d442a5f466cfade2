use securestate_config::ConfigError;
use thiserror::Error;

/// Failures that prevent the CSRF layer from doing its job at all.
#[derive(Error, Debug)]
pub enum CsrfError {
    /// The operating system RNG failed. There is no fallback source.
    #[error("Secure random source failed: {0}")]
    RandomSource(String),

    #[error("Invalid CSRF configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, CsrfError>;

/// Why a presented token was not accepted.
///
/// These are ordinary outcomes of validation, never errors: the enforcement
/// layer turns every one of them into a 403.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token secrets do not match")]
    SecretMismatch,

    #[error("token is missing its origin segment")]
    OriginHashMissing,

    #[error("request origin is unavailable")]
    OriginUnavailable,

    #[error("token was issued to a different origin")]
    OriginMismatch,

    #[error("token is missing its expiration segment")]
    ExpirationHashMissing,

    #[error("token expiration segments differ")]
    ExpirationMismatch,

    #[error("token has expired")]
    Expired,
}

impl RejectReason {
    /// Stable identifier used in diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Malformed => "Malformed",
            RejectReason::SignatureInvalid => "SignatureInvalid",
            RejectReason::SecretMismatch => "SecretMismatch",
            RejectReason::OriginHashMissing => "OriginHashMissing",
            RejectReason::OriginUnavailable => "OriginUnavailable",
            RejectReason::OriginMismatch => "OriginMismatch",
            RejectReason::ExpirationHashMissing => "ExpirationHashMissing",
            RejectReason::ExpirationMismatch => "ExpirationMismatch",
            RejectReason::Expired => "Expired",
        }
    }
}

/// Enforcement outcome for a protected request that may not proceed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfRejection {
    /// No header/body token, or no cookie token.
    #[error("CSRF token missing.")]
    Missing,

    /// Both tokens present but the validator rejected them.
    #[error("CSRF token mismatch.")]
    Mismatch(RejectReason),
}

impl CsrfRejection {
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            CsrfRejection::Missing => None,
            CsrfRejection::Mismatch(reason) => Some(*reason),
        }
    }
}
