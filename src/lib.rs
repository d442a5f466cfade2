// SecureState - double-submit cookie CSRF protection for Rust
//
// This library issues tokens into a cookie, binds them optionally to the
// client origin and an expiry, and rejects state-changing requests whose
// echoed token does not match.

// Re-export the CSRF layer
pub use securestate_csrf::*;

// Re-export member crates
pub use securestate_csrf;
pub use securestate_log;

#[cfg(feature = "config")]
pub use securestate_config;

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ClientAddr, CookieOptions, CsrfConfig, CsrfError, CsrfMiddleware, CsrfRejection, ExpiryLedger,
        Issuance, MemoryLedger, OriginFacts, Outcome, RejectReason, RequestOrigin, RequestToken,
        SameSite, TokenCodec, TokenFormat, TokenValidator, ValidationContext, Verdict,
    };

    #[cfg(feature = "config")]
    pub use securestate_config::{ConfigManager, Environment, Validate};
}
