//! # SecureState CSRF Protection
//!
//! Double-submit cookie protection: a token is written to a cookie and must
//! be echoed back in a header or body field on state-changing requests.
//!
//! ## Features
//!
//! - ✅ **Segmented Tokens** - `secret[:originHash][:expirationHash]`
//! - ✅ **Origin Binding** - Optional IP + User-Agent binding
//! - ✅ **Expiration** - Hashed expiry backed by a generation-time ledger
//! - ✅ **Signed Tokens** - HMAC-SHA256 format with plaintext expiry
//! - ✅ **Fixed-time Comparison** - Secrets, origin hashes and signatures
//! - ✅ **Path Exclusion** - Exclude specific paths from protection
//!
//! ## Quick Start
//!
//! ```rust
//! use securestate_csrf::{CsrfConfig, TokenCodec, TokenValidator, ValidationContext};
//!
//! let config = CsrfConfig::new().with_token_length(16);
//! let token = TokenCodec::generate(&config, None).unwrap();
//! assert_eq!(token.value.len(), 32);
//!
//! let ctx = ValidationContext::new(None);
//! assert!(TokenValidator::validate(&token.value, &token.value, &ctx, &config).is_accepted());
//! ```
//!
//! ## Origin Binding
//!
//! ```rust
//! use securestate_csrf::{
//!     CsrfConfig, OriginFacts, RejectReason, TokenCodec, TokenValidator, ValidationContext, Verdict,
//! };
//!
//! let config = CsrfConfig::new().with_check_origin(true);
//! let issued_to = OriginFacts::new("1.2.3.4", "UA-A");
//! let token = TokenCodec::generate(&config, issued_to.as_ref()).unwrap();
//!
//! let ctx = ValidationContext::new(OriginFacts::new("1.2.3.4", "UA-B"));
//! assert_eq!(
//!     TokenValidator::validate(&token.value, &token.value, &ctx, &config),
//!     Verdict::Reject(RejectReason::OriginMismatch)
//! );
//! ```
//!
//! ## Middleware
//!
//! ```rust
//! use http::{Method, Request};
//! use securestate_csrf::{CsrfConfig, CsrfMiddleware, Outcome};
//!
//! let csrf = CsrfMiddleware::new(CsrfConfig::default());
//!
//! let mut form = Request::builder().uri("/form").body(String::new()).unwrap();
//! let Outcome::Proceed(issuance) = csrf.handle(&mut form).unwrap() else {
//!     unreachable!()
//! };
//!
//! let mut submit = Request::builder()
//!     .method(Method::POST)
//!     .uri("/submit")
//!     .header("cookie", format!("_csrfToken={}", issuance.token))
//!     .header("x-csrf-token", issuance.token.as_str())
//!     .body(String::new())
//!     .unwrap();
//! assert!(matches!(csrf.handle(&mut submit).unwrap(), Outcome::Proceed(_)));
//! ```

pub mod config;
pub mod cookies;
mod diagnostics;
pub mod digest;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod origin;
pub mod token;
pub mod validator;

pub use config::{ConfigPatch, CookieOptions, CookieOptionsPatch, CsrfConfig, SameSite, TokenFormat};
pub use error::{CsrfError, CsrfRejection, RejectReason, Result};
pub use ledger::{ExpiryLedger, MemoryLedger};
pub use middleware::{CsrfMiddleware, Issuance, Outcome, RequestToken};
pub use origin::{ClientAddr, OriginFacts, RequestOrigin};
pub use token::{Expiration, IssuedToken, ParsedToken, TokenCodec};
pub use validator::{TokenValidator, ValidationContext, Verdict};
