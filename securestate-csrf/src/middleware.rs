use crate::config::{CsrfConfig, TokenFormat};
use crate::cookies;
use crate::diagnostics;
use crate::error::{CsrfRejection, Result};
use crate::ledger::{ExpiryLedger, MemoryLedger};
use crate::origin::{OriginFacts, RequestOrigin};
use crate::token::{IssuedToken, TokenCodec};
use crate::validator::{TokenValidator, ValidationContext, Verdict};
use chrono::{DateTime, Utc};
use http::header::{CONTENT_TYPE, HeaderValue, SET_COOKIE};
use http::{Request, Response, StatusCode};
use securestate_log::Level;
use std::sync::Arc;

const TARGET: &str = "securestate::csrf::middleware";

/// Token made available to handlers for embedding in forms and pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken(pub String);

/// Result of running issuance on a request.
#[derive(Debug, Clone)]
pub struct Issuance {
    /// Token in effect for this request
    pub token: String,

    /// Cookie to attach to the response; `None` when the existing cookie was reused
    pub set_cookie: Option<HeaderValue>,

    pub expires_at: Option<DateTime<Utc>>,
}

impl Issuance {
    pub fn is_fresh(&self) -> bool {
        self.set_cookie.is_some()
    }

    /// Attach the `Set-Cookie` header, if any.
    pub fn apply<B>(&self, response: &mut Response<B>) {
        if let Some(ref cookie) = self.set_cookie {
            response.headers_mut().append(SET_COOKIE, cookie.clone());
        }
    }
}

/// What the caller should do with a request after [`CsrfMiddleware::handle`].
#[derive(Debug, Clone)]
pub enum Outcome {
    Proceed(Issuance),
    Reject(CsrfRejection),
}

impl CsrfRejection {
    pub fn status(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }

    /// 403 with `{"error": "<message>"}`.
    pub fn into_response(self) -> Response<String> {
        let body = serde_json::json!({ "error": self.to_string() }).to_string();
        let mut response = Response::new(body);
        *response.status_mut() = self.status();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

/// CSRF protection middleware
///
/// Issuance writes the token cookie; enforcement compares the cookie with
/// the token echoed in the body field or header on unsafe requests.
#[derive(Clone)]
pub struct CsrfMiddleware {
    config: Arc<CsrfConfig>,
    ledger: Arc<dyn ExpiryLedger>,
}

impl CsrfMiddleware {
    /// Create new CSRF middleware with an in-memory expiry ledger
    pub fn new(config: CsrfConfig) -> Self {
        Self::with_ledger(config, Arc::new(MemoryLedger::new()))
    }

    pub fn with_ledger(config: CsrfConfig, ledger: Arc<dyn ExpiryLedger>) -> Self {
        Self {
            config: Arc::new(config),
            ledger,
        }
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Check if request needs CSRF protection
    pub fn needs_protection<B>(&self, request: &Request<B>) -> bool {
        let method = request.method().as_str();
        if self
            .config
            .safe_methods
            .iter()
            .any(|safe| safe.eq_ignore_ascii_case(method))
        {
            return false;
        }

        let path = request.uri().path();
        !self
            .config
            .exclude_paths
            .iter()
            .any(|excluded| path.starts_with(excluded.as_str()))
    }

    /// Generate a token and remember its expiry for later validation.
    pub fn generate_token(&self, origin: Option<&OriginFacts>) -> Result<IssuedToken> {
        let token = TokenCodec::generate(&self.config, origin)?;

        if self.config.token_format == TokenFormat::Hashed {
            if let Some(expires_at) = token.expires_at {
                let parsed = TokenCodec::parse_lenient(&token.value, &self.config).ok();
                if let Some(hash) = parsed.as_ref().and_then(|p| p.expiration_hash()) {
                    self.ledger.record(hash, expires_at);
                }
            }
        }

        Ok(token)
    }

    /// `Set-Cookie` value for a token. `Max-Age` falls back to the token
    /// lifetime for expiring tokens.
    pub fn cookie_header(&self, token: &IssuedToken) -> Result<HeaderValue> {
        let mut options = self.config.cookie_options.clone();
        if options.max_age.is_none() && self.config.token_expires {
            options.max_age = Some(self.config.token_expiration);
        }
        cookies::header_value(cookies::write_cookie(
            &self.config.cookie_name,
            &token.value,
            &options,
        ))
    }

    /// `Set-Cookie` value that removes the token cookie.
    pub fn clear_cookie_header(&self) -> Result<HeaderValue> {
        cookies::header_value(cookies::delete_cookie(
            &self.config.cookie_name,
            &self.config.cookie_options,
        ))
    }

    /// Make a token available to the request, reusing the cookie unless
    /// `regenerate_token` is set or the cookie would no longer validate.
    ///
    /// A cookie whose expiry record is gone (restart, eviction, lapse) or
    /// whose format no longer matches the configuration is replaced.
    /// The token is stored as a [`RequestToken`] extension.
    pub fn issue<B>(&self, request: &mut Request<B>) -> Result<Issuance> {
        let origin = request.origin_facts(self.config.trust_proxy);
        let existing = if self.config.regenerate_token {
            None
        } else {
            cookies::read_cookie_from_headers(request.headers(), &self.config.cookie_name)
                .filter(|value| self.is_reusable(value, origin.clone()))
        };

        let issuance = match existing {
            Some(token) => Issuance {
                token,
                set_cookie: None,
                expires_at: None,
            },
            None => {
                let token = self.generate_token(origin.as_ref())?;
                diagnostics::report(
                    &self.config,
                    Level::Debug,
                    TARGET,
                    "CSRF token generated",
                    &[("token", token.value.as_str())],
                );

                Issuance {
                    set_cookie: Some(self.cookie_header(&token)?),
                    expires_at: token.expires_at,
                    token: token.value,
                }
            }
        };

        request
            .extensions_mut()
            .insert(RequestToken(issuance.token.clone()));
        Ok(issuance)
    }

    fn is_reusable(&self, cookie: &str, origin: Option<OriginFacts>) -> bool {
        if TokenCodec::parse(cookie, &self.config).is_err() {
            return false;
        }

        match self.evaluate_pair(cookie, cookie, origin) {
            Verdict::Accept => true,
            Verdict::Reject(reason) => {
                diagnostics::report(
                    &self.config,
                    Level::Debug,
                    TARGET,
                    "Replacing stale CSRF cookie",
                    &[("reason", reason.code())],
                );
                false
            }
        }
    }

    /// Enforce the double submit on a request.
    ///
    /// The body field named after the cookie takes precedence over the header.
    pub fn verify<B: AsRef<[u8]>>(&self, request: &Request<B>) -> std::result::Result<(), CsrfRejection> {
        if !self.needs_protection(request) {
            return Ok(());
        }

        let stored = cookies::read_cookie_from_headers(request.headers(), &self.config.cookie_name);
        let (source, presented) = match self.get_token_from_body(request.body().as_ref()) {
            Some(token) => ("body", Some(token)),
            None => ("header", self.get_token_from_header(request)),
        };

        let (Some(presented), Some(stored)) = (presented, stored) else {
            diagnostics::report(&self.config, Level::Warn, TARGET, "CSRF token missing", &[]);
            return Err(CsrfRejection::Missing);
        };

        let origin = request.origin_facts(self.config.trust_proxy);
        let verdict = self.evaluate_pair(&presented, &stored, origin);
        diagnostics::verdict(
            &self.config,
            TARGET,
            verdict,
            &presented,
            &stored,
            &[("source", source)],
        );

        match verdict {
            Verdict::Accept => Ok(()),
            Verdict::Reject(reason) => Err(CsrfRejection::Mismatch(reason)),
        }
    }

    /// Validate a presented/stored pair, supplying the recorded expiry for hashed tokens.
    pub fn validate_pair(&self, presented: &str, stored: &str, origin: Option<OriginFacts>) -> Verdict {
        let verdict = self.evaluate_pair(presented, stored, origin);
        diagnostics::verdict(&self.config, TARGET, verdict, presented, stored, &[]);
        verdict
    }

    fn evaluate_pair(&self, presented: &str, stored: &str, origin: Option<OriginFacts>) -> Verdict {
        let mut ctx = ValidationContext::new(origin);

        if self.config.token_expires && self.config.token_format == TokenFormat::Hashed {
            let recorded = TokenCodec::parse_lenient(stored, &self.config)
                .ok()
                .and_then(|parsed| parsed.expiration_hash())
                .and_then(|hash| self.ledger.lookup(hash));
            if let Some(expires_at) = recorded {
                ctx = ctx.with_issued_expiry(expires_at);
            }
        }

        TokenValidator::evaluate(presented, stored, &ctx, &self.config)
    }

    /// Verify, then issue. A rejected request gets no new token.
    pub fn handle<B: AsRef<[u8]>>(&self, request: &mut Request<B>) -> Result<Outcome> {
        if let Err(rejection) = self.verify(request) {
            return Ok(Outcome::Reject(rejection));
        }
        Ok(Outcome::Proceed(self.issue(request)?))
    }

    fn get_token_from_header<B>(&self, request: &Request<B>) -> Option<String> {
        request
            .headers()
            .get(self.config.header_name.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn get_token_from_body(&self, body: &[u8]) -> Option<String> {
        if body.is_empty() {
            return None;
        }

        // Try to parse as JSON
        if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
            return json
                .get(&self.config.cookie_name)
                .and_then(|token| token.as_str())
                .filter(|token| !token.is_empty())
                .map(str::to_string);
        }

        // Try to parse as form data
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
            .ok()?
            .into_iter()
            .find(|(key, value)| *key == self.config.cookie_name && !value.is_empty())
            .map(|(_, value)| value)
    }
}
