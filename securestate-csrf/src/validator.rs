//! Accept/reject decision for a presented token against the stored cookie token.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. both tokens parse under the active configuration (`Malformed`)
//! 2. signed format only: both signatures verify (`SignatureInvalid`)
//! 3. secrets are equal, compared in fixed time (`SecretMismatch`)
//! 4. `check_origin`: origin binding (`OriginHashMissing`, `OriginUnavailable`, `OriginMismatch`)
//! 5. `token_expires`: expiry (`ExpirationHashMissing`, `ExpirationMismatch`, `Expired`)

use crate::config::{CsrfConfig, TokenFormat};
use crate::diagnostics;
use crate::digest;
use crate::error::RejectReason;
use crate::origin::OriginFacts;
use crate::token::{Expiration, ParsedToken, TokenCodec};
use chrono::{DateTime, Utc};

const TARGET: &str = "securestate::csrf::validator";

/// Per-request facts the validator needs besides the two token strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    /// Origin of the request being validated
    pub origin: Option<OriginFacts>,

    /// Clock reading used for expiry
    pub now: DateTime<Utc>,

    /// Expiry instant recorded when the stored token was issued (hashed format)
    pub issued_expiry: Option<DateTime<Utc>>,
}

impl ValidationContext {
    pub fn new(origin: Option<OriginFacts>) -> Self {
        Self::at(origin, Utc::now())
    }

    pub fn at(origin: Option<OriginFacts>, now: DateTime<Utc>) -> Self {
        Self {
            origin,
            now,
            issued_expiry: None,
        }
    }

    pub fn with_origin(mut self, origin: OriginFacts) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_issued_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.issued_expiry = Some(expires_at);
        self
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Outcome of [`TokenValidator::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Verdict::Accept => None,
            Verdict::Reject(reason) => Some(*reason),
        }
    }
}

impl From<Result<(), RejectReason>> for Verdict {
    fn from(result: Result<(), RejectReason>) -> Self {
        match result {
            Ok(()) => Verdict::Accept,
            Err(reason) => Verdict::Reject(reason),
        }
    }
}

/// Stateless token validator. Safe to call from any number of threads.
pub struct TokenValidator;

impl TokenValidator {
    /// Decide whether `presented` (header/body) matches `stored` (cookie).
    ///
    /// Never panics on arbitrary input: every failure is a [`Verdict::Reject`].
    /// With `config.debug` set, the outcome is logged.
    pub fn validate(
        presented: &str,
        stored: &str,
        ctx: &ValidationContext,
        config: &CsrfConfig,
    ) -> Verdict {
        let verdict = Self::evaluate(presented, stored, ctx, config);
        diagnostics::verdict(config, TARGET, verdict, presented, stored, &[]);
        verdict
    }

    /// [`validate`](Self::validate) without any logging.
    pub fn evaluate(
        presented: &str,
        stored: &str,
        ctx: &ValidationContext,
        config: &CsrfConfig,
    ) -> Verdict {
        Verdict::from(check(presented, stored, ctx, config))
    }
}

fn check(
    presented: &str,
    stored: &str,
    ctx: &ValidationContext,
    config: &CsrfConfig,
) -> Result<(), RejectReason> {
    if presented.is_empty() || stored.is_empty() {
        return Err(RejectReason::Malformed);
    }

    // Stripped optional segments still parse so they can be named below
    let presented = TokenCodec::parse_lenient(presented, config)?;
    let stored = TokenCodec::parse_lenient(stored, config)?;

    if config.token_format == TokenFormat::Signed {
        check_signature(&presented, config)?;
        check_signature(&stored, config)?;
    }

    if !digest::constant_time_eq(presented.secret, stored.secret) {
        return Err(RejectReason::SecretMismatch);
    }

    if config.check_origin {
        check_origin(&presented, &stored, ctx)?;
    }

    if config.token_expires {
        check_expiration(&presented, &stored, ctx)?;
    }

    Ok(())
}

fn check_signature(token: &ParsedToken<'_>, config: &CsrfConfig) -> Result<(), RejectReason> {
    let key = config
        .signing_key
        .as_deref()
        .ok_or(RejectReason::SignatureInvalid)?;
    let signature = token.signature.ok_or(RejectReason::SignatureInvalid)?;

    if digest::verify_signature(key, token.signed_payload(), signature) {
        Ok(())
    } else {
        Err(RejectReason::SignatureInvalid)
    }
}

fn check_origin(
    presented: &ParsedToken<'_>,
    stored: &ParsedToken<'_>,
    ctx: &ValidationContext,
) -> Result<(), RejectReason> {
    let (Some(presented_hash), Some(stored_hash)) = (presented.origin_hash, stored.origin_hash)
    else {
        return Err(RejectReason::OriginHashMissing);
    };

    let origin = ctx.origin.as_ref().ok_or(RejectReason::OriginUnavailable)?;
    let expected = digest::origin_hash(origin);

    if !digest::constant_time_eq(&expected, stored_hash)
        || !digest::constant_time_eq(presented_hash, stored_hash)
    {
        return Err(RejectReason::OriginMismatch);
    }

    Ok(())
}

fn check_expiration(
    presented: &ParsedToken<'_>,
    stored: &ParsedToken<'_>,
    ctx: &ValidationContext,
) -> Result<(), RejectReason> {
    let (Some(presented_exp), Some(stored_exp)) = (presented.expiration, stored.expiration) else {
        return Err(RejectReason::ExpirationHashMissing);
    };

    if presented_exp != stored_exp {
        return Err(RejectReason::ExpirationMismatch);
    }

    let expires_at_ms = match stored_exp {
        Expiration::Plain(millis) => millis,
        Expiration::Hashed(hash) => {
            let at = ctx.issued_expiry.ok_or(RejectReason::Expired)?;
            let millis = at.timestamp_millis();
            if !digest::constant_time_eq(&digest::expiry_hash(millis), hash) {
                return Err(RejectReason::Expired);
            }
            millis
        }
    };

    if ctx.now.timestamp_millis() > expires_at_ms {
        return Err(RejectReason::Expired);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::IssuedToken;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn origin(ua: &str) -> OriginFacts {
        OriginFacts::new("1.2.3.4", ua).unwrap()
    }

    fn issue(config: &CsrfConfig, origin: Option<&OriginFacts>) -> IssuedToken {
        TokenCodec::generate_at(config, origin, now()).unwrap()
    }

    #[test]
    fn test_baseline_accept_and_secret_mismatch() {
        let config = CsrfConfig::new().with_token_length(16);
        let x = issue(&config, None).value;
        let y = issue(&config, None).value;
        let ctx = ValidationContext::at(None, now());

        assert_eq!(x.len(), 32);
        assert_eq!(TokenValidator::validate(&x, &x, &ctx, &config), Verdict::Accept);
        assert_eq!(
            TokenValidator::validate(&x, &y, &ctx, &config),
            Verdict::Reject(RejectReason::SecretMismatch)
        );
    }

    #[test]
    fn test_empty_tokens_are_malformed() {
        let config = CsrfConfig::new();
        let x = issue(&config, None).value;
        let ctx = ValidationContext::default();

        assert_eq!(
            TokenValidator::validate("", &x, &ctx, &config),
            Verdict::Reject(RejectReason::Malformed)
        );
        assert_eq!(
            TokenValidator::validate(&x, "", &ctx, &config),
            Verdict::Reject(RejectReason::Malformed)
        );
    }

    #[test]
    fn test_arbitrary_input_is_rejected() {
        let config = CsrfConfig::new().with_check_origin(true).with_expiration(60);
        let ctx = ValidationContext::at(Some(origin("UA-A")), now());

        for garbage in [":", "::", ":::", "nocolons", "a:b:c:d:e", "ZZZZ", "\u{1F600}:x", " "] {
            let verdict = TokenValidator::validate(garbage, garbage, &ctx, &config);
            assert!(!verdict.is_accepted(), "{garbage}");
        }
    }

    #[test]
    fn test_origin_binding() {
        let config = CsrfConfig::new().with_check_origin(true);
        let token = issue(&config, Some(&origin("UA-A"))).value;

        let same = ValidationContext::at(Some(origin("UA-A")), now());
        assert_eq!(TokenValidator::validate(&token, &token, &same, &config), Verdict::Accept);

        let other = ValidationContext::at(Some(origin("UA-B")), now());
        assert_eq!(
            TokenValidator::validate(&token, &token, &other, &config),
            Verdict::Reject(RejectReason::OriginMismatch)
        );

        let unknown = ValidationContext::at(None, now());
        assert_eq!(
            TokenValidator::validate(&token, &token, &unknown, &config),
            Verdict::Reject(RejectReason::OriginUnavailable)
        );
    }

    #[test]
    fn test_tampered_origin_hash() {
        let config = CsrfConfig::new().with_check_origin(true);
        let facts = OriginFacts::new("10.0.0.5", "Agent/1").unwrap();
        let token = issue(&config, Some(&facts)).value;
        let secret = token.split(':').next().unwrap();
        let tampered = format!("{}:{}", secret, "0".repeat(64));
        let ctx = ValidationContext::at(Some(facts), now());

        for (presented, stored) in [(&tampered, &token), (&token, &tampered), (&tampered, &tampered)] {
            assert_eq!(
                TokenValidator::validate(presented, stored, &ctx, &config),
                Verdict::Reject(RejectReason::OriginMismatch)
            );
        }
    }

    #[test]
    fn test_stripped_origin_segment_fails_closed() {
        let config = CsrfConfig::new().with_check_origin(true);
        let facts = origin("UA-A");
        let token = issue(&config, Some(&facts)).value;
        let secret = token.split(':').next().unwrap();
        let ctx = ValidationContext::at(Some(facts), now());

        assert_eq!(
            TokenValidator::validate(&token, secret, &ctx, &config),
            Verdict::Reject(RejectReason::OriginHashMissing)
        );
        assert_eq!(
            TokenValidator::validate(secret, secret, &ctx, &config),
            Verdict::Reject(RejectReason::OriginHashMissing)
        );
    }

    #[test]
    fn test_token_issued_without_origin_facts_is_rejected() {
        let config = CsrfConfig::new().with_check_origin(true);
        let token = issue(&config, None).value;
        let ctx = ValidationContext::at(Some(origin("UA-A")), now());

        assert_eq!(
            TokenValidator::validate(&token, &token, &ctx, &config),
            Verdict::Reject(RejectReason::OriginHashMissing)
        );
    }

    #[test]
    fn test_secret_checked_before_origin() {
        let config = CsrfConfig::new().with_check_origin(true);
        let a = issue(&config, Some(&origin("UA-A"))).value;
        let b = issue(&config, Some(&origin("UA-A"))).value;
        let ctx = ValidationContext::at(Some(origin("UA-B")), now());

        assert_eq!(
            TokenValidator::validate(&a, &b, &ctx, &config),
            Verdict::Reject(RejectReason::SecretMismatch)
        );
    }

    #[test]
    fn test_hashed_expiry_with_ledger_record() {
        let config = CsrfConfig::new().with_expiration(60);
        let issued = issue(&config, None);
        let at = issued.expires_at.unwrap();

        let fresh = ValidationContext::at(None, now() + Duration::seconds(30)).with_issued_expiry(at);
        assert_eq!(
            TokenValidator::validate(&issued.value, &issued.value, &fresh, &config),
            Verdict::Accept
        );

        let late = ValidationContext::at(None, now() + Duration::seconds(61)).with_issued_expiry(at);
        assert_eq!(
            TokenValidator::validate(&issued.value, &issued.value, &late, &config),
            Verdict::Reject(RejectReason::Expired)
        );
    }

    #[test]
    fn test_hashed_expiry_fails_closed() {
        let config = CsrfConfig::new().with_expiration(60);
        let issued = issue(&config, None);

        let no_record = ValidationContext::at(None, now());
        assert_eq!(
            TokenValidator::validate(&issued.value, &issued.value, &no_record, &config),
            Verdict::Reject(RejectReason::Expired)
        );

        let forged = ValidationContext::at(None, now())
            .with_issued_expiry(now() + Duration::days(365));
        assert_eq!(
            TokenValidator::validate(&issued.value, &issued.value, &forged, &config),
            Verdict::Reject(RejectReason::Expired)
        );
    }

    #[test]
    fn test_expiration_segments_must_match() {
        let config = CsrfConfig::new().with_expiration(60);
        let issued = issue(&config, None);
        let secret = issued.value.split(':').next().unwrap();
        let invented = format!("{}:{}", secret, digest::expiry_hash(i64::MAX));
        let ctx = ValidationContext::at(None, now()).with_issued_expiry(issued.expires_at.unwrap());

        assert_eq!(
            TokenValidator::validate(&invented, &issued.value, &ctx, &config),
            Verdict::Reject(RejectReason::ExpirationMismatch)
        );
        assert_eq!(
            TokenValidator::validate(secret, &issued.value, &ctx, &config),
            Verdict::Reject(RejectReason::ExpirationHashMissing)
        );
    }

    #[test]
    fn test_signed_tokens() {
        let config = CsrfConfig::signed(vec![3u8; 32])
            .unwrap()
            .with_check_origin(true)
            .with_expiration(60);
        let facts = origin("UA-A");
        let issued = issue(&config, Some(&facts));

        let ctx = ValidationContext::at(Some(facts.clone()), now() + Duration::seconds(10));
        assert_eq!(
            TokenValidator::validate(&issued.value, &issued.value, &ctx, &config),
            Verdict::Accept
        );

        let late = ValidationContext::at(Some(facts.clone()), now() + Duration::seconds(61));
        assert_eq!(
            TokenValidator::validate(&issued.value, &issued.value, &late, &config),
            Verdict::Reject(RejectReason::Expired)
        );

        let mut segments: Vec<String> = issued.value.split(':').map(String::from).collect();
        segments[2] = (now() + Duration::days(30)).timestamp_millis().to_string();
        let extended = segments.join(":");
        assert_eq!(
            TokenValidator::validate(&extended, &extended, &ctx, &config),
            Verdict::Reject(RejectReason::SignatureInvalid)
        );

        let other_key = CsrfConfig::signed(vec![4u8; 32])
            .unwrap()
            .with_check_origin(true)
            .with_expiration(60);
        assert_eq!(
            TokenValidator::validate(&issued.value, &issued.value, &ctx, &other_key),
            Verdict::Reject(RejectReason::SignatureInvalid)
        );
    }

    #[test]
    fn test_debug_logging() {
        let config = CsrfConfig::new().with_debug(true);
        let x = issue(&config, None).value;
        let y = issue(&config, None).value;
        let ctx = ValidationContext::at(None, now());

        let _guard = diagnostics::SUPPRESSION_GUARD.lock();
        securestate_log::set_suppressed(false);

        let (verdict, lines) =
            securestate_log::capture(|| TokenValidator::validate(&x, &y, &ctx, &config));
        assert_eq!(verdict, Verdict::Reject(RejectReason::SecretMismatch));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("SecretMismatch"));
        assert!(lines[0].contains(&x));
        assert!(lines[0].contains(&y));

        // Accepted tokens are logged at debug level whatever the global level
        let (verdict, lines) =
            securestate_log::capture(|| TokenValidator::validate(&x, &x, &ctx, &config));
        assert!(verdict.is_accepted());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("CSRF token accepted"));

        let quiet = CsrfConfig::new();
        let (_, lines) = securestate_log::capture(|| TokenValidator::validate(&x, &y, &ctx, &quiet));
        assert!(lines.is_empty());

        let (_, lines) = securestate_log::capture(|| TokenValidator::evaluate(&x, &y, &ctx, &config));
        assert!(lines.is_empty());

        securestate_log::set_suppressed(true);
        let (verdict, lines) =
            securestate_log::capture(|| TokenValidator::validate(&x, &y, &ctx, &config));
        assert_eq!(verdict, Verdict::Reject(RejectReason::SecretMismatch));
        assert!(lines.is_empty());
        securestate_log::set_suppressed(false);
    }

    #[test]
    fn test_verdict_helpers() {
        assert!(Verdict::Accept.is_accepted());
        assert_eq!(Verdict::Accept.reason(), None);
        let reject = Verdict::Reject(RejectReason::Expired);
        assert!(!reject.is_accepted());
        assert_eq!(reject.reason(), Some(RejectReason::Expired));
    }
}
