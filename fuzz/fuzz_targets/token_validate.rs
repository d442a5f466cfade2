//! Fuzz target for token validation.
//!
//! Arbitrary presented/stored pairs must always produce a verdict, and two
//! different secrets must never be accepted.

#![no_main]

use arbitrary::Arbitrary;
use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;
use securestate_csrf::{CsrfConfig, OriginFacts, TokenValidator, ValidationContext};

/// Arbitrary validation input for fuzzing.
#[derive(Debug, Arbitrary)]
struct FuzzValidation {
    presented: String,
    stored: String,
    ip: String,
    user_agent: String,
    now_ms: i64,
    issued_expiry_ms: Option<i64>,
    check_origin: bool,
    expires: bool,
    signed: bool,
}

fuzz_target!(|input: FuzzValidation| {
    let mut config = if input.signed {
        match CsrfConfig::signed(vec![0x5a; 32]) {
            Ok(config) => config,
            Err(_) => return,
        }
    } else {
        CsrfConfig::new()
    };
    config = config.with_check_origin(input.check_origin);
    if input.expires {
        config = config.with_expiration(60);
    }

    let now = DateTime::from_timestamp_millis(input.now_ms).unwrap_or_else(Utc::now);
    let mut ctx = ValidationContext::at(OriginFacts::new(input.ip, input.user_agent), now);
    if let Some(at) = input.issued_expiry_ms.and_then(DateTime::from_timestamp_millis) {
        ctx = ctx.with_issued_expiry(at);
    }

    let verdict = TokenValidator::validate(&input.presented, &input.stored, &ctx, &config);

    let secret = |token: &str| token.split(':').next().map(str::to_string);
    if secret(&input.presented) != secret(&input.stored) {
        assert!(!verdict.is_accepted());
    }
});
