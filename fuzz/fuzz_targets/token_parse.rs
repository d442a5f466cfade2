//! Fuzz target for token parsing.
//!
//! Parsing must never panic, and anything the strict parser accepts must
//! also be accepted by the lenient one with the same segments.

#![no_main]

use libfuzzer_sys::fuzz_target;
use securestate_csrf::{CsrfConfig, TokenCodec};

fuzz_target!(|data: &str| {
    let configs = [
        CsrfConfig::new(),
        CsrfConfig::new().with_check_origin(true),
        CsrfConfig::new().with_expiration(60),
        CsrfConfig::new().with_check_origin(true).with_expiration(60),
    ];

    for config in &configs {
        let strict = TokenCodec::parse(data, config);
        let lenient = TokenCodec::parse_lenient(data, config);

        if let Ok(parsed) = strict {
            assert_eq!(lenient, Ok(parsed.clone()));
            assert_eq!(parsed.secret.len() % 2, 0);
        }
    }
});
