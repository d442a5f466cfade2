//! Fuzz target for cookie header parsing and serialization.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use securestate_csrf::CookieOptions;
use securestate_csrf::cookies::{read_cookie, write_cookie};

/// Arbitrary cookie input for fuzzing.
#[derive(Debug, Arbitrary)]
struct FuzzCookie {
    /// Raw `Cookie` header
    header: String,
    name: String,
    value: String,
}

fuzz_target!(|data: FuzzCookie| {
    let _ = read_cookie(&data.header, &data.name);

    // Round trip through Set-Cookie for names that are plain tokens
    if data.value.is_empty()
        || data.name.is_empty()
        || !data.name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return;
    }

    let set_cookie = write_cookie(&data.name, &data.value, &CookieOptions::default());
    let pair = set_cookie.split(';').next().unwrap_or_default();
    assert_eq!(read_cookie(pair, &data.name).as_deref(), Some(data.value.as_str()));
});
