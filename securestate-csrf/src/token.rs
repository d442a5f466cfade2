//! Token codec: production and parsing of the segmented token encoding.
//!
//! A token is a `:`-separated list of segments in fixed order:
//!
//! | Segment | Present when | Content |
//! |---|---|---|
//! | secret | always | `token_length` random bytes, hex |
//! | origin hash | `check_origin` | `SHA256("{ip}:{userAgent}")`, hex |
//! | expiration | `token_expires` | `SHA256(expiresAtMs)` (hashed) or `expiresAtMs` (signed) |
//! | signature | signed format | `HMAC-SHA256(key, preceding segments)`, hex |

use crate::config::{CsrfConfig, TokenFormat};
use crate::digest;
use crate::error::{CsrfError, RejectReason, Result};
use crate::origin::OriginFacts;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

pub const SEPARATOR: char = ':';

/// A freshly generated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Wire value, as written to the cookie
    pub value: String,

    /// Expiry instant (millisecond precision) when the configuration enables expiration
    pub expires_at: Option<DateTime<Utc>>,
}

/// Content of the expiration segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration<'a> {
    /// Digest of the expiry instant; the instant itself is not recoverable.
    Hashed(&'a str),
    /// Expiry instant in unix milliseconds, protected by the token signature.
    Plain(i64),
}

/// Segments of a parsed token, borrowed from the wire value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken<'a> {
    pub secret: &'a str,
    pub origin_hash: Option<&'a str>,
    pub expiration: Option<Expiration<'a>>,
    pub signature: Option<&'a str>,
    payload: &'a str,
}

impl<'a> ParsedToken<'a> {
    pub fn expiration_hash(&self) -> Option<&'a str> {
        match self.expiration {
            Some(Expiration::Hashed(hash)) => Some(hash),
            _ => None,
        }
    }

    /// The text covered by the signature: every segment before it.
    pub fn signed_payload(&self) -> &'a str {
        self.payload
    }
}

/// Which optional segments a token is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    origin: bool,
    expiration: bool,
    format: TokenFormat,
}

impl Layout {
    fn of(config: &CsrfConfig) -> Self {
        Self {
            origin: config.check_origin,
            expiration: config.token_expires,
            format: config.token_format,
        }
    }

    fn segment_count(&self) -> usize {
        1 + usize::from(self.origin)
            + usize::from(self.expiration)
            + usize::from(self.format == TokenFormat::Signed)
    }

    /// The configured layout, then every variant with optional segments stripped.
    fn with_stripped(self) -> Vec<Layout> {
        let mut layouts = vec![self];
        if self.origin {
            layouts.push(Layout { origin: false, ..self });
        }
        if self.expiration {
            layouts.push(Layout { expiration: false, ..self });
        }
        if self.origin && self.expiration {
            layouts.push(Layout {
                origin: false,
                expiration: false,
                ..self
            });
        }
        layouts
    }
}

/// Produces and parses the segmented token encoding. Pure, no I/O.
pub struct TokenCodec;

impl TokenCodec {
    /// Generate a token for the given configuration and client.
    ///
    /// The origin segment is only appended when `check_origin` is set and
    /// origin facts are available. A failure of the operating system RNG is
    /// returned as [`CsrfError::RandomSource`].
    ///
    /// ```
    /// use securestate_csrf::{CsrfConfig, TokenCodec};
    ///
    /// let config = CsrfConfig::new().with_token_length(16);
    /// let token = TokenCodec::generate(&config, None).unwrap();
    /// assert_eq!(token.value.len(), 32);
    /// ```
    pub fn generate(config: &CsrfConfig, origin: Option<&OriginFacts>) -> Result<IssuedToken> {
        Self::generate_at(config, origin, Utc::now())
    }

    /// [`generate`](Self::generate) against an explicit clock.
    pub fn generate_at(
        config: &CsrfConfig,
        origin: Option<&OriginFacts>,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        let mut segments = vec![random_secret(config.token_length)?];

        if config.check_origin {
            if let Some(origin) = origin {
                segments.push(digest::origin_hash(origin));
            }
        }

        let mut expires_at = None;
        if config.token_expires {
            let at = expiry_instant(now, config.token_expiration)?;
            let millis = at.timestamp_millis();
            segments.push(match config.token_format {
                TokenFormat::Hashed => digest::expiry_hash(millis),
                TokenFormat::Signed => millis.to_string(),
            });
            expires_at = Some(at);
        }

        if config.token_format == TokenFormat::Signed {
            let key = config.signing_key.as_deref().ok_or_else(|| {
                CsrfError::InvalidConfig("signed tokens require a signing_key".to_string())
            })?;
            let payload = segments.join(":");
            segments.push(digest::sign(key, &payload)?);
        }

        Ok(IssuedToken {
            value: segments.join(":"),
            expires_at,
        })
    }

    /// Parse a token under the active configuration.
    ///
    /// The segment count must match the configuration exactly, no segment may
    /// be empty, and digest segments must be 64 lowercase hex characters.
    pub fn parse<'a>(token: &'a str, config: &CsrfConfig) -> std::result::Result<ParsedToken<'a>, RejectReason> {
        parse_layout(token, Layout::of(config))
    }

    /// Like [`parse`](Self::parse), but also accepts tokens that lack optional
    /// segments the configuration expects. Missing segments come back as
    /// `None` so the validator can name what was stripped.
    pub fn parse_lenient<'a>(
        token: &'a str,
        config: &CsrfConfig,
    ) -> std::result::Result<ParsedToken<'a>, RejectReason> {
        Layout::of(config)
            .with_stripped()
            .into_iter()
            .find_map(|layout| parse_layout(token, layout).ok())
            .ok_or(RejectReason::Malformed)
    }
}

fn random_secret(length: usize) -> Result<String> {
    if length == 0 {
        return Err(CsrfError::InvalidConfig(
            "token_length must be at least 1 byte".to_string(),
        ));
    }

    let mut bytes = vec![0u8; length];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CsrfError::RandomSource(e.to_string()))?;
    Ok(hex::encode(bytes))
}

fn expiry_instant(now: DateTime<Utc>, seconds: i64) -> Result<DateTime<Utc>> {
    let window = Duration::try_seconds(seconds)
        .ok_or_else(|| CsrfError::InvalidConfig(format!("token_expiration {} is out of range", seconds)))?;
    let at = now
        .checked_add_signed(window)
        .ok_or_else(|| CsrfError::InvalidConfig(format!("token_expiration {} overflows", seconds)))?;

    // Truncate so the ledger instant re-hashes to the wire segment
    DateTime::from_timestamp_millis(at.timestamp_millis())
        .ok_or_else(|| CsrfError::InvalidConfig(format!("token_expiration {} overflows", seconds)))
}

fn parse_millis(segment: &str) -> Option<i64> {
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn parse_layout(token: &str, layout: Layout) -> std::result::Result<ParsedToken<'_>, RejectReason> {
    let segments: Vec<&str> = token.split(SEPARATOR).collect();
    if segments.len() != layout.segment_count() || segments.iter().any(|s| s.is_empty()) {
        return Err(RejectReason::Malformed);
    }

    let mut segments = segments.into_iter();
    let mut next = || segments.next().ok_or(RejectReason::Malformed);

    let secret = next()?;
    if !digest::is_lower_hex(secret) || secret.len() % 2 != 0 {
        return Err(RejectReason::Malformed);
    }

    let origin_hash = if layout.origin {
        let hash = next()?;
        if !digest::is_digest_hex(hash) {
            return Err(RejectReason::Malformed);
        }
        Some(hash)
    } else {
        None
    };

    let expiration = if layout.expiration {
        let segment = next()?;
        let parsed = match layout.format {
            TokenFormat::Hashed if digest::is_digest_hex(segment) => Expiration::Hashed(segment),
            TokenFormat::Signed => Expiration::Plain(parse_millis(segment).ok_or(RejectReason::Malformed)?),
            _ => return Err(RejectReason::Malformed),
        };
        Some(parsed)
    } else {
        None
    };

    let (signature, payload) = if layout.format == TokenFormat::Signed {
        let signature = next()?;
        if !digest::is_digest_hex(signature) {
            return Err(RejectReason::Malformed);
        }
        let payload_len = token.len() - signature.len() - SEPARATOR.len_utf8();
        (Some(signature), &token[..payload_len])
    } else {
        (None, token)
    };

    Ok(ParsedToken {
        secret,
        origin_hash,
        expiration,
        signature,
        payload,
    })
}
