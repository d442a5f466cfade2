use crate::error::{CsrfError, Result};
use securestate_config::{
    ConfigError, ConfigManager, ConfigValidator, Environment, Validate,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Environment variable prefix for [`CsrfConfig::from_env`].
pub const ENV_PREFIX: &str = "SECURESTATE";

/// Header carrying the echoed token on state-changing requests.
pub const DEFAULT_HEADER_NAME: &str = "x-csrf-token";

/// Cookie (and body field) name used for the double submit.
pub const DEFAULT_COOKIE_NAME: &str = "_csrfToken";

/// Minimum HMAC key length for the signed token format.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Upper bound on the random secret, in bytes.
pub const MAX_TOKEN_LENGTH: usize = 1024;

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = CsrfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            other => Err(CsrfError::InvalidConfig(format!(
                "unknown SameSite policy '{}'",
                other
            ))),
        }
    }
}

impl Serialize for SameSite {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SameSite {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Wire layout of issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFormat {
    /// `secret[:originHash][:expirationHash]`, SHA-256 hex digests.
    #[default]
    Hashed,
    /// `secret[:originHash][:expiresAtMs]:signature`, HMAC-SHA256 over the preceding segments.
    Signed,
}

impl FromStr for TokenFormat {
    type Err = CsrfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hashed" => Ok(TokenFormat::Hashed),
            "signed" | "hmac" => Ok(TokenFormat::Signed),
            other => Err(CsrfError::InvalidConfig(format!(
                "unknown token format '{}'",
                other
            ))),
        }
    }
}

/// Attributes written on the token cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookieOptions {
    pub http_only: bool,
    pub same_site: SameSite,
    /// Defaults to `true` only when `SECURESTATE_ENV=production`. An explicit
    /// value (`with_cookie_secure`, `cookie_secure`) is honoured in any
    /// environment, so `Secure` can be forced on for HTTPS staging hosts.
    pub secure: bool,
    pub path: String,
    pub domain: Option<String>,
    /// Lifetime in seconds. Falls back to `token_expiration` for expiring tokens.
    pub max_age: Option<i64>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            same_site: SameSite::Strict,
            secure: Environment::current().is_production(),
            path: "/".to_string(),
            domain: None,
            max_age: None,
        }
    }
}

impl CookieOptions {
    /// Merge a partial group field by field.
    pub fn merge(&mut self, patch: CookieOptionsPatch) {
        if let Some(http_only) = patch.http_only {
            self.http_only = http_only;
        }
        if let Some(same_site) = patch.same_site {
            self.same_site = same_site;
        }
        if let Some(secure) = patch.secure {
            self.secure = secure;
        }
        if let Some(path) = patch.path {
            self.path = path;
        }
        if let Some(domain) = patch.domain {
            self.domain = Some(domain).filter(|d| !d.is_empty());
        }
        if let Some(max_age) = patch.max_age {
            self.max_age = Some(max_age);
        }
    }
}

/// CSRF protection configuration
#[derive(Clone)]
pub struct CsrfConfig {
    /// Random secret size in bytes, before hex encoding
    pub token_length: usize,

    /// Issue a fresh token on every request instead of reusing the cookie
    pub regenerate_token: bool,

    /// Bind tokens to the client IP and User-Agent
    pub check_origin: bool,

    /// Append an expiration segment
    pub token_expires: bool,

    /// Validity window in seconds when `token_expires` is set
    pub token_expiration: i64,

    /// Name shared by the cookie and the body field
    pub cookie_name: String,

    pub cookie_options: CookieOptions,

    /// Log accept/reject decisions with the compared token values
    pub debug: bool,

    /// Header carrying the echoed token
    pub header_name: String,

    pub token_format: TokenFormat,

    /// HMAC key for [`TokenFormat::Signed`]
    pub signing_key: Option<Vec<u8>>,

    /// Methods that are never checked
    pub safe_methods: Vec<String>,

    /// Path prefixes that are never checked
    pub exclude_paths: Vec<String>,

    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`
    pub trust_proxy: bool,
}

impl fmt::Debug for CsrfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfConfig")
            .field("token_length", &self.token_length)
            .field("regenerate_token", &self.regenerate_token)
            .field("check_origin", &self.check_origin)
            .field("token_expires", &self.token_expires)
            .field("token_expiration", &self.token_expiration)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_options", &self.cookie_options)
            .field("debug", &self.debug)
            .field("header_name", &self.header_name)
            .field("token_format", &self.token_format)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("safe_methods", &self.safe_methods)
            .field("exclude_paths", &self.exclude_paths)
            .field("trust_proxy", &self.trust_proxy)
            .finish()
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            token_length: 32,
            regenerate_token: false,
            check_origin: false,
            token_expires: false,
            token_expiration: 0,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_options: CookieOptions::default(),
            debug: false,
            header_name: DEFAULT_HEADER_NAME.to_string(),
            token_format: TokenFormat::Hashed,
            signing_key: None,
            safe_methods: vec![
                "GET".to_string(),
                "HEAD".to_string(),
                "OPTIONS".to_string(),
            ],
            exclude_paths: Vec::new(),
            trust_proxy: false,
        }
    }
}

impl CsrfConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the signed token format, with the given HMAC key.
    pub fn signed(signing_key: Vec<u8>) -> Result<Self> {
        if signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(CsrfError::InvalidConfig(format!(
                "signing key must be at least {} bytes",
                MIN_SIGNING_KEY_LEN
            )));
        }

        Ok(Self {
            token_format: TokenFormat::Signed,
            signing_key: Some(signing_key),
            ..Self::default()
        })
    }

    /// Draw a fresh signing key from the operating system RNG.
    pub fn generate_signing_key() -> Result<Vec<u8>> {
        use rand::RngCore;

        let mut key = vec![0u8; MIN_SIGNING_KEY_LEN];
        rand::rngs::OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| CsrfError::RandomSource(e.to_string()))?;
        Ok(key)
    }

    /// Load from `SECURESTATE_*` environment variables and an optional `.env` file.
    pub fn from_env() -> Result<Self> {
        let manager = ConfigManager::builder()
            .with_prefix(ENV_PREFIX)
            .load_dotenv(None)
            .load_env()
            .build()?;

        Self::from_manager(&manager)
    }

    /// Build from a loaded manager. Flat keys (`cookie_path`) take precedence
    /// over nested ones (`cookie_options.path`).
    pub fn from_manager(manager: &ConfigManager) -> Result<Self> {
        let mut config = Self::default();
        config.apply(ConfigPatch::from_manager(manager)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Deep-merge a partial configuration. Scalars replace, the cookie group
    /// is merged field by field.
    pub fn apply(&mut self, patch: ConfigPatch) -> Result<()> {
        if let Some(v) = patch.token_length {
            self.token_length = v;
        }
        if let Some(v) = patch.regenerate_token {
            self.regenerate_token = v;
        }
        if let Some(v) = patch.check_origin {
            self.check_origin = v;
        }
        if let Some(v) = patch.token_expires {
            self.token_expires = v;
        }
        if let Some(v) = patch.token_expiration {
            self.token_expiration = v;
        }
        if let Some(v) = patch.cookie_name {
            self.cookie_name = v;
        }
        if let Some(cookie) = patch.cookie_options {
            self.cookie_options.merge(cookie);
        }
        if let Some(v) = patch.debug {
            self.debug = v;
        }
        if let Some(v) = patch.header_name {
            self.header_name = v.to_lowercase();
        }
        if let Some(v) = patch.token_format {
            self.token_format = v;
        }
        if let Some(key) = patch.signing_key {
            let decoded = hex::decode(key.trim())
                .map_err(|e| CsrfError::InvalidConfig(format!("signing key is not hex: {}", e)))?;
            self.signing_key = Some(decoded);
        }
        if let Some(v) = patch.safe_methods {
            self.safe_methods = v.into_iter().map(|m| m.to_uppercase()).collect();
        }
        if let Some(v) = patch.exclude_paths {
            self.exclude_paths = v;
        }
        if let Some(v) = patch.trust_proxy {
            self.trust_proxy = v;
        }

        if self.debug {
            let rendered = format!("{:?}", self);
            crate::diagnostics::report(
                self,
                securestate_log::Level::Info,
                "securestate::config",
                "Updated configuration",
                &[("config", rendered.as_str())],
            );
        }

        Ok(())
    }

    pub fn with_token_length(mut self, bytes: usize) -> Self {
        self.token_length = bytes;
        self
    }

    pub fn with_regenerate_token(mut self, regenerate: bool) -> Self {
        self.regenerate_token = regenerate;
        self
    }

    pub fn with_check_origin(mut self, check: bool) -> Self {
        self.check_origin = check;
        self
    }

    /// Enable expiration with the given window in seconds
    pub fn with_expiration(mut self, seconds: i64) -> Self {
        self.token_expires = true;
        self.token_expiration = seconds;
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into().to_lowercase();
        self
    }

    pub fn with_cookie_options(mut self, options: CookieOptions) -> Self {
        self.cookie_options = options;
        self
    }

    pub fn with_cookie_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie_options.same_site = same_site;
        self
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_options.secure = secure;
        self
    }

    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_options.domain = Some(domain.into()).filter(|d| !d.is_empty());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_safe_methods(mut self, methods: Vec<String>) -> Self {
        self.safe_methods = methods.into_iter().map(|m| m.to_uppercase()).collect();
        self
    }

    pub fn with_exclude_paths(mut self, paths: Vec<String>) -> Self {
        self.exclude_paths = paths;
        self
    }

    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }
}

impl Validate for CsrfConfig {
    fn validate(&self) -> securestate_config::Result<()> {
        ConfigValidator::in_range(self.token_length, 1, MAX_TOKEN_LENGTH, "token_length")?;
        ConfigValidator::is_token(&self.cookie_name, "cookie_name")?;
        ConfigValidator::is_token(&self.header_name, "header_name")?;

        if self.token_expires && self.token_expiration <= 0 {
            return Err(ConfigError::ValidationError(
                "token_expiration must be positive when token_expires is set".to_string(),
            ));
        }

        if self.token_format == TokenFormat::Signed {
            let key = self.signing_key.as_deref().ok_or_else(|| {
                ConfigError::ValidationError("signed tokens require a signing_key".to_string())
            })?;
            ConfigValidator::min_len(key, MIN_SIGNING_KEY_LEN, "signing_key")?;
        }

        Ok(())
    }
}

/// Partial cookie attribute group.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CookieOptionsPatch {
    pub http_only: Option<bool>,
    pub same_site: Option<SameSite>,
    pub secure: Option<bool>,
    pub path: Option<String>,
    /// An empty string clears the domain.
    pub domain: Option<String>,
    pub max_age: Option<i64>,
}

/// Partial configuration, applied with [`CsrfConfig::apply`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub token_length: Option<usize>,
    pub regenerate_token: Option<bool>,
    pub check_origin: Option<bool>,
    pub token_expires: Option<bool>,
    pub token_expiration: Option<i64>,
    pub cookie_name: Option<String>,
    pub cookie_options: Option<CookieOptionsPatch>,
    pub debug: Option<bool>,
    pub header_name: Option<String>,
    pub token_format: Option<TokenFormat>,
    /// Hex-encoded HMAC key
    pub signing_key: Option<String>,
    pub safe_methods: Option<Vec<String>>,
    pub exclude_paths: Option<Vec<String>>,
    pub trust_proxy: Option<bool>,
}

fn optional<T>(result: securestate_config::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::KeyNotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn first<T>(
    manager: &ConfigManager,
    keys: &[&str],
    get: impl Fn(&ConfigManager, &str) -> securestate_config::Result<T>,
) -> Result<Option<T>> {
    for key in keys {
        if let Some(value) = optional(get(manager, key))? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn list(manager: &ConfigManager, key: &str) -> Result<Option<Vec<String>>> {
    if let Ok(values) = manager.get::<Vec<String>>(key) {
        return Ok(Some(values));
    }
    Ok(optional(manager.get_string(key))?.map(|raw| {
        raw.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }))
}

fn parsed<T: FromStr<Err = CsrfError>>(raw: Option<String>) -> Result<Option<T>> {
    raw.map(|value| value.parse()).transpose()
}

impl ConfigPatch {
    /// Collect every known key present in the manager.
    pub fn from_manager(manager: &ConfigManager) -> Result<Self> {
        let token_length = first(manager, &["token_length"], ConfigManager::get_int)?
            .map(|v| {
                usize::try_from(v)
                    .map_err(|_| CsrfError::InvalidConfig(format!("token_length {} is negative", v)))
            })
            .transpose()?;

        let cookie_options = CookieOptionsPatch {
            http_only: first(
                manager,
                &["cookie_http_only", "cookie_options.http_only"],
                ConfigManager::get_bool,
            )?,
            same_site: parsed(first(
                manager,
                &["cookie_same_site", "cookie_options.same_site"],
                ConfigManager::get_string,
            )?)?,
            secure: first(
                manager,
                &["cookie_secure", "cookie_options.secure"],
                ConfigManager::get_bool,
            )?,
            path: first(
                manager,
                &["cookie_path", "cookie_options.path"],
                ConfigManager::get_string,
            )?,
            domain: first(
                manager,
                &["cookie_domain", "cookie_options.domain"],
                ConfigManager::get_string,
            )?,
            max_age: first(
                manager,
                &["cookie_max_age", "cookie_options.max_age"],
                ConfigManager::get_int,
            )?,
        };

        Ok(Self {
            token_length,
            regenerate_token: first(manager, &["regenerate_token"], ConfigManager::get_bool)?,
            check_origin: first(manager, &["check_origin"], ConfigManager::get_bool)?,
            token_expires: first(manager, &["token_expires"], ConfigManager::get_bool)?,
            token_expiration: first(manager, &["token_expiration"], ConfigManager::get_int)?,
            cookie_name: first(manager, &["cookie_name"], ConfigManager::get_string)?,
            cookie_options: Some(cookie_options),
            debug: first(manager, &["debug"], ConfigManager::get_bool)?,
            header_name: first(manager, &["header_name"], ConfigManager::get_string)?,
            token_format: parsed(first(manager, &["token_format"], ConfigManager::get_string)?)?,
            signing_key: first(manager, &["signing_key"], ConfigManager::get_string)?,
            safe_methods: list(manager, "safe_methods")?,
            exclude_paths: list(manager, "exclude_paths")?,
            trust_proxy: first(manager, &["trust_proxy"], ConfigManager::get_bool)?,
        })
    }
}
