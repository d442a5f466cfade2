//! Cookie transport: reading the token cookie and building `Set-Cookie` values.

use crate::config::CookieOptions;
use crate::error::{CsrfError, Result};
use http::header::{COOKIE, HeaderMap, HeaderValue};

/// Find `name` in a `Cookie` header string. Values are percent-decoded;
/// an empty value counts as absent.
pub fn read_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
        .map(|value| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
}

/// Like [`read_cookie`], across every `Cookie` header of a request.
pub fn read_cookie_from_headers(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|header| read_cookie(header, name))
}

pub fn cookie_exists(headers: &HeaderMap, name: &str) -> bool {
    read_cookie_from_headers(headers, name).is_some()
}

/// Serialize a `Set-Cookie` value.
///
/// Attributes are written in a fixed order: `Max-Age`, `HttpOnly`,
/// `SameSite`, `Path`, `Domain`, `Secure`.
pub fn write_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut cookie = format!("{}={}", name, urlencoding::encode(value));

    if let Some(max_age) = options.max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    cookie.push_str(&format!("; SameSite={}", options.same_site.as_str()));
    if !options.path.is_empty() {
        cookie.push_str(&format!("; Path={}", options.path));
    }
    if let Some(ref domain) = options.domain {
        cookie.push_str(&format!("; Domain={}", domain));
    }
    if options.secure {
        cookie.push_str("; Secure");
    }

    cookie
}

/// A `Set-Cookie` value that clears `name` in the browser.
pub fn delete_cookie(name: &str, options: &CookieOptions) -> String {
    let options = CookieOptions {
        max_age: Some(0),
        ..options.clone()
    };
    format!(
        "{}; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
        write_cookie(name, "", &options)
    )
}

pub fn header_value(cookie: String) -> Result<HeaderValue> {
    HeaderValue::try_from(cookie).map_err(|e| CsrfError::InvalidHeader(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SameSite;

    fn options() -> CookieOptions {
        CookieOptions {
            http_only: true,
            same_site: SameSite::Strict,
            secure: false,
            path: "/".to_string(),
            domain: None,
            max_age: None,
        }
    }

    #[test]
    fn test_read_cookie() {
        let header = "theme=dark; _csrfToken=abc123; lang=en";
        assert_eq!(read_cookie(header, "_csrfToken").as_deref(), Some("abc123"));
        assert_eq!(read_cookie(header, "lang").as_deref(), Some("en"));
        assert_eq!(read_cookie(header, "missing"), None);
    }

    #[test]
    fn test_read_cookie_decodes_and_trims() {
        let header = "  _csrfToken = a%3Ab  ;other=x";
        assert_eq!(read_cookie(header, "_csrfToken").as_deref(), Some("a:b"));
    }

    #[test]
    fn test_read_cookie_empty_value_is_absent() {
        assert_eq!(read_cookie("_csrfToken=; x=1", "_csrfToken"), None);
        assert_eq!(read_cookie("", "_csrfToken"), None);
        assert_eq!(read_cookie("_csrfToken", "_csrfToken"), None);
    }

    #[test]
    fn test_read_cookie_keeps_equals_in_value() {
        assert_eq!(read_cookie("data=a=b", "data").as_deref(), Some("a=b"));
    }

    #[test]
    fn test_read_from_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("_csrfToken=tok"));

        assert_eq!(
            read_cookie_from_headers(&headers, "_csrfToken").as_deref(),
            Some("tok")
        );
        assert!(cookie_exists(&headers, "a"));
        assert!(!cookie_exists(&headers, "b"));
    }

    #[test]
    fn test_write_cookie_attribute_order() {
        let mut options = options();
        options.max_age = Some(3600);
        options.domain = Some("example.com".to_string());
        options.secure = true;

        assert_eq!(
            write_cookie("_csrfToken", "abc:def", &options),
            "_csrfToken=abc%3Adef; Max-Age=3600; HttpOnly; SameSite=Strict; Path=/; Domain=example.com; Secure"
        );
    }

    #[test]
    fn test_write_cookie_minimal() {
        let mut options = options();
        options.http_only = false;
        options.same_site = SameSite::Lax;

        assert_eq!(
            write_cookie("_csrfToken", "abc", &options),
            "_csrfToken=abc; SameSite=Lax; Path=/"
        );
    }

    #[test]
    fn test_delete_cookie() {
        let cookie = delete_cookie("_csrfToken", &options());
        assert!(cookie.starts_with("_csrfToken=; Max-Age=0"));
        assert!(cookie.ends_with("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn test_header_value_rejects_control_characters() {
        assert!(header_value("a=b".to_string()).is_ok());
        assert!(header_value("a=b\n".to_string()).is_err());
    }
}
