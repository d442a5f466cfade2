//! Client origin facts (IP + User-Agent) and their extraction from requests.

use http::Request;
use http::header::USER_AGENT;
use std::net::{IpAddr, SocketAddr};

/// Peer address attached to a request by the server glue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub IpAddr);

/// The client fingerprint a token can be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginFacts {
    ip: String,
    user_agent: String,
}

impl OriginFacts {
    /// Both values are required; returns `None` if either is empty.
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Option<Self> {
        let ip = ip.into();
        let user_agent = user_agent.into();
        if ip.is_empty() || user_agent.is_empty() {
            return None;
        }
        Some(Self { ip, user_agent })
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// `"{ip}:{userAgent}"`, the origin hash preimage.
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.ip, self.user_agent)
    }
}

/// Access to the origin facts of a transport-specific request.
pub trait RequestOrigin {
    fn client_ip(&self, trust_proxy: bool) -> Option<String>;

    fn user_agent(&self) -> Option<String>;

    fn origin_facts(&self, trust_proxy: bool) -> Option<OriginFacts> {
        OriginFacts::new(self.client_ip(trust_proxy)?, self.user_agent()?)
    }
}

fn header_str<'a, B>(request: &'a Request<B>, name: &str) -> Option<&'a str> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<B> RequestOrigin for Request<B> {
    fn client_ip(&self, trust_proxy: bool) -> Option<String> {
        if trust_proxy {
            let forwarded = header_str(self, "x-forwarded-for")
                .and_then(|list| list.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty());
            if let Some(ip) = forwarded.or_else(|| header_str(self, "x-real-ip")) {
                return Some(ip.to_string());
            }
        }

        let extensions = self.extensions();
        extensions
            .get::<ClientAddr>()
            .map(|addr| addr.0)
            .or_else(|| extensions.get::<SocketAddr>().map(SocketAddr::ip))
            .map(|ip| ip.to_string())
    }

    fn user_agent(&self) -> Option<String> {
        header_str(self, USER_AGENT.as_str()).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> http::request::Builder {
        Request::builder().uri("/form")
    }

    #[test]
    fn test_origin_facts_require_both_values() {
        assert!(OriginFacts::new("", "UA").is_none());
        assert!(OriginFacts::new("1.2.3.4", "").is_none());

        let facts = OriginFacts::new("1.2.3.4", "UA-A").unwrap();
        assert_eq!(facts.fingerprint(), "1.2.3.4:UA-A");
    }

    #[test]
    fn test_client_ip_from_extension() {
        let mut req = request().header("user-agent", "Agent/1").body(()).unwrap();
        req.extensions_mut()
            .insert(ClientAddr("10.0.0.5".parse().unwrap()));

        let facts = req.origin_facts(false).unwrap();
        assert_eq!(facts.ip(), "10.0.0.5");
        assert_eq!(facts.user_agent(), "Agent/1");
    }

    #[test]
    fn test_client_ip_from_socket_addr() {
        let mut req = request().body(()).unwrap();
        req.extensions_mut()
            .insert::<SocketAddr>("192.168.1.9:5555".parse().unwrap());
        assert_eq!(req.client_ip(false).as_deref(), Some("192.168.1.9"));
    }

    #[test]
    fn test_forwarded_headers_only_when_trusted() {
        let mut req = request()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("user-agent", "UA")
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(ClientAddr("10.0.0.1".parse().unwrap()));

        assert_eq!(req.client_ip(true).as_deref(), Some("203.0.113.7"));
        assert_eq!(req.client_ip(false).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_real_ip_fallback() {
        let req = request().header("x-real-ip", "198.51.100.2").body(()).unwrap();
        assert_eq!(req.client_ip(true).as_deref(), Some("198.51.100.2"));
        assert_eq!(req.client_ip(false), None);
    }

    #[test]
    fn test_missing_user_agent_means_no_facts() {
        let mut req = request().body(()).unwrap();
        req.extensions_mut()
            .insert(ClientAddr("10.0.0.5".parse().unwrap()));
        assert!(req.origin_facts(false).is_none());
    }
}
