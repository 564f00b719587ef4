//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A browser cookie belonging to one monitor server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub server: String,
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Expiration as epoch seconds, `None` for session cookies.
    pub expiration: Option<i64>,
    pub secure: bool,
    pub httponly: bool,
}

impl Default for StoredCookie {
    fn default() -> Self {
        Self {
            server: String::new(),
            name: String::new(),
            value: String::new(),
            domain: String::new(),
            path: "/".to_string(),
            expiration: None,
            secure: false,
            httponly: false,
        }
    }
}

impl StoredCookie {
    /// Composite primary key `{server}+{domain}+{path}+{name}`.
    pub fn cookey(&self) -> String {
        format!("{}+{}+{}+{}", self.server, self.domain, self.path, self.name)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiration, Some(exp) if exp <= now.timestamp())
    }

    /// URL the cookie is scoped to, used to place it into a cookie jar.
    pub fn origin_url(&self) -> Option<url::Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let host = self.domain.trim_start_matches('.');
        let path = if self.path.is_empty() { "/" } else { &self.path };
        url::Url::parse(&format!("{}://{}{}", scheme, host, path)).ok()
    }

    /// Name and value fit into a `Set-Cookie` header without ending the
    /// pair early or smuggling attributes.
    pub fn is_header_safe(&self) -> bool {
        let bad = |c: char| c == ';' || c.is_control();
        !self.name.is_empty()
            && !self.name.contains(|c: char| bad(c) || c == '=' || c.is_whitespace())
            && !self.value.contains(bad)
    }

    /// `Set-Cookie` header value equivalent to this cookie, `None` for a
    /// cookie that is not [header safe](Self::is_header_safe).
    pub fn set_cookie_header(&self) -> Option<String> {
        if !self.is_header_safe() {
            return None;
        }
        let mut header = format!("{}={}", self.name, self.value);
        // host-only cookies carry no Domain attribute
        if self.domain.starts_with('.') {
            header.push_str(&format!("; Domain={}", self.domain));
        }
        header.push_str(&format!(
            "; Path={}",
            if self.path.is_empty() { "/" } else { &self.path }
        ));
        if let Some(exp) = self.expiration.and_then(|e| DateTime::<Utc>::from_timestamp(e, 0)) {
            header.push_str(&format!("; Expires={}", exp.format("%a, %d %b %Y %H:%M:%S GMT")));
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.httponly {
            header.push_str("; HttpOnly");
        }
        Some(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie() -> StoredCookie {
        StoredCookie {
            server: "cmk".to_string(),
            name: "auth_site".to_string(),
            value: "abc".to_string(),
            domain: ".example.com".to_string(),
            path: "/site".to_string(),
            expiration: Some(1_700_000_000),
            secure: true,
            httponly: true,
        }
    }

    #[test]
    fn test_cookey() {
        assert_eq!(cookie().cookey(), "cmk+.example.com+/site+auth_site");
    }

    #[test]
    fn test_set_cookie_header() {
        let header = cookie().set_cookie_header().unwrap();
        assert!(header.starts_with("auth_site=abc; Domain=.example.com; Path=/site"));
        assert!(header.contains("Expires=Tue, 14 Nov 2023 22:13:20 GMT"));
        assert!(header.ends_with("; Secure; HttpOnly"));
    }

    #[test]
    fn test_set_cookie_header_rejects_separators() {
        let smuggled = StoredCookie {
            value: "abc; Domain=.evil.example".to_string(),
            ..cookie()
        };
        assert!(!smuggled.is_header_safe());
        assert_eq!(smuggled.set_cookie_header(), None);

        let bad_name = StoredCookie {
            name: "a=b".to_string(),
            ..cookie()
        };
        assert_eq!(bad_name.set_cookie_header(), None);

        let quoted = StoredCookie {
            value: "\"a b,c\"".to_string(),
            ..cookie()
        };
        assert!(quoted.set_cookie_header().unwrap().starts_with("auth_site=\"a b,c\"; "));
    }

    #[test]
    fn test_origin_url() {
        let url = cookie().origin_url().unwrap();
        assert_eq!(url.as_str(), "https://example.com/site");
    }
}
