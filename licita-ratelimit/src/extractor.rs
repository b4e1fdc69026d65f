//! Key extraction for rate limiting
//!
//! Requests are counted per identifier. By default that is the client IP as
//! reported by the proxy in front of the application.

use licita_core::HttpRequest;

/// Identifier used when a request carries no usable client address.
pub const ANONYMOUS: &str = "anonymous";

/// Proxy headers consulted for the client address, in priority order.
const CLIENT_IP_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Client IP from proxy headers.
///
/// `X-Forwarded-For` may list several hops; the first one is the client.
pub fn client_ip(req: &HttpRequest) -> Option<String> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        let value = req.header(name)?;
        let ip = value.split(',').next().unwrap_or(value).trim();
        (!ip.is_empty()).then(|| ip.to_string())
    })
}

/// Identifier for a request: `token` when given, else the client IP, else
/// [`ANONYMOUS`].
pub fn client_identifier(req: &HttpRequest, token: Option<&str>) -> String {
    token
        .map(str::to_string)
        .or_else(|| client_ip(req))
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

/// Key extraction strategies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeyExtractor {
    /// Client IP from proxy headers
    #[default]
    ClientIp,
    /// Value of a request header (an API key, a session id), falling back to
    /// the client IP when absent
    Header {
        /// Header name to extract
        name: String,
    },
    /// Client IP and path, for per-endpoint budgets
    IpAndPath,
    /// The same identifier for every request
    Fixed(String),
}

impl KeyExtractor {
    pub fn client_ip() -> Self {
        Self::ClientIp
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::Header { name: name.into() }
    }

    pub fn ip_and_path() -> Self {
        Self::IpAndPath
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self::Fixed(token.into())
    }

    /// Extract the identifier for `req`. Never fails.
    pub fn extract(&self, req: &HttpRequest) -> String {
        match self {
            Self::ClientIp => client_identifier(req, None),
            Self::Header { name } => client_identifier(req, req.header(name)),
            Self::IpAndPath => format!("{}:{}", client_identifier(req, None), req.path),
            Self::Fixed(token) => client_identifier(req, Some(token)),
        }
    }

    /// Get a description of this extractor
    pub fn description(&self) -> &str {
        match self {
            Self::ClientIp => "Client IP",
            Self::Header { .. } => "Header",
            Self::IpAndPath => "Client IP + Path",
            Self::Fixed(_) => "Fixed token",
        }
    }
}
