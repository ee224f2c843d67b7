//! Endpoint parsing (raw socket vs HTTP) and the JSON-RPC transports.
//!
//! parse_endpoint -> Endpoint { Socket | Http }
//! ConnectionManager::invoke dispatches to the socket or HTTP client and
//! owns the reconnect policy.
//!
use anyhow::{Result, bail};
use serde_json::{Map, Value};
use std::fmt;
use url::Url;

pub mod connection;
pub mod error;
pub mod http;
pub mod socket;

pub use connection::ConnectionManager;
pub use error::RpcError;

/// Transport selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Socket,
    Http,
}

/// A parsed representation of the user-supplied address.
///
/// It retains the original input for prompts and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Persistent line-delimited JSON-RPC over TCP (`host:port`).
    Socket { original: String, host: String, port: u16 },
    /// Stateless JSON-RPC over HTTP POST.
    Http { original: String, url: Url },
}

impl Endpoint {
    /// Returns the original user-supplied form.
    pub fn original(&self) -> &str {
        match self {
            Endpoint::Socket { original, .. } => original,
            Endpoint::Http { original, .. } => original,
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Endpoint::Socket { .. } => TransportKind::Socket,
            Endpoint::Http { .. } => TransportKind::Http,
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self.kind(), TransportKind::Http)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Socket { host, port, .. } => write!(f, "tcp://{host}:{port}"),
            Endpoint::Http { url, .. } => write!(f, "{url}"),
        }
    }
}

/// Parse an address into an [`Endpoint`].
///
/// 1. A URL with scheme http/https selects the HTTP transport.
/// 2. Anything else must be `host:port` and selects the socket transport
///    (`localhost:3000` parses as a URL with scheme `localhost`, so unknown
///    schemes fall through here).
///
/// Examples:
/// - "http://localhost:3000/rpc" -> Http
/// - "localhost:3000" -> Socket
/// - "[::1]:3000" -> Socket
pub fn parse_endpoint(raw: &str) -> Result<Endpoint> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("address is empty");
    }

    if let Ok(url) = Url::parse(trimmed)
        && matches!(url.scheme(), "http" | "https")
    {
        return Ok(Endpoint::Http {
            original: trimmed.to_string(),
            url,
        });
    }

    let Some((host, port)) = trimmed.rsplit_once(':') else {
        bail!("address '{trimmed}' is neither an http(s) URL nor host:port");
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        bail!("address '{trimmed}' has an empty host");
    }
    let Ok(port) = port.parse::<u16>() else {
        bail!("address '{trimmed}' has an invalid port '{port}'");
    };

    Ok(Endpoint::Socket {
        original: trimmed.to_string(),
        host: host.to_string(),
        port,
    })
}

/// Outcome of a completed call: exactly one of result or error is meaningful.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Result(Value),
    /// The remote method raised an application error.
    Error(Value),
}

/// Response envelope shared by both transports. The socket form also
/// carries the correlation `id`.
#[derive(Debug)]
pub(crate) struct ResponseEnvelope {
    pub result: Option<Value>,
    pub error: Option<Value>,
    pub id: Option<Value>,
}

impl ResponseEnvelope {
    /// Decode one reply. Anything but a JSON object is malformed, including
    /// arrays that would otherwise map onto the fields by position.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RpcError> {
        let mut object: Map<String, Value> = serde_json::from_slice(bytes).map_err(|e| {
            RpcError::Malformed(format!("{e}\n{}", String::from_utf8_lossy(bytes)))
        })?;
        Ok(Self {
            result: object.remove("result"),
            error: object.remove("error"),
            id: object.remove("id"),
        })
    }

    /// A null `error` counts as absent.
    pub fn into_reply(self) -> Reply {
        match self.error {
            Some(err) if !err.is_null() => Reply::Error(err),
            _ => Reply::Result(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_http_url() {
        let ep = parse_endpoint("http://localhost:3000/rpc").unwrap();
        assert!(ep.is_http());
        assert_eq!(ep.original(), "http://localhost:3000/rpc");
    }

    #[test]
    fn parse_https_url() {
        let ep = parse_endpoint("https://rpc.example.com").unwrap();
        assert_eq!(ep.kind(), TransportKind::Http);
    }

    #[test]
    fn parse_host_port() {
        let ep = parse_endpoint("localhost:3000").unwrap();
        assert_eq!(
            ep,
            Endpoint::Socket {
                original: "localhost:3000".into(),
                host: "localhost".into(),
                port: 3000,
            }
        );
    }

    #[test]
    fn parse_bracketed_ipv6() {
        let ep = parse_endpoint("[::1]:4000").unwrap();
        if let Endpoint::Socket { host, port, .. } = ep {
            assert_eq!(host, "::1");
            assert_eq!(port, 4000);
        } else {
            panic!("Expected Socket variant");
        }
    }

    #[test]
    fn bad_addresses_rejected() {
        assert!(parse_endpoint("   ").unwrap_err().to_string().contains("empty"));
        assert!(parse_endpoint("localhost").is_err());
        assert!(parse_endpoint(":3000").is_err());
        assert!(parse_endpoint("localhost:http").is_err());
        assert!(parse_endpoint("localhost:70000").is_err());
    }

    #[test]
    fn envelope_with_null_error_is_result() {
        let env = ResponseEnvelope::from_slice(br#"{"result":3,"error":null,"id":1}"#).unwrap();
        assert_eq!(env.id, Some(json!(1)));
        assert_eq!(env.into_reply(), Reply::Result(json!(3)));
    }

    #[test]
    fn envelope_with_error_is_application_error() {
        let env = ResponseEnvelope::from_slice(br#"{"result":null,"error":"boom"}"#).unwrap();
        assert_eq!(env.into_reply(), Reply::Error(json!("boom")));
    }

    #[test]
    fn envelope_must_be_an_object() {
        for body in [
            &br#"[{"result":1,"error":null,"id":1},"oops"]"#[..],
            br#"[1,null,1]"#,
            b"42",
            b"not json",
        ] {
            let err = ResponseEnvelope::from_slice(body).unwrap_err();
            assert!(matches!(err, RpcError::Malformed(_)), "unexpected error: {err}");
        }
    }
}
