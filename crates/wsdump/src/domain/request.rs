//! Parsed HTTP request head.

use std::net::SocketAddr;

/// The parts of an inbound HTTP/1.x request the server looks at.
///
/// Header names keep their original spelling; lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Remote address of the client.
    pub peer_addr: SocketAddr,
    /// Local address the connection was accepted on.
    pub local_addr: SocketAddr,
    pub method: String,
    /// Request target as sent (path plus optional query).
    pub target: String,
    /// Protocol version, e.g. `HTTP/1.1`.
    pub version: String,
    /// Headers in arrival order.
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Returns the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if header `name` holds `token` in its comma-separated
    /// value list (e.g. `Connection: keep-alive, Upgrade`).
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .flat_map(|(_, v)| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }

    /// `host[:port]` the client used to reach us: the `Host` header when
    /// present, otherwise the local socket address.
    pub fn authority(&self) -> String {
        match self.header("Host").map(str::trim) {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => self.local_addr.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::RequestHead;

    /// A request head from `127.0.0.1:50000` to `127.0.0.1:9980` with the
    /// given headers.
    pub fn head(method: &str, headers: &[(&str, &str)]) -> RequestHead {
        RequestHead {
            peer_addr: "127.0.0.1:50000".parse().unwrap(),
            local_addr: "127.0.0.1:9980".parse().unwrap(),
            method: method.to_string(),
            target: "/ws".to_string(),
            version: "HTTP/1.1".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Headers of a valid RFC 6455 upgrade request (key from §1.3).
    pub fn upgrade_headers() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Host", "localhost:9980"),
            ("Upgrade", "websocket"),
            ("Connection", "Upgrade"),
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("Sec-WebSocket-Version", "13"),
        ]
    }
}
