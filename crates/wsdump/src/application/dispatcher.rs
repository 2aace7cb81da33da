//! Per-request routing: upgrade path or bootstrap page.

use tracing::info;

use crate::domain::{DispatchDecision, RequestHead};

/// Decides the route for `req` from its `Upgrade` header alone.
///
/// The header value must equal `websocket`, ignoring ASCII case.  A request
/// with no headers at all is a plain request.
pub fn classify(req: &RequestHead) -> DispatchDecision {
    match req.header("Upgrade") {
        Some(value) if value.trim().eq_ignore_ascii_case("websocket") => {
            DispatchDecision::UpgradeRequested
        }
        _ => DispatchDecision::PlainRequest,
    }
}

/// Logs the request line and every header at info level.
pub fn log_request(req: &RequestHead) {
    info!(
        "Request from {}: {} {} {}",
        req.peer_addr, req.method, req.target, req.version
    );
    for (name, value) in &req.headers {
        info!("{name}: {value}");
    }
}

/// Logs `req` and then classifies it.  Logging happens on both branches.
pub fn dispatch(req: &RequestHead) -> DispatchDecision {
    log_request(req);
    classify(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::log_capture::capture_logs;
    use crate::domain::request::fixtures::{head, upgrade_headers};

    #[test]
    fn test_upgrade_websocket_is_upgrade_requested() {
        let req = head("GET", &upgrade_headers());
        assert_eq!(classify(&req), DispatchDecision::UpgradeRequested);
    }

    #[test]
    fn test_upgrade_value_comparison_ignores_case() {
        let req = head("GET", &[("Upgrade", "WebSocket")]);
        assert_eq!(classify(&req), DispatchDecision::UpgradeRequested);

        let req = head("GET", &[("upgrade", "WEBSOCKET")]);
        assert_eq!(classify(&req), DispatchDecision::UpgradeRequested);
    }

    #[test]
    fn test_no_headers_is_plain_request() {
        let req = head("GET", &[]);
        assert_eq!(classify(&req), DispatchDecision::PlainRequest);
    }

    #[test]
    fn test_other_upgrade_protocol_is_plain_request() {
        let req = head("GET", &[("Upgrade", "h2c")]);
        assert_eq!(classify(&req), DispatchDecision::PlainRequest);
    }

    #[test]
    fn test_upgrade_header_alone_decides_even_for_post() {
        // Method and key checks belong to the handshake, not to dispatch.
        let req = head("POST", &[("Upgrade", "websocket")]);
        assert_eq!(dispatch(&req), DispatchDecision::UpgradeRequested);
    }

    #[test]
    fn test_dispatch_logs_upgrade_request_and_headers() {
        // Arrange
        let req = head("GET", &upgrade_headers());

        // Act
        let (decision, logged) = capture_logs(|| dispatch(&req));

        // Assert
        assert_eq!(decision, DispatchDecision::UpgradeRequested);
        assert!(logged.contains("INFO"), "{logged}");
        assert!(
            logged.contains("Request from 127.0.0.1:50000: GET /ws HTTP/1.1"),
            "{logged}"
        );
        for (name, value) in upgrade_headers() {
            assert!(logged.contains(&format!("{name}: {value}")), "{logged}");
        }
    }

    #[test]
    fn test_dispatch_logs_plain_request_and_headers() {
        // Arrange
        let req = head("GET", &[("Host", "localhost:9980"), ("Accept", "text/html")]);

        // Act
        let (decision, logged) = capture_logs(|| dispatch(&req));

        // Assert
        assert_eq!(decision, DispatchDecision::PlainRequest);
        assert!(
            logged.contains("Request from 127.0.0.1:50000: GET /ws HTTP/1.1"),
            "{logged}"
        );
        assert!(logged.contains("Host: localhost:9980"), "{logged}");
        assert!(logged.contains("Accept: text/html"), "{logged}");
    }

    #[test]
    fn test_classify_alone_logs_nothing() {
        let req = head("GET", &upgrade_headers());

        let (_, logged) = capture_logs(|| classify(&req));

        assert!(logged.is_empty(), "{logged}");
    }
}
