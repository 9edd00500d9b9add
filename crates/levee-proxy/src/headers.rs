//! Header propagation rules
//!
//! Headers cross the proxy first-value-only: a name that appears several
//! times collapses to its first occurrence, in both directions.

use http::header::{self, HeaderMap, HeaderName};

/// Connection-scoped headers that never cross the proxy.
const HOP_BY_HOP: [HeaderName; 5] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name == "keep-alive" || name == "proxy-connection"
}

/// Collapse every header name to its first value.
pub fn first_values(headers: &HeaderMap) -> HeaderMap {
    let mut collapsed = HeaderMap::with_capacity(headers.keys_len());
    for name in headers.keys() {
        if let Some(value) = headers.get(name) {
            collapsed.insert(name.clone(), value.clone());
        }
    }
    collapsed
}

/// Headers to send upstream for an inbound request.
///
/// `host` is derived from the target URL and `content-length` from the
/// buffered body, so neither is copied from the client.
pub fn upstream_request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = first_values(inbound);
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers
}

/// Headers to send back to the client for an upstream response.
pub fn client_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = first_values(upstream);
    strip_hop_by_hop(&mut headers);
    headers
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let doomed: Vec<HeaderName> = headers.keys().filter(|n| is_hop_by_hop(n)).cloned().collect();
    for name in doomed {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_first_values_collapses_repeated_names() {
        let mut headers = HeaderMap::new();
        headers.append(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.append(header::ACCEPT, HeaderValue::from_static("text/plain"));
        headers.append("x-npm-session", HeaderValue::from_static("abc"));

        let collapsed = first_values(&headers);
        assert_eq!(collapsed.get_all(header::ACCEPT).iter().count(), 1);
        assert_eq!(collapsed[header::ACCEPT], "application/json");
        assert_eq!(collapsed["x-npm-session"], "abc");
    }

    #[test]
    fn test_upstream_request_headers_strip_connection_scoped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("levee.local"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"abc\""));

        let forwarded = upstream_request_headers(&headers);
        assert!(forwarded.get(header::HOST).is_none());
        assert!(forwarded.get(header::CONTENT_LENGTH).is_none());
        assert!(forwarded.get(header::CONNECTION).is_none());
        assert!(forwarded.get("keep-alive").is_none());
        assert_eq!(forwarded[header::IF_NONE_MATCH], "\"abc\"");
    }

    #[test]
    fn test_client_response_headers_keep_content_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::ETAG, HeaderValue::from_static("\"v1\""));

        let forwarded = client_response_headers(&headers);
        assert!(forwarded.get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(forwarded[header::CONTENT_TYPE], "application/json");
        assert_eq!(forwarded[header::ETAG], "\"v1\"");
    }
}
