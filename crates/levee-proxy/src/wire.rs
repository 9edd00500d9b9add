//! HTTP/1.1 wire form of buffered responses
//!
//! Cached responses are stored as the full response text (status line,
//! headers, blank line, body) and parsed back on replay.

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{StatusCode, Version};

use crate::client::UpstreamResponse;
use crate::error::ProxyError;

/// Upper bound on header lines accepted when parsing a stored response
const MAX_HEADERS: usize = 128;

/// Render a response as HTTP/1.1 text.
///
/// The body is already de-chunked, so `transfer-encoding` and `connection`
/// are dropped and `content-length` is rewritten to match the body.
pub fn encode_response(response: &UpstreamResponse) -> Bytes {
    let mut out = BytesMut::with_capacity(response.body.len() + 512);

    out.put_slice(b"HTTP/1.1 ");
    out.put_slice(response.status.as_str().as_bytes());
    if let Some(reason) = response.status.canonical_reason() {
        out.put_u8(b' ');
        out.put_slice(reason.as_bytes());
    }
    out.put_slice(b"\r\n");

    for (name, value) in response.headers.iter() {
        if *name == header::TRANSFER_ENCODING
            || *name == header::CONNECTION
            || *name == header::CONTENT_LENGTH
        {
            continue;
        }
        out.put_slice(name.as_str().as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }

    out.put_slice(format!("content-length: {}\r\n\r\n", response.body.len()).as_bytes());
    out.put_slice(&response.body);

    out.freeze()
}

/// Parse a stored HTTP/1.x response.
///
/// The body is the `content-length` bytes following the header block, or
/// everything after it when the header is absent. A truncated or otherwise
/// unparsable blob is reported as [`ProxyError::MalformedResponse`].
pub fn decode_response(raw: Bytes) -> Result<UpstreamResponse, ProxyError> {
    let mut storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut storage);

    let header_len = match parsed.parse(&raw) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => {
            return Err(ProxyError::MalformedResponse(
                "incomplete header block".to_string(),
            ));
        }
        Err(e) => return Err(ProxyError::MalformedResponse(e.to_string())),
    };

    let code = parsed
        .code
        .ok_or_else(|| ProxyError::MalformedResponse("missing status code".to_string()))?;
    let status = StatusCode::from_u16(code)
        .map_err(|e| ProxyError::MalformedResponse(format!("status {}: {}", code, e)))?;
    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut headers = HeaderMap::with_capacity(parsed.headers.len());
    for h in parsed.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|e| ProxyError::MalformedResponse(format!("header {}: {}", h.name, e)))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|e| ProxyError::MalformedResponse(format!("header {}: {}", h.name, e)))?;
        headers.append(name, value);
    }

    let available = raw.len() - header_len;
    let body_len = match headers.get(header::CONTENT_LENGTH) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .ok_or_else(|| ProxyError::MalformedResponse("invalid content-length".to_string()))?,
        None => available,
    };

    if body_len > available {
        return Err(ProxyError::MalformedResponse(format!(
            "body truncated: expected {} bytes, found {}",
            body_len, available
        )));
    }

    let body = raw.slice(header_len..header_len + body_len);

    Ok(UpstreamResponse {
        status,
        version,
        headers,
        body,
    })
}
