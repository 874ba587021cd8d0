//! HTTP verb prober.
//!
//! Each verb gets its own connection carrying `Connection: close`; nothing
//! is shared between requests. Requests are written and responses parsed
//! directly on the socket so the status line, reason phrase and header
//! casing come back exactly as the server sent them.

use crate::config::EngineConfig;
use crate::error::{ReconError, Result};
use crate::types::{Headers, Method, VerbProbeResult};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

/// Where to send verb probes.
#[derive(Debug, Clone)]
pub struct ProbeTarget<'a> {
    pub host: &'a str,
    pub address: IpAddr,
    pub port: u16,
    pub path: &'a str,
}

/// Parsed response before it is folded into a `VerbProbeResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub http_version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Ensure `path` starts with `/`; empty input becomes `/`.
///
/// Control characters, spaces and DEL are rejected since the path goes
/// verbatim into the request line.
pub fn normalize_path(path: &str) -> Result<String> {
    let p = path.trim();
    if let Some(bad) = p.chars().find(|&c| c <= '\x20' || c == '\x7f') {
        return Err(ReconError::Validation(format!(
            "path {p:?} contains invalid character {bad:?}"
        )));
    }
    Ok(if p.is_empty() {
        "/".to_string()
    } else if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{p}")
    })
}

/// Map a protocol token such as `HTTP/1.1` to `1.1`.
pub fn map_http_version(token: &str) -> String {
    match token {
        "HTTP/0.9" => "0.9".into(),
        "HTTP/1.0" => "1.0".into(),
        "HTTP/1.1" => "1.1".into(),
        other => other.strip_prefix("HTTP/").unwrap_or(other).to_string(),
    }
}

/// Serialize one request. Body-bearing verbs get a small JSON payload
/// stamped with `unix_secs`.
pub fn build_request(
    method: Method,
    host: &str,
    path: &str,
    user_agent: &str,
    unix_secs: u64,
) -> Vec<u8> {
    let mut head = format!(
        "{method} {path} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: {user_agent}\r\nAccept: */*\r\nConnection: close\r\n"
    );

    let body = if method.carries_body() {
        let body = serde_json::json!({ "test": "recon-scan-rs", "ts": unix_secs }).to_string();
        head.push_str("Content-Type: application/json; charset=utf-8\r\n");
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        Some(body)
    } else {
        None
    };
    head.push_str("\r\n");

    let mut out = head.into_bytes();
    if let Some(body) = body {
        out.extend_from_slice(body.as_bytes());
    }
    out
}

/// Probe every verb in `config.verbs` in order.
///
/// A failing verb is recorded as `VerbProbeResult::Failure` and the loop
/// moves on; the returned vector always has one entry per verb.
pub async fn probe_verbs(
    target: &ProbeTarget<'_>,
    config: &EngineConfig,
    log: &mut (dyn FnMut(&str) + Send),
) -> Vec<VerbProbeResult> {
    let mut results = Vec::with_capacity(config.verbs.len());

    for &method in &config.verbs {
        log(&format!("-> {method} {}", target.path));
        let result = match probe_verb(target, method, config).await {
            Ok(resp) => {
                let allow = resp.headers.get("Allow").unwrap_or("-");
                let location = resp.headers.get("Location").unwrap_or("-");
                log(&format!(
                    "   {} {}  Allow={allow}  Location={location}  BodyLen={}",
                    resp.status,
                    resp.reason,
                    resp.body.len()
                ));
                into_success(method, resp, config.body_preview_chars)
            }
            Err(e) => {
                log(&format!("   ERROR: {e}"));
                VerbProbeResult::Failure {
                    method,
                    error: e.to_string(),
                }
            }
        };
        results.push(result);
    }

    results
}

/// Send one request and parse the response, bounded by `config.http_timeout`.
pub async fn probe_verb(
    target: &ProbeTarget<'_>,
    method: Method,
    config: &EngineConfig,
) -> Result<RawResponse> {
    let request = build_request(
        method,
        target.host,
        target.path,
        &config.user_agent,
        unix_now(),
    );
    let timeout = config.http_timeout;

    match time::timeout(timeout, send_request(target, &request, method, config.tls)).await {
        Ok(res) => res,
        Err(_) => Err(ReconError::Transport(format!(
            "timed out after {}",
            fmt_duration(timeout)
        ))),
    }
}

async fn send_request(
    target: &ProbeTarget<'_>,
    request: &[u8],
    method: Method,
    tls: bool,
) -> Result<RawResponse> {
    let addr = SocketAddr::new(target.address, target.port);
    let mut tcp = TcpStream::connect(addr)
        .await
        .map_err(|e| ReconError::Transport(format!("connect to {addr} failed: {e}")))?;

    if !tls {
        return exchange(&mut tcp, request, method).await;
    }

    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| ReconError::Transport(format!("TLS setup failed: {e}")))?;
    let mut stream = tokio_native_tls::TlsConnector::from(connector)
        .connect(target.host, tcp)
        .await
        .map_err(|e| ReconError::Transport(format!("TLS handshake failed: {e}")))?;
    exchange(&mut stream, request, method).await
}

async fn exchange<S>(stream: &mut S, request: &[u8], method: Method) -> Result<RawResponse>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(request).await?;
    stream.flush().await?;

    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if response_complete(&buf, method) {
            break;
        }
    }
    if let Err(e) = stream.shutdown().await {
        debug!(%method, error = %e, "shutdown after response failed");
    }
    debug!(%method, bytes = buf.len(), "response read");

    parse_response(&buf, method)
}

/// Parse a full HTTP/1.x response held in `raw`.
pub fn parse_response(raw: &[u8], method: Method) -> Result<RawResponse> {
    let raw = skip_interim(raw);
    if raw.is_empty() {
        return Err(ReconError::Transport(
            "connection closed without a response".into(),
        ));
    }
    let (head_end, body_start) = find_head_end(raw).ok_or_else(|| {
        ReconError::Transport("malformed response: incomplete header block".into())
    })?;

    let head = String::from_utf8_lossy(&raw[..head_end]);
    let mut lines = head.lines();
    let status_line = lines.next().unwrap_or_default();

    let mut parts = status_line.splitn(3, ' ');
    let version_token = parts.next().unwrap_or_default();
    if !version_token.starts_with("HTTP/") {
        return Err(ReconError::Transport(format!(
            "malformed status line: {status_line:?}"
        )));
    }
    let status = parts
        .next()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .ok_or_else(|| ReconError::Transport(format!("malformed status line: {status_line:?}")))?;
    let reason = parts.next().unwrap_or_default().trim().to_string();

    let mut headers = Headers::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim(), value.trim());
        }
    }

    let rest = &raw[body_start..];
    let body = match framing(&headers, status, method) {
        Framing::None => Vec::new(),
        Framing::Chunked => decode_chunked(rest).0,
        Framing::Length(n) => rest[..n.min(rest.len())].to_vec(),
        Framing::UntilClose => rest.to_vec(),
    };

    Ok(RawResponse {
        http_version: map_http_version(version_token),
        status,
        reason,
        headers,
        body,
    })
}

fn into_success(method: Method, resp: RawResponse, preview_chars: usize) -> VerbProbeResult {
    let text = String::from_utf8_lossy(&resp.body);
    VerbProbeResult::Success {
        method,
        status: resp.status,
        reason: resp.reason,
        http_version: resp.http_version,
        headers: resp.headers,
        body_len: resp.body.len(),
        body_preview: text.chars().take(preview_chars).collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    None,
    Chunked,
    Length(usize),
    UntilClose,
}

fn framing(headers: &Headers, status: u16, method: Method) -> Framing {
    if method == Method::Head || (100..200).contains(&status) || status == 204 || status == 304 {
        return Framing::None;
    }
    if headers
        .get("Transfer-Encoding")
        .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"))
    {
        return Framing::Chunked;
    }
    match headers
        .get("Content-Length")
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        Some(n) => Framing::Length(n),
        None => Framing::UntilClose,
    }
}

/// True once `buf` holds a complete response, so a server that ignores
/// `Connection: close` does not stall the probe until the timeout.
fn response_complete(buf: &[u8], method: Method) -> bool {
    let buf = skip_interim(buf);
    let Some((head_end, body_start)) = find_head_end(buf) else {
        return false;
    };
    let head = String::from_utf8_lossy(&buf[..head_end]);
    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|l| l.split(' ').nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);
    let headers: Headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();

    let rest = &buf[body_start..];
    match framing(&headers, status, method) {
        Framing::None => true,
        Framing::Chunked => decode_chunked(rest).1,
        Framing::Length(n) => rest.len() >= n,
        Framing::UntilClose => false,
    }
}

/// Drop any complete `1xx` interim responses ahead of the final one.
fn skip_interim(mut buf: &[u8]) -> &[u8] {
    while buf.starts_with(b"HTTP/") {
        let Some((_, body_start)) = find_head_end(buf) else {
            break;
        };
        let is_interim = buf
            .split(|b| *b == b' ')
            .nth(1)
            .is_some_and(|code| code.len() == 3 && code[0] == b'1');
        if !is_interim {
            break;
        }
        buf = &buf[body_start..];
    }
    buf
}

/// Returns (end of header block, start of body). Whichever of `\r\n\r\n`
/// and a bare `\n\n` comes first ends the head.
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| (pos, pos + 4));
    let lf = buf
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

/// Decode a chunked body. Returns the decoded bytes and whether the
/// terminating zero-size chunk was seen.
fn decode_chunked(mut rest: &[u8]) -> (Vec<u8>, bool) {
    let mut out = Vec::new();
    loop {
        let Some(line_end) = rest.windows(2).position(|w| w == b"\r\n") else {
            return (out, false);
        };
        let size_line = String::from_utf8_lossy(&rest[..line_end]);
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let Ok(size) = usize::from_str_radix(size_hex, 16) else {
            return (out, false);
        };
        rest = &rest[line_end + 2..];
        if size == 0 {
            return (out, true);
        }
        if rest.len() < size {
            out.extend_from_slice(rest);
            return (out, false);
        }
        out.extend_from_slice(&rest[..size]);
        rest = rest.get(size + 2..).unwrap_or_default();
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn fmt_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_gets_leading_slash() {
        assert_eq!(normalize_path("dvwa/").unwrap(), "/dvwa/");
        assert_eq!(normalize_path("/index.php").unwrap(), "/index.php");
        assert_eq!(normalize_path("  ").unwrap(), "/");
    }

    #[test]
    fn path_with_whitespace_or_control_chars_is_rejected() {
        for bad in ["/a b\r\nX-Injected: yes", "/a\tb", "/x\0", "/del\x7f", "a b"] {
            assert!(
                matches!(normalize_path(bad), Err(ReconError::Validation(_))),
                "{bad:?} accepted"
            );
        }
        assert_eq!(normalize_path("/a%20b?q=1").unwrap(), "/a%20b?q=1");
    }

    #[test]
    fn version_tokens_map_to_short_form() {
        assert_eq!(map_http_version("HTTP/1.1"), "1.1");
        assert_eq!(map_http_version("HTTP/1.0"), "1.0");
        assert_eq!(map_http_version("HTTP/0.9"), "0.9");
        assert_eq!(map_http_version("HTTP/2"), "2");
    }

    #[test]
    fn get_request_has_fixed_headers_and_no_body() {
        let req = String::from_utf8(build_request(Method::Get, "lab", "/", "ua/1", 7)).unwrap();
        assert!(req.starts_with("GET / HTTP/1.1\r\n"));
        assert!(req.contains("Host: lab\r\n"));
        assert!(req.contains("User-Agent: ua/1\r\n"));
        assert!(req.contains("Accept: */*\r\n"));
        assert!(req.contains("Connection: close\r\n"));
        assert!(!req.contains("Content-Length"));
        assert!(req.ends_with("\r\n\r\n"));
    }

    #[test]
    fn post_request_carries_json_with_matching_length() {
        let req = String::from_utf8(build_request(Method::Post, "lab", "/x", "ua/1", 42)).unwrap();
        let (head, body) = req.split_once("\r\n\r\n").unwrap();
        assert!(head.contains("Content-Type: application/json; charset=utf-8"));
        assert!(head.contains(&format!("Content-Length: {}", body.len())));
        let v: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(v["ts"], 42);
    }

    #[test]
    fn parses_status_line_headers_and_sized_body() {
        let raw = b"HTTP/1.1 405 Method Not Allowed\r\nallow: GET, POST\r\nContent-Length: 5\r\n\r\nhelloEXTRA";
        let resp = parse_response(raw, Method::Put).unwrap();
        assert_eq!(resp.http_version, "1.1");
        assert_eq!(resp.status, 405);
        assert_eq!(resp.reason, "Method Not Allowed");
        assert_eq!(resp.headers.get("Allow"), Some("GET, POST"));
        assert_eq!(resp.body, b"hello");
    }

    #[test]
    fn bare_lf_head_ends_before_crlf_in_body() {
        let raw = b"HTTP/1.0 200 OK\nContent-Length: 6\n\nab\r\n\r\n";
        assert!(response_complete(raw, Method::Get));
        let resp = parse_response(raw, Method::Get).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.headers.len(), 1);
        assert_eq!(resp.body, b"ab\r\n\r\n");
    }

    #[test]
    fn crlf_head_ends_before_bare_lf_in_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\na\n\nb";
        let resp = parse_response(raw, Method::Get).unwrap();
        assert_eq!(resp.headers.get("Content-Length"), Some("4"));
        assert_eq!(resp.body, b"a\n\nb");
    }

    #[test]
    fn chunked_body_is_decoded() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5;x=1\r\npedia\r\n0\r\n\r\n";
        assert!(response_complete(raw, Method::Get));
        let resp = parse_response(raw, Method::Get).unwrap();
        assert_eq!(resp.body, b"Wikipedia");
    }

    #[test]
    fn head_response_has_no_body() {
        let raw = b"HTTP/1.0 200 OK\r\nContent-Length: 120\r\n\r\n";
        assert!(response_complete(raw, Method::Head));
        let resp = parse_response(raw, Method::Head).unwrap();
        assert_eq!(resp.http_version, "1.0");
        assert!(resp.body.is_empty());
    }

    #[test]
    fn interim_continue_is_skipped() {
        let raw = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok";
        assert!(response_complete(raw, Method::Post));
        let resp = parse_response(raw, Method::Post).unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body, b"ok");
        assert!(!response_complete(b"HTTP/1.1 100 Continue\r\n\r\n", Method::Post));
    }

    #[test]
    fn garbage_and_empty_responses_are_transport_errors() {
        assert!(matches!(
            parse_response(b"", Method::Get),
            Err(ReconError::Transport(_))
        ));
        assert!(matches!(
            parse_response(b"SSH-2.0-OpenSSH\r\n\r\n", Method::Get),
            Err(ReconError::Transport(_))
        ));
    }

    #[test]
    fn preview_is_cut_by_characters() {
        let resp = RawResponse {
            http_version: "1.1".into(),
            status: 200,
            reason: "OK".into(),
            headers: Headers::new(),
            body: "héllo wörld".as_bytes().to_vec(),
        };
        match into_success(Method::Get, resp, 4) {
            VerbProbeResult::Success {
                body_len,
                body_preview,
                ..
            } => {
                assert_eq!(body_preview, "héll");
                assert_eq!(body_len, "héllo wörld".len());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
