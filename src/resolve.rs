use crate::error::{ReconError, Result};
use std::net::IpAddr;
use tracing::debug;

/// Resolve a hostname or IP literal to a single address.
///
/// One attempt only. IP literals are returned as-is; names go through the
/// system resolver and the first address wins.
pub async fn resolve_host(host: &str) -> Result<IpAddr> {
    let host = validate_host(host)?;

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| ReconError::Resolution {
            host: host.to_string(),
            reason: e.to_string(),
        })?;

    let addr = addrs.next().ok_or_else(|| ReconError::Resolution {
        host: host.to_string(),
        reason: "no addresses returned".into(),
    })?;
    debug!(host, ip = %addr.ip(), "resolved host");
    Ok(addr.ip())
}

/// Trim and reject empty or obviously malformed host input.
pub fn validate_host(host: &str) -> Result<&str> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ReconError::Validation("host cannot be empty".into()));
    }
    if host.chars().any(char::is_whitespace) {
        return Err(ReconError::Validation(format!(
            "host '{host}' contains whitespace"
        )));
    }
    Ok(host)
}
