use crate::error::{ReconError, Result};
use crate::types::PortRange;

/// Parse a port specification into an inclusive range.
///
/// Supported formats:
/// - single port number: `80` (a one-port range)
/// - inclusive range: `20-25`
/// - surrounding whitespace is ignored
pub fn parse_port_range(s: &str) -> Result<PortRange> {
    let spec = s.trim();
    if spec.is_empty() {
        return Err(ReconError::Validation("empty port specification".into()));
    }

    if let Some((a, b)) = spec.split_once('-') {
        let start = parse_port(a.trim())
            .map_err(|e| ReconError::Validation(format!("invalid start in range '{spec}': {e}")))?;
        let end = parse_port(b.trim())
            .map_err(|e| ReconError::Validation(format!("invalid end in range '{spec}': {e}")))?;
        if start > end {
            return Err(ReconError::Validation(format!(
                "invalid range {start}-{end} (start > end)"
            )));
        }
        return Ok(PortRange { start, end });
    }

    let p = parse_port(spec)?;
    Ok(PortRange { start: p, end: p })
}

/// Parse one TCP port number (1..=65535).
pub fn parse_port(s: &str) -> Result<u16> {
    let val: u32 = s
        .trim()
        .parse::<u32>()
        .map_err(|e| ReconError::Validation(format!("'{s}' is not a port number: {e}")))?;
    if val == 0 || val > 65535 {
        return Err(ReconError::Validation(format!("port out of range: {val}")));
    }
    Ok(val as u16)
}
