use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

/// HTTP methods probed by the verb prober.
///
/// Declaration order is the probe order; `Ord` follows it, so sorted
/// collections of methods come out in probe order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Options,
    Get,
    Post,
    Head,
    Put,
    Delete,
    Patch,
}

impl Method {
    /// Every probed method, in probe order.
    pub const ALL: [Method; 7] = [
        Method::Options,
        Method::Get,
        Method::Post,
        Method::Head,
        Method::Put,
        Method::Delete,
        Method::Patch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }

    /// Methods that get a small JSON body attached.
    pub fn carries_body(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response headers in arrival order with their original casing.
///
/// Setting a name that is already present (exact match) replaces the value
/// in place. Lookups ignore ASCII case.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Case-insensitive lookup of the first header named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// The host under test, fixed for the duration of one run.
///
/// `port` is only set for HTTP probing; a scan covers a whole range and
/// keeps it in `PortScanRun::range` instead.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub resolved_address: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub path: String,
}

/// Inclusive TCP port range.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            usize::from(self.end) - usize::from(self.start) + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Outcome of one TCP connect attempt.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortProbeResult {
    pub port: u16,
    pub open: bool,
}

/// Outcome of one HTTP verb probe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerbProbeResult {
    Success {
        method: Method,
        status: u16,
        reason: String,
        http_version: String,
        headers: Headers,
        body_len: usize,
        body_preview: String,
    },
    Failure {
        method: Method,
        error: String,
    },
}

impl VerbProbeResult {
    pub fn method(&self) -> Method {
        match self {
            VerbProbeResult::Success { method, .. } | VerbProbeResult::Failure { method, .. } => {
                *method
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VerbProbeResult::Success { .. })
    }
}

/// Derived view over a set of verb probe results.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationSummary {
    pub allow_union: BTreeSet<String>,
    pub supported_verbs: Vec<Method>,
}

/// Result of a port scan run. `interrupted` marks a partial result.
#[derive(Serialize, Debug, Clone)]
pub struct PortScanRun {
    pub target: Target,
    pub range: PortRange,
    pub results: Vec<PortProbeResult>,
    pub interrupted: bool,
    pub report_path: Option<PathBuf>,
}

impl PortScanRun {
    pub fn open_ports(&self) -> Vec<u16> {
        open_ports(&self.results)
    }
}

/// Result of an HTTP verb probe run.
#[derive(Serialize, Debug, Clone)]
pub struct HttpProbeRun {
    pub target: Target,
    pub results: Vec<VerbProbeResult>,
    pub summary: ClassificationSummary,
    pub report_path: PathBuf,
}

/// Ports that accepted a connection, in scan order.
pub fn open_ports(results: &[PortProbeResult]) -> Vec<u16> {
    results.iter().filter(|r| r.open).map(|r| r.port).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case_and_keeps_order() {
        let headers: Headers = [("Server", "nginx"), ("allow", "GET"), ("X-Trace", "1")]
            .into_iter()
            .collect();
        assert_eq!(headers.get("ALLOW"), Some("GET"));
        assert_eq!(headers.get("location"), None);
        let names: Vec<_> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Server", "allow", "X-Trace"]);
    }

    #[test]
    fn repeated_header_replaces_in_place() {
        let mut headers = Headers::new();
        headers.insert("Set-Cookie", "a=1");
        headers.insert("Server", "x");
        headers.insert("Set-Cookie", "b=2");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.iter().next(), Some(("Set-Cookie", "b=2")));
    }

    #[test]
    fn method_order_matches_probe_order() {
        let mut shuffled = vec![Method::Patch, Method::Get, Method::Options, Method::Head];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Method::Options, Method::Get, Method::Head, Method::Patch]
        );
        assert!(Method::Put.carries_body());
        assert!(!Method::Head.carries_body());
    }

    #[test]
    fn port_range_len_is_inclusive() {
        let r = PortRange { start: 20, end: 25 };
        assert_eq!(r.len(), 6);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![20, 21, 22, 23, 24, 25]);
        assert_eq!(r.to_string(), "20-25");
    }
}
