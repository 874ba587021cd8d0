use crate::types::Method;
use std::path::PathBuf;
use std::time::Duration;

/// Settings handed to the engine at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Verbs probed, in order.
    pub verbs: Vec<Method>,

    /// Timeout for each TCP connect attempt during a port scan.
    pub port_timeout: Duration,

    /// Timeout for the single liveness probe.
    pub liveness_timeout: Duration,

    /// Timeout for one whole HTTP exchange (connect, send, read).
    pub http_timeout: Duration,

    /// Number of body characters kept in a verb result.
    pub body_preview_chars: usize,

    pub user_agent: String,

    /// Directory reports are written into.
    pub report_dir: PathBuf,

    /// Probe over HTTPS instead of plain HTTP.
    pub tls: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbs: Method::ALL.to_vec(),
            port_timeout: Duration::from_millis(300),
            liveness_timeout: Duration::from_secs(1),
            http_timeout: Duration::from_secs(8),
            body_preview_chars: 1200,
            user_agent: concat!("recon-scan-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            report_dir: PathBuf::from("."),
            tls: false,
        }
    }
}
