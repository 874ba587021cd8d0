use crate::classify;
use crate::config::EngineConfig;
use crate::error::{ReconError, Result};
use crate::http::{self, ProbeTarget};
use crate::liveness::{PingProber, Reachability};
use crate::ports;
use crate::report::{self, HttpReport, ScanReport};
use crate::resolve;
use crate::scanner::{self, PortConnector, TcpConnector};
use crate::types::{HttpProbeRun, PortRange, PortScanRun, Target};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs port scans and HTTP verb probes against a single host.
///
/// Liveness checks and TCP connects go through swappable capabilities so
/// the control flow can be exercised without touching the network.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    reachability: Arc<dyn Reachability>,
    connector: Arc<dyn PortConnector>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            reachability: Arc::new(PingProber),
            connector: Arc::new(TcpConnector),
        }
    }

    pub fn with_reachability(mut self, reachability: Arc<dyn Reachability>) -> Self {
        self.reachability = reachability;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn PortConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve `host`, check it is up, then scan `range` one port at a time.
    ///
    /// Returns `ReconError::Unreachable` without scanning when the liveness
    /// probe fails. A cancelled scan returns its partial results with
    /// `interrupted` set and writes no report.
    pub async fn run_port_scan(
        &self,
        host: &str,
        range: PortRange,
        cancel: &CancellationToken,
        log: &mut (dyn FnMut(&str) + Send),
    ) -> Result<PortScanRun> {
        if range.start == 0 || range.start > range.end {
            return Err(ReconError::Validation(format!("invalid port range {range}")));
        }
        let ip = resolve::resolve_host(host).await?;
        let target = Target {
            host: host.trim().to_string(),
            resolved_address: ip,
            port: None,
            path: String::new(),
        };

        log(&format!("[*] Checking whether host {ip} is up..."));
        if !self
            .reachability
            .check_reachable(ip, self.config.liveness_timeout)
            .await
        {
            log(&format!(
                "[!] Host {ip} is unreachable (down or blocking ping); scan aborted."
            ));
            return Err(ReconError::Unreachable(ip));
        }
        log("[*] Host is up, starting scan.");
        log(&format!("[*] Scanning ports {range}"));
        info!(host = %target.host, %ip, %range, "port scan started");

        let outcome = scanner::scan_range(
            self.connector.as_ref(),
            ip,
            range,
            self.config.port_timeout,
            cancel,
            log,
        )
        .await;

        let open_count = outcome.open_count();
        if outcome.interrupted {
            log(&format!(
                "[!] Scan interrupted by user: {} ports scanned, {open_count} open.",
                outcome.results.len()
            ));
            return Ok(PortScanRun {
                target,
                range,
                results: outcome.results,
                interrupted: true,
                report_path: None,
            });
        }

        if open_count == 0 {
            log("[*] Scan complete: no open ports found.");
        } else {
            log(&format!("[*] Scan complete: {open_count} open port(s) found."));
        }

        let report = ScanReport {
            target: &target,
            range,
            generated_at: report::now(),
            results: &outcome.results,
        };
        let report_path = report::write_report(
            &self.config.report_dir,
            &report.file_name(),
            &report.to_string(),
        )
        .inspect_err(|e| warn!(error = %e, "failed to write scan report"))?;
        log(&format!("Saved report: {}", report_path.display()));

        Ok(PortScanRun {
            target,
            range,
            results: outcome.results,
            interrupted: false,
            report_path: Some(report_path),
        })
    }

    /// Probe `host:port/path` with every configured verb and write a report.
    ///
    /// Liveness is not consulted. Per-verb failures end up in the results;
    /// only resolution, validation and report I/O errors are returned.
    pub async fn run_http_probe(
        &self,
        host: &str,
        port: u16,
        path: &str,
        log: &mut (dyn FnMut(&str) + Send),
    ) -> Result<HttpProbeRun> {
        if port == 0 {
            return Err(ReconError::Validation("port must be between 1 and 65535".into()));
        }
        let path = http::normalize_path(path)?;
        let ip = resolve::resolve_host(host).await?;
        let target = Target {
            host: host.trim().to_string(),
            resolved_address: ip,
            port: Some(port),
            path,
        };

        log(&format!("Target: {}:{}  Path: {}", target.host, port, target.path));
        let verbs: Vec<&str> = self.config.verbs.iter().map(|m| m.as_str()).collect();
        log(&format!("Testing verbs: {}", verbs.join(", ")));
        log("");
        info!(host = %target.host, %ip, port, path = %target.path, "verb probe started");

        let probe_target = ProbeTarget {
            host: &target.host,
            address: ip,
            port,
            path: &target.path,
        };
        let results = http::probe_verbs(&probe_target, &self.config, log).await;
        let summary = classify::summarize(&results);

        let report = HttpReport {
            target: &target,
            generated_at: report::now(),
            results: &results,
            summary: &summary,
            body_preview_chars: self.config.body_preview_chars,
        };
        let report_path = report::write_report(
            &self.config.report_dir,
            &report.file_name(),
            &report.to_string(),
        )
        .inspect_err(|e| warn!(error = %e, "failed to write probe report"))?;

        log("");
        log("Scan done.");
        log(&format!("Saved report: {}", report_path.display()));

        Ok(HttpProbeRun {
            target,
            results,
            summary,
            report_path,
        })
    }

    /// Parse a CLI-style port specification and run a scan.
    pub async fn run_port_scan_spec(
        &self,
        host: &str,
        ports_spec: &str,
        cancel: &CancellationToken,
        log: &mut (dyn FnMut(&str) + Send),
    ) -> Result<PortScanRun> {
        let range = ports::parse_port_range(ports_spec)?;
        self.run_port_scan(host, range, cancel, log).await
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
