#![allow(dead_code)]

use async_trait::async_trait;
use recon_scan_rs::liveness::Reachability;
use recon_scan_rs::scanner::PortConnector;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Fresh, not-yet-created directory under the system temp dir.
pub fn temp_report_dir(tag: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!(
        "recon-scan-rs-{tag}-{}-{nanos}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ))
}

pub fn report_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

pub struct FixedReachability(pub bool);

#[async_trait]
impl Reachability for FixedReachability {
    async fn check_reachable(&self, _addr: IpAddr, _timeout: Duration) -> bool {
        self.0
    }
}

/// Accepts only the listed ports and counts every attempt.
#[derive(Default)]
pub struct FakeConnector {
    pub open: Vec<u16>,
    pub attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn with_open(open: &[u16]) -> Self {
        Self {
            open: open.to_vec(),
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PortConnector for FakeConnector {
    async fn connect(&self, addr: SocketAddr, _timeout: Duration) -> io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.open.contains(&addr.port()) {
            Ok(())
        } else {
            Err(io::ErrorKind::ConnectionRefused.into())
        }
    }
}
