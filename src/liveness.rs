use async_trait::async_trait;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;
use tracing::debug;

/// A single reachability check against an address.
///
/// Implementations never error: anything ambiguous counts as unreachable.
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn check_reachable(&self, addr: IpAddr, timeout: Duration) -> bool;
}

/// Sends one ICMP echo through the system `ping` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingProber;

#[async_trait]
impl Reachability for PingProber {
    async fn check_reachable(&self, addr: IpAddr, timeout: Duration) -> bool {
        // `-W` takes whole seconds on Linux.
        let wait_secs = timeout.as_secs_f64().ceil().max(1.0) as u64;
        let mut cmd = Command::new("ping");
        cmd.arg("-c")
            .arg("1")
            .arg("-W")
            .arg(wait_secs.to_string())
            .arg(addr.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Grace period on top of ping's own wait for process start-up.
        let deadline = Duration::from_secs(wait_secs) + Duration::from_secs(1);
        match time::timeout(deadline, cmd.status()).await {
            Ok(Ok(status)) => {
                debug!(%addr, code = ?status.code(), "ping finished");
                status.success()
            }
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "ping could not be started");
                false
            }
            Err(_) => {
                debug!(%addr, "ping did not finish in time");
                false
            }
        }
    }
}
