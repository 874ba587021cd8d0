use crate::types::{PortProbeResult, PortRange};
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Opens (and immediately drops) a TCP connection.
#[async_trait]
pub trait PortConnector: Send + Sync {
    async fn connect(&self, addr: SocketAddr, timeout: Duration) -> io::Result<()>;
}

/// Plain TCP connect bounded by `tokio::time::timeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl PortConnector for TcpConnector {
    async fn connect(&self, addr: SocketAddr, timeout: Duration) -> io::Result<()> {
        match time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {addr} timed out"),
            )),
        }
    }
}

/// Ports scanned so far and whether the loop was cancelled before the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub results: Vec<PortProbeResult>,
    pub interrupted: bool,
}

impl ScanOutcome {
    pub fn open_count(&self) -> usize {
        self.results.iter().filter(|r| r.open).count()
    }
}

/// Scan `range` on `ip` one port at a time, in ascending order.
///
/// - Each attempt is bounded by `timeout`.
/// - Refused and timed-out connects are closed ports; any other socket error
///   is reported through `log` and the port is also recorded as closed.
/// - `cancel` is checked before each port. When it fires the loop stops and
///   the results gathered so far are returned with `interrupted` set.
pub async fn scan_range(
    connector: &dyn PortConnector,
    ip: IpAddr,
    range: PortRange,
    timeout: Duration,
    cancel: &CancellationToken,
    log: &mut (dyn FnMut(&str) + Send),
) -> ScanOutcome {
    let mut outcome = ScanOutcome {
        results: Vec::with_capacity(range.len()),
        interrupted: false,
    };

    for port in range.iter() {
        if cancel.is_cancelled() {
            outcome.interrupted = true;
            break;
        }

        let addr = SocketAddr::new(ip, port);
        let open = match connector.connect(addr, timeout).await {
            Ok(()) => true,
            Err(e) if is_clean_refusal(&e) => {
                debug!(%addr, error = %e, "port closed");
                false
            }
            Err(e) => {
                warn!(%addr, error = %e, "transient socket error");
                log(&format!("[!] Port {port}: connection error ({e})"));
                false
            }
        };

        if open {
            log(&format!("[+] Port {port} OPEN"));
        }
        outcome.results.push(PortProbeResult { port, open });
    }

    outcome
}

fn is_clean_refusal(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OnlyOpen(u16);

    #[async_trait]
    impl PortConnector for OnlyOpen {
        async fn connect(&self, addr: SocketAddr, _timeout: Duration) -> io::Result<()> {
            if addr.port() == self.0 {
                Ok(())
            } else {
                Err(io::ErrorKind::ConnectionRefused.into())
            }
        }
    }

    /// Cancels the token once `after` connects have been attempted.
    struct CancelAfter {
        after: usize,
        seen: AtomicUsize,
        token: CancellationToken,
    }

    #[async_trait]
    impl PortConnector for CancelAfter {
        async fn connect(&self, _addr: SocketAddr, _timeout: Duration) -> io::Result<()> {
            if self.seen.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
                self.token.cancel();
            }
            Ok(())
        }
    }

    struct Flaky;

    #[async_trait]
    impl PortConnector for Flaky {
        async fn connect(&self, addr: SocketAddr, _timeout: Duration) -> io::Result<()> {
            if addr.port() == 2 {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            } else {
                Ok(())
            }
        }
    }

    const LOCAL: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn results_are_ascending_with_only_accepting_ports_open() {
        let mut lines = Vec::new();
        let outcome = scan_range(
            &OnlyOpen(22),
            LOCAL,
            PortRange { start: 20, end: 25 },
            Duration::from_millis(10),
            &CancellationToken::new(),
            &mut |l: &str| lines.push(l.to_string()),
        )
        .await;

        let ports: Vec<u16> = outcome.results.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![20, 21, 22, 23, 24, 25]);
        assert_eq!(crate::types::open_ports(&outcome.results), vec![22]);
        assert!(!outcome.interrupted);
        assert_eq!(lines, vec!["[+] Port 22 OPEN".to_string()]);
    }

    #[tokio::test]
    async fn cancellation_keeps_partial_results() {
        let token = CancellationToken::new();
        let connector = CancelAfter {
            after: 3,
            seen: AtomicUsize::new(0),
            token: token.clone(),
        };
        let outcome = scan_range(
            &connector,
            LOCAL,
            PortRange { start: 1, end: 100 },
            Duration::from_millis(10),
            &token,
            &mut |_: &str| {},
        )
        .await;

        assert!(outcome.interrupted);
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.open_count(), 3);
    }

    #[tokio::test]
    async fn unexpected_error_marks_port_closed_and_continues() {
        let mut lines = Vec::new();
        let outcome = scan_range(
            &Flaky,
            LOCAL,
            PortRange { start: 1, end: 3 },
            Duration::from_millis(10),
            &CancellationToken::new(),
            &mut |l: &str| lines.push(l.to_string()),
        )
        .await;

        assert_eq!(crate::types::open_ports(&outcome.results), vec![1, 3]);
        assert_eq!(outcome.results.len(), 3);
        assert!(lines.iter().any(|l| l.contains("Port 2: connection error")));
    }

    #[tokio::test]
    async fn real_listener_is_detected_open() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let outcome = scan_range(
            &TcpConnector,
            LOCAL,
            PortRange { start: port, end: port },
            Duration::from_millis(500),
            &CancellationToken::new(),
            &mut |_: &str| {},
        )
        .await;
        assert_eq!(outcome.results, vec![PortProbeResult { port, open: true }]);
    }
}
