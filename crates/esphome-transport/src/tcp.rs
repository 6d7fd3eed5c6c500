use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Result, TransportError};

/// Default TCP port of the native API.
pub const DEFAULT_PORT: u16 = 6053;

/// Default bound for host name resolution.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(500);

/// Default bound for a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Resolve `host:port` into socket addresses.
///
/// The lookup races a timer; when the timer wins the lookup future is
/// dropped and [`TransportError::Timeout`] is returned.
pub async fn resolve(host: &str, port: u16, timeout: Duration) -> Result<Vec<SocketAddr>> {
    let lookup = tokio::net::lookup_host((host, port));
    let addrs = match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(addrs)) => addrs.collect::<Vec<_>>(),
        Ok(Err(source)) => {
            return Err(TransportError::Resolve {
                host: host.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(TransportError::Timeout {
                operation: "resolve",
                after: timeout,
            })
        }
    };

    if addrs.is_empty() {
        return Err(TransportError::NoAddresses {
            host: host.to_string(),
        });
    }

    debug!(host, port, count = addrs.len(), "resolved host");
    Ok(addrs)
}

/// Connect to the first reachable address.
///
/// Each attempt is bounded by `timeout`. The error of the last failed
/// attempt is returned when none succeed.
pub async fn connect(addrs: &[SocketAddr], timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;

    for &addr in addrs {
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                debug!(%addr, "connected");
                return Ok(stream);
            }
            Ok(Err(source)) => {
                debug!(%addr, error = %source, "connect attempt failed");
                last_err = Some(TransportError::Connect { addr, source });
            }
            Err(_) => {
                debug!(%addr, ?timeout, "connect attempt timed out");
                last_err = Some(TransportError::Timeout {
                    operation: "connect",
                    after: timeout,
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| TransportError::NoAddresses {
        host: "<empty address list>".to_string(),
    }))
}
