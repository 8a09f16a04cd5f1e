//! Bounded-timeout reachability check for a host/port pair

use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

/// Default per-address connect timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Returns true if something accepts TCP connections at `(host, port)`.
///
/// Every resolved address is tried in turn, each bounded by `limit`.
/// Resolution failures, refusals and timeouts all mean "not running".
pub async fn probe(host: &str, port: u16, limit: Duration) -> bool {
    let addrs = match lookup_host((host, port)).await {
        Ok(addrs) => addrs.collect::<Vec<_>>(),
        Err(e) => {
            debug!("probe: could not resolve {}: {}", host, e);
            return false;
        }
    };

    for addr in addrs {
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => {
                debug!("probe: {} is accepting connections", addr);
                return true;
            }
            Ok(Err(e)) => debug!("probe: {} refused: {}", addr, e),
            Err(_) => debug!("probe: {} timed out after {:?}", addr, limit),
        }
    }

    false
}
