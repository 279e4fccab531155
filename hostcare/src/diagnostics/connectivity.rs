//! Connectivity probe.
//!
//! The probe result is advisory only: stages that need the network are run
//! regardless and handle failures themselves.

use crate::logging::RunLogger;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

/// Answers whether a network target can be reached.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true if `target` (`host:port`) answered within `timeout`.
    ///
    /// Never errors: DNS failures, refused connections and timeouts all
    /// resolve to `false`.
    async fn is_reachable(&self, target: &str, timeout: Duration) -> bool;
}

/// Probe that opens a TCP connection to the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectivityProbe;

#[async_trait]
impl ConnectivityProbe for TcpConnectivityProbe {
    async fn is_reachable(&self, target: &str, timeout: Duration) -> bool {
        let attempt = async {
            let addrs = lookup_host(target).await?;
            let mut last_err = None;
            for addr in addrs {
                match TcpStream::connect(addr).await {
                    Ok(_) => return Ok(()),
                    Err(e) => last_err = Some(e),
                }
            }
            Err::<(), std::io::Error>(last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
            }))
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(target = %target, error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(target = %target, "Connectivity probe timed out");
                false
            }
        }
    }
}

/// Runs the probe and records the advisory outcome.
pub async fn check_connectivity(
    probe: &dyn ConnectivityProbe,
    target: &str,
    timeout: Duration,
    logger: &RunLogger,
) -> bool {
    let reachable = probe.is_reachable(target, timeout).await;
    if reachable {
        logger.info(format!("Internet connectivity confirmed ({target})"));
    } else {
        logger.warning(format!(
            "No internet connectivity detected ({target}); network-dependent stages may fail"
        ));
    }
    reachable
}
