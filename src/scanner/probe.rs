//! Host reachability and device fingerprint probes
//!
//! Probe failures of any kind (refused, timeout, DNS) are swallowed and
//! reported as a non-match; nothing here returns an error to the caller.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::config::{DESCRIPTION_PATH, DEVICE_PORT, DEVICE_SIGNATURES, FINGERPRINT_TIMEOUT};

/// How to classify a host whose device port is open but whose description
/// fetch failed or timed out.
#[derive(Debug, Clone, Copy)]
pub struct ProbePolicy {
    /// Treat an open device port as sufficient evidence when the richer
    /// fingerprint check is inconclusive. Trades false positives for
    /// fewer false negatives.
    pub assume_device_when_port_open: bool,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            assume_device_when_port_open: true,
        }
    }
}

/// True iff a TCP connection to `ip:port` is established within the timeout.
pub async fn tcp_probe(ip: Ipv4Addr, port: u16, timeout: Duration) -> bool {
    let addr = SocketAddr::new(IpAddr::V4(ip), port);
    matches!(
        tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// Probe `ip` for a device: port check first, then a description fetch
/// looking for vendor signatures in the body.
pub async fn probe_device(
    http: &reqwest::Client,
    ip: Ipv4Addr,
    timeout: Duration,
    policy: ProbePolicy,
) -> bool {
    if !tcp_probe(ip, DEVICE_PORT, timeout).await {
        return false;
    }

    let url = format!("http://{}:{}{}", ip, DEVICE_PORT, DESCRIPTION_PATH);
    let response = http.get(&url).timeout(FINGERPRINT_TIMEOUT).send().await;

    match response {
        Ok(response) => match response.text().await {
            Ok(body) => {
                let body = body.to_lowercase();
                if DEVICE_SIGNATURES.iter().any(|sig| body.contains(sig)) {
                    tracing::info!("Confirmed device at {} (signature match)", ip);
                    true
                } else {
                    tracing::debug!(
                        "Port {} open at {} but description has no device signature",
                        DEVICE_PORT,
                        ip
                    );
                    false
                }
            }
            Err(e) => {
                tracing::debug!("Description body read failed for {}: {}", ip, e);
                policy.assume_device_when_port_open
            }
        },
        Err(e) => {
            tracing::debug!("Description fetch failed for {}, port was open: {}", ip, e);
            policy.assume_device_when_port_open
        }
    }
}
