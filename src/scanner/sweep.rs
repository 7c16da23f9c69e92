//! Bounded-concurrency subnet sweep with live progress and cancellation

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::MAX_CONCURRENT_PROBES;
use crate::network::host_addresses;
use crate::scanner::probe::{probe_device, ProbePolicy};
use crate::session::ScanTracker;

/// Probe every usable host in `network` for devices, updating the shared
/// scan session as results come in.
///
/// Concurrency is capped to avoid socket exhaustion and to keep small
/// networks from being flooded. Cancellation is cooperative: the flag is
/// checked before each result collection, and once observed, in-flight
/// probes are abandoned (their results discarded) and whatever was found
/// so far is returned.
pub async fn scan_range(
    http: &reqwest::Client,
    tracker: &Arc<ScanTracker>,
    network: Ipv4Network,
    per_host_timeout: Duration,
    policy: ProbePolicy,
) -> Vec<Ipv4Addr> {
    let hosts = host_addresses(network);
    tracing::info!("Scanning {} with {} host addresses", network, hosts.len());
    tracker.set_network_range(&network.to_string());
    tracker.set_total_hosts(hosts.len());

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_PROBES));
    let mut handles = Vec::with_capacity(hosts.len());

    for ip in hosts {
        let semaphore = Arc::clone(&semaphore);
        let http = http.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return (ip, false),
            };
            let found = probe_device(&http, ip, per_host_timeout, policy).await;
            (ip, found)
        }));
    }

    let total = handles.len();
    let mut found_ips = Vec::new();
    let mut completed = 0usize;

    for handle in handles {
        if tracker.is_cancelled() {
            tracing::info!(
                "Network scan cancelled after {}/{} hosts; abandoning in-flight probes",
                completed,
                total
            );
            break;
        }

        match handle.await {
            Ok((ip, found)) => {
                if found {
                    found_ips.push(ip);
                }
                tracker.record_probe(found);
                completed += 1;
                if completed % 25 == 0 {
                    tracing::info!("Scanned {}/{} hosts...", completed, total);
                }
            }
            Err(e) => {
                tracker.record_probe(false);
                completed += 1;
                tracing::warn!("Probe task failed: {}", e);
            }
        }
    }

    tracing::info!(
        "Sweep finished: {} candidate devices out of {} hosts probed",
        found_ips.len(),
        completed
    );
    found_ips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SCAN_PROGRESS_CEIL;

    #[tokio::test]
    async fn sweep_of_single_host_completes_and_updates_progress() {
        let http = reqwest::Client::new();
        let tracker = Arc::new(ScanTracker::new());
        tracker.begin("network", None).unwrap();

        // TEST-NET-1 /32: one host, nothing listening
        let network: Ipv4Network = "192.0.2.1/32".parse().unwrap();
        let found = scan_range(
            &http,
            &tracker,
            network,
            Duration::from_millis(200),
            ProbePolicy::default(),
        )
        .await;

        assert!(found.is_empty());
        let progress = tracker.snapshot();
        assert_eq!(progress.total_ips, 1);
        assert_eq!(progress.ips_scanned, 1);
        assert_eq!(progress.progress_percent, SCAN_PROGRESS_CEIL);
    }

    #[tokio::test]
    async fn cancelled_sweep_stops_collecting() {
        let http = reqwest::Client::new();
        let tracker = Arc::new(ScanTracker::new());
        tracker.begin("network", None).unwrap();
        tracker.request_cancel().unwrap();

        let network: Ipv4Network = "192.0.2.0/30".parse().unwrap();
        let found = scan_range(
            &http,
            &tracker,
            network,
            Duration::from_millis(200),
            ProbePolicy::default(),
        )
        .await;

        assert!(found.is_empty());
        // Cancellation observed before the first collection
        assert_eq!(tracker.snapshot().ips_scanned, 0);
    }
}
