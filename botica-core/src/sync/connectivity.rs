//! Network reachability
//!
//! Platform network callbacks report through [`ConnectivityMonitor::set_online`].
//! Where no such callback exists an HTTP health probe can drive the same
//! channel ([`ConnectivityMonitor::run_probe`]).

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Report the current reachability. Subscribers are only woken on change.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "Connectivity changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Poll `url` every `interval` and publish the result until shutdown
    ///
    /// Any HTTP response counts as reachable; transport errors and timeouts
    /// count as offline.
    pub async fn run_probe(
        self,
        url: String,
        interval: Duration,
        timeout: Duration,
        shutdown: CancellationToken,
    ) {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build connectivity probe client");
                return;
            }
        };

        tracing::info!(url = %url, interval_secs = interval.as_secs(), "Connectivity probe started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Connectivity probe stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let reachable = probe(&client, &url).await;
                    self.set_online(reachable);
                }
            }
        }
    }
}

async fn probe(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Connectivity probe failed");
            false
        }
    }
}
