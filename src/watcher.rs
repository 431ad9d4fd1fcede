//! Supervised watch loop feeding membership events to the selector.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use kube::core::WatchEvent;
use pingora::server::ShutdownWatch;
use pingora::services::background::BackgroundService;

use crate::discovery::{EventStream, MembershipSource};
use crate::selector::PrimarySelector;

/// Delay before a new subscription is opened after the previous one failed to
/// open, errored, or ended.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(30);

/// Background task that keeps a membership subscription alive for the process
/// lifetime and routes its events, in delivery order, to the selector.
///
/// The loop owns the reconnect policy and nothing else; what a snapshot means
/// for the forwarding target is the selector's concern.
pub struct EndpointWatcher {
    source: Box<dyn MembershipSource>,
    selector: PrimarySelector,
}

impl EndpointWatcher {
    pub fn new(source: Box<dyn MembershipSource>, selector: PrimarySelector) -> Self {
        EndpointWatcher { source, selector }
    }

    /// Drain one subscription session. Returns `true` when shutdown was
    /// requested while waiting for the next event.
    async fn consume(&self, mut events: EventStream, shutdown: &mut ShutdownWatch) -> bool {
        loop {
            let event = tokio::select! {
                _ = shutdown.changed() => return true,
                event = events.next() => event,
            };

            match event {
                None => return false,
                Some(Err(e)) => {
                    log::error!("error while watching: {e}");
                    return false;
                }
                Some(Ok(WatchEvent::Added(endpoints) | WatchEvent::Modified(endpoints))) => {
                    self.selector.observe(&endpoints);
                }
                Some(Ok(WatchEvent::Error(status))) => {
                    log::warn!("error event while watching: {status:?}");
                }
                // Deletions and bookmarks are not membership changes.
                Some(Ok(_)) => {}
            }
        }
    }
}

#[async_trait]
impl BackgroundService for EndpointWatcher {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            match self.source.subscribe().await {
                Ok(events) => {
                    if self.consume(events, &mut shutdown).await {
                        return;
                    }
                    log::debug!("watch has ended, starting new watch");
                }
                Err(e) => {
                    log::error!("error while establishing watch: {e}");
                }
            }

            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
            }
        }
    }
}
