//! Reclamation Loop
//!
//! A periodic background task that runs the expiry purge unconditionally,
//! so a long-idle durable tier does not accumulate stale bytes between
//! writes. A failed pass is logged and never terminates the loop. The
//! loop lives from `initialize()` to `destroy()` and is stopped through a
//! cancellation token, leaving no dangling task behind.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CacheInner;
use crate::codec::Codec;

/// Handle to a running reclamation loop
pub(crate) struct SweeperHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Cancel the loop and wait for it to finish
    pub(crate) async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("reclamation task did not shut down cleanly: {}", e);
        }
    }
}

/// Spawn the reclamation loop with the given period
pub(crate) fn spawn<C: Codec>(inner: Arc<CacheInner<C>>, period: Duration) -> SweeperHandle {
    let token = CancellationToken::new();
    let loop_token = token.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; the first real pass waits one period
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = loop_token.cancelled() => {
                    debug!("reclamation loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match inner.purge_expired().await {
                        Ok(0) => debug!("reclamation pass: nothing expired"),
                        Ok(purged) => info!(purged, "reclamation pass"),
                        Err(e) => warn!("reclamation pass failed: {}", e),
                    }
                }
            }
        }
    });

    SweeperHandle { token, handle }
}
