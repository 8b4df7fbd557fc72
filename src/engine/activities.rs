use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::engine::coordinator::Shared;
use crate::engine::session::SessionTrack;
use crate::engine::EventKind;
use crate::geo::describe_or_coordinates;
use crate::models::pickup::EtaEstimate;

/// Background tasks owned by a lifecycle stage. Dropping the owner aborts
/// every task, so no timer or follower outlives the stage that started it.
#[derive(Debug, Default)]
pub struct Activities {
    handles: Vec<JoinHandle<()>>,
}

impl Activities {
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.push(tokio::spawn(task));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for Activities {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

pub(crate) async fn poll_pending_pickups(shared: Arc<Shared>) {
    let mut ticker = interval(shared.timings.pending_poll);
    loop {
        ticker.tick().await;
        if let Err(err) = shared.refresh_pending().await {
            warn!(error = %err, "pending pickups refresh failed; keeping last known list");
        }
    }
}

/// Follows the driver-location cell and keeps the session address current.
pub(crate) async fn track_location(shared: Arc<Shared>, track: Arc<SessionTrack>) {
    let mut fixes = WatchStream::new(shared.driver_location.subscribe());

    while let Some(fix) = fixes.next().await {
        let Some(point) = fix else {
            continue;
        };

        let address = describe_or_coordinates(shared.geocoder.as_ref(), point).await;
        track.address.send_replace(Some(address.clone()));
        shared.emit(EventKind::AddressResolved {
            session_id: track.id,
            address,
        });
    }
}

pub(crate) async fn poll_eta(shared: Arc<Shared>, track: Arc<SessionTrack>) {
    let mut ticker = interval(shared.timings.eta_poll);
    loop {
        ticker.tick().await;

        let eta = match shared.pickups.eta(&track.pickup.id).await {
            Ok(body) => {
                shared.metrics.record_poll("eta", true);
                EtaEstimate::from_body(&body)
            }
            Err(err) => {
                shared.metrics.record_poll("eta", false);
                warn!(pickup_id = %track.pickup.id, error = %err, "eta fetch failed");
                EtaEstimate::unavailable()
            }
        };

        track.eta.send_replace(Some(eta.clone()));
        shared.emit(EventKind::EtaUpdated {
            session_id: track.id,
            eta,
        });
    }
}

/// Reports the driver's address once one is known, then on every tick.
pub(crate) async fn report_driver_location(shared: Arc<Shared>, track: Arc<SessionTrack>) {
    let mut address = track.address.subscribe();
    let resolved = address.wait_for(Option::is_some).await.is_ok();
    if !resolved {
        return;
    }

    let mut ticker = interval(shared.timings.location_report);
    loop {
        ticker.tick().await;

        let Some(current) = track.address.borrow().clone() else {
            continue;
        };
        let update = track.update(current);

        match shared
            .pickups
            .report_driver_location(&track.pickup.id, &update)
            .await
        {
            Ok(()) => {
                shared.metrics.record_poll("driver_location", true);
                debug!(pickup_id = %track.pickup.id, "driver location reported");
            }
            Err(err) => {
                shared.metrics.record_poll("driver_location", false);
                warn!(pickup_id = %track.pickup.id, error = %err, "driver location report failed; retrying next tick");
            }
        }
    }
}
