//! Session lifecycle and the loops it runs.
//!
//! A session runs three loops against one [`Engine`]:
//! - receive: next inbound message, then ingest it
//! - check: trigger evaluation every 20 ms
//! - send: feedback publish every 300 ms
//!
//! Stopping cancels the loops at their next suspension point. An iteration
//! already running finishes first, so callers wait with a grace period.

use crate::engine::Engine;
use crate::remote::RemoteControlEvent;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

pub const CHECK_INTERVAL: Duration = Duration::from_millis(20);
pub const FEEDBACK_INTERVAL: Duration = Duration::from_millis(300);

/// Pause after a failed receive so a broken socket cannot spin the loop.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct Session {
    engine: Arc<Engine>,
    cancel: CancellationToken,
    loops: TaskTracker,
}

impl Session {
    /// Announce the current config values and spawn the loops.
    pub fn start(engine: Arc<Engine>) -> Self {
        let cancel = CancellationToken::new();
        let loops = TaskTracker::new();

        let announcer = Arc::clone(&engine);
        engine.spawn_supervised("announce config", async move {
            announcer.announce_config().await;
            Ok(())
        });

        loops.spawn(receive_loop(Arc::clone(&engine), cancel.clone()));
        loops.spawn(check_loop(Arc::clone(&engine), cancel.clone()));
        loops.spawn(send_loop(Arc::clone(&engine), cancel.clone()));

        info!(groups = engine.groups().len(), "Session started");
        Self {
            engine,
            cancel,
            loops,
        }
    }

    /// Feed remote control events into the engine until the sender is
    /// dropped or the session stops.
    pub fn attach_remote(&self, events: mpsc::Receiver<RemoteControlEvent>) {
        self.loops
            .spawn(remote_loop(Arc::clone(&self.engine), events, self.cancel.clone()));
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancel the loops and wait up to `grace` for them and any in-flight
    /// background tasks. Returns `false` if the grace period ran out.
    pub async fn stop(self, grace: Duration) -> bool {
        self.cancel.cancel();
        self.loops.close();

        let tasks = self.engine.tasks().clone();
        tasks.close();

        let drained = tokio::time::timeout(grace, async {
            self.loops.wait().await;
            tasks.wait().await;
        })
        .await
        .is_ok();
        tasks.reopen();

        if drained {
            info!("Session stopped");
        } else {
            warn!(grace_ms = grace.as_millis() as u64, "Session did not stop within grace period");
        }
        drained
    }
}

async fn receive_loop(engine: Arc<Engine>, cancel: CancellationToken) {
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = engine.game.receive() => received,
        };

        match received {
            Ok(message) => {
                if AssertUnwindSafe(engine.ingest(&message))
                    .catch_unwind()
                    .await
                    .is_err()
                {
                    error!(address = %message.addr, "Panic while handling message");
                }
            }
            Err(e) => {
                trace!("Error receiving message: {:#}", e);
                tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
            }
        }
    }
    debug!("Receive loop stopped");
}

async fn check_loop(engine: Arc<Engine>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if AssertUnwindSafe(engine.check_tick()).catch_unwind().await.is_err() {
                    error!("Panic in check loop");
                }
            }
        }
    }
    debug!("Check loop stopped");
}

async fn send_loop(engine: Arc<Engine>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(FEEDBACK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if AssertUnwindSafe(engine.publish_feedback()).catch_unwind().await.is_err() {
                    error!("Panic in send loop");
                }
            }
        }
    }
    debug!("Send loop stopped");
}

async fn remote_loop(
    engine: Arc<Engine>,
    mut events: mpsc::Receiver<RemoteControlEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if AssertUnwindSafe(engine.apply_remote(&event))
            .catch_unwind()
            .await
            .is_err()
        {
            error!(device = %event.device_id, "Panic while applying remote event");
        }
    }
    debug!("Remote loop stopped");
}
