//! The delivery worker.
//!
//! A single task polls the delivery queue on a fixed period, takes at
//! most one message per wake, and fans it out to every provider
//! connection whose capability table accepts the message kind. Failure
//! events from the connections are drained by a companion logging task,
//! so a misbehaving device never surfaces as anything but a log line.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use pushbridge_common::{FailureReceiver, FailureSender, PushMessage, PushProvider};
use pushbridge_config::WorkerConfig;
use pushbridge_queue::{DeliveryQueue, SharedQueue};
use pushbridge_registry::{Registry, SharedRegistry};

pub struct Dispatcher {
    registry: SharedRegistry,
    queue: SharedQueue,
    providers: Vec<Arc<dyn PushProvider>>,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: SharedRegistry,
        queue: SharedQueue,
        providers: Vec<Arc<dyn PushProvider>>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            registry,
            queue,
            providers,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// One poll cycle: dequeue at most one message and fan it out.
    pub async fn dispatch_once(&self) {
        let msg = match self.queue.dequeue().await {
            Ok(Some(msg)) => msg,
            Ok(None) => return,
            Err(err) => {
                error!("queue dequeue failed: {}", err);
                return;
            }
        };
        self.fan_out(&msg).await;
    }

    async fn fan_out(&self, msg: &PushMessage) {
        let message_type = msg.message_type();
        let mut handled = false;

        for provider in &self.providers {
            if !provider.handles_message_type(message_type) {
                continue;
            }
            handled = true;

            let device_type = provider.supported_device_type();
            let devices = match self
                .registry
                .devices_for_subscription_and_type(&msg.subscription, device_type)
                .await
            {
                Ok(devices) => devices,
                Err(err) => {
                    error!(
                        subscription = %msg.subscription,
                        "fan-out lookup failed: {}",
                        err
                    );
                    continue;
                }
            };
            if devices.is_empty() {
                continue;
            }

            debug!(
                subscription = %msg.subscription,
                device_type = %device_type,
                count = devices.len(),
                "delivering batch"
            );
            provider.enqueue_batch(&devices, msg).await;
        }

        if !handled {
            // Consumed but undeliverable; the queue is at-most-once.
            warn!(
                subscription = %msg.subscription,
                "no provider handles {:?}, dropping message",
                message_type
            );
        }
    }

    /// Runs the poll loop until `shutdown` fires, then closes every
    /// provider connection.
    ///
    /// Each wake sleeps the remainder of the period after dispatch, so a
    /// slow delivery does not drift the schedule by more than one cycle.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(period_ms = self.poll_interval.as_millis() as u64, "dispatcher started");
        loop {
            let started = Instant::now();
            self.dispatch_once().await;
            let remaining = self.poll_interval.saturating_sub(started.elapsed());

            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("dispatcher stopping");
        for provider in &self.providers {
            provider.close().await;
        }
    }
}

/// Creates the failure channel shared by the provider connections.
pub fn failure_channel() -> (FailureSender, FailureReceiver) {
    mpsc::unbounded_channel()
}

/// Spawns the task that drains and logs delivery-failure events. Ends
/// when every sender half has been dropped.
pub fn spawn_failure_logger(mut failures: FailureReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = failures.recv().await {
            warn!(
                provider = %event.provider,
                device_id = event.device_id.as_deref().unwrap_or("-"),
                "delivery failure ({:?}): {}",
                event.kind,
                event.detail
            );
        }
    })
}
