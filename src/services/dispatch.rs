//! Fire-and-forget notification dispatch.
//!
//! Every message is delivered on its own spawned task; `dispatch` returns
//! immediately and the caller never learns the outcome. At most
//! `max_in_flight` deliveries run at once, the rest queue on the semaphore.
//! Dispatched tasks are not cancellable; `drain` waits for them.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::services::{NotificationService, Recipient};

pub struct Dispatcher {
    notifier: Arc<dyn NotificationService>,
    permits: Arc<Semaphore>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn NotificationService>, max_in_flight: usize) -> Self {
        Self {
            notifier,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Queue a message for delivery without waiting for it.
    pub fn dispatch(&self, recipient: Recipient, message: String) {
        let notifier = Arc::clone(&self.notifier);
        let permits = Arc::clone(&self.permits);

        let handle = tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            notifier.send_to(&recipient, &message).await;
        });

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|task| !task.is_finished());
        in_flight.push(handle);
    }

    /// Deliveries not yet finished.
    pub fn pending(&self) -> usize {
        self.in_flight
            .lock()
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Wait for every dispatched delivery to finish.
    pub async fn drain(&self) {
        let tasks = std::mem::take(&mut *self.in_flight.lock());
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                log::error!("Notification task aborted: {e}");
            }
        }
    }
}
