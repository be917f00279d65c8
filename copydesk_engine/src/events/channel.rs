//! Simple stateless pub-sub event plumbing.
//!
//! Components subscribe to engine events (order created, order paid, stage advanced, ...) and react to
//! them. Handlers are stateless: all they receive is the event itself, though they may be async and spawn
//! their own work. One [`EventHandler`] runs per event type; any number of [`EventProducer`]s may feed it.

use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs the dispatch loop until every producer has been dropped, then drains outstanding handler
    /// invocations before returning.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Drop our own sender so the loop ends once the last external producer goes away.
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(event) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.spawn(async move {
                (handler)(event).await;
                trace!("📬️ Event handled");
            });
            // Opportunistically reap finished invocations so the set does not grow unbounded.
            while jobs.try_join_next().is_some() {}
        }
        while let Some(res) = jobs.join_next().await {
            if let Err(e) = res {
                warn!("📬️ Event handler task failed: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn all_published_events_are_handled() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let seen = total.clone();
        let handler = Arc::new(move |v: u64| {
            let seen = seen.clone();
            Box::pin(async move {
                let _ = seen.fetch_add(v, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(2, handler);
        let producer_a = event_handler.subscribe();
        let producer_b = event_handler.subscribe();
        tokio::spawn(async move {
            for v in [1u64, 3, 5, 7, 9] {
                producer_a.publish_event(v).await;
            }
        });
        tokio::spawn(async move {
            for v in [0u64, 2, 4, 6, 8] {
                producer_b.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(total.load(Ordering::SeqCst), 45);
    }
}
