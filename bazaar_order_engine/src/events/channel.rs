//! Stateless pub-sub event handling.
//!
//! Components subscribe to engine events through handlers. Handlers receive only the event, never the engine's state.
//! They may be async. A handler that panics is logged and does not take the others down with it.
use std::{any::type_name, future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Receives every event of type `E` published through its producers and runs the handler for each one.
pub struct EventHandler<E: Send + Sync + 'static> {
    receiver: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handlers to finish.
    pub async fn start_handler(self) {
        let Self { mut receiver, sender, handler } = self;
        let event_name = short_type_name::<E>();
        debug!("📬️ Starting {event_name} handler");
        // Only producers handed out by `subscribe` keep the channel open
        drop(sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = receiver.recv().await {
            trace!("📬️ Handling {event_name}");
            let handler = Arc::clone(&handler);
            jobs.spawn(async move { (handler)(ev).await });
            // Reap finished jobs as we go so the set does not grow without bound
            while let Some(done) = jobs.try_join_next() {
                log_job_result(event_name, done);
            }
        }
        debug!("📬️ All {event_name} producers are gone. Waiting for {} jobs to complete", jobs.len());
        while let Some(done) = jobs.join_next().await {
            log_job_result(event_name, done);
        }
        debug!("📬️ {event_name} handler has shut down");
    }
}

fn log_job_result(event_name: &str, result: Result<(), tokio::task::JoinError>) {
    match result {
        Ok(()) => trace!("📬️ {event_name} handled"),
        Err(e) if e.is_panic() => error!("📬️ A {event_name} handler panicked. The event was dropped."),
        Err(e) => warn!("📬️ A {event_name} handler was cancelled. {e}"),
    }
}

fn short_type_name<E>() -> &'static str {
    let name = type_name::<E>();
    name.rsplit("::").next().unwrap_or(name)
}

/// The publishing end of an [`EventHandler`]. Cheap to clone.
#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Waits for room in the channel if the handler is behind. Publishing never fails the caller; if the handler is
    /// gone the event is logged and dropped.
    pub async fn publish_event(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            error!("📬️ No handler is listening for {} events. The event was dropped.", short_type_name::<E>());
        }
    }
}
