//! Async event loop around a [`PinEngine`].
//!
//! Host adapters push [`HostEvent`]s through a [`DriverHandle`]; [`run`] is the
//! single consumer. Time comes from tokio, so tests can pause it.

use crate::engine::{EventOutcome, PinEngine};
use crate::error::LinkError;
use crate::host::HostDocument;
use crate::messaging::CoreLink;
use crate::watcher::HostEvent;
use rowpin_protocol::CoreRequest;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};

enum Command {
    Event {
        event: HostEvent,
        reply: Option<oneshot::Sender<EventOutcome>>,
    },
    Shutdown,
}

/// Sending side of the driver queue. Cheap to clone.
#[derive(Clone)]
pub struct DriverHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Receiving side, consumed by [`run`].
pub struct DriverInbox {
    rx: mpsc::UnboundedReceiver<Command>,
}

/// Create a connected handle/inbox pair.
pub fn channel() -> (DriverHandle, DriverInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DriverHandle { tx }, DriverInbox { rx })
}

impl DriverHandle {
    /// Queue an event without waiting for its outcome.
    pub fn send(&self, event: HostEvent) -> Result<(), LinkError> {
        self.tx
            .send(Command::Event { event, reply: None })
            .map_err(|_| LinkError::Closed)
    }

    /// Queue an event and wait for the engine's reply.
    pub async fn request(&self, event: HostEvent) -> Result<EventOutcome, LinkError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Event {
                event,
                reply: Some(reply),
            })
            .map_err(|_| LinkError::Closed)?;
        rx.await.map_err(|_| LinkError::Closed)
    }

    /// Ask the loop to stop after the commands already queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

impl CoreLink for DriverHandle {
    fn send(&self, request: CoreRequest) -> Result<(), LinkError> {
        DriverHandle::send(self, HostEvent::Message(request))
    }
}

/// Drive `engine` until shutdown or until every handle is dropped. Returns the
/// engine so callers can inspect the final state.
pub async fn run<D: HostDocument>(mut engine: PinEngine<D>, mut inbox: DriverInbox) -> PinEngine<D> {
    let tick_every = engine.config().timings.tick_interval();
    let mut ticker = time::interval_at(Instant::now() + tick_every, tick_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    engine.start(Instant::now().into_std());

    loop {
        let deadline = engine.next_deadline().map(Instant::from_std);
        let wake = async {
            match deadline {
                Some(at) => time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            command = inbox.rx.recv() => match command {
                Some(Command::Event { event, reply }) => {
                    let outcome = engine.handle_event(event, Instant::now().into_std());
                    if let Some(reply) = reply {
                        let _ = reply.send(outcome);
                    }
                }
                Some(Command::Shutdown) | None => break,
            },
            _ = ticker.tick() => {
                engine.handle_event(HostEvent::Tick, Instant::now().into_std());
            }
            _ = wake => engine.advance(Instant::now().into_std()),
        }
    }

    // Queued saves land before the engine is handed back
    if !engine.store().flush() {
        log::warn!("Pinned list save still pending at shutdown");
    }
    crate::debug_info!("DRIVER", "Event loop stopped");
    engine
}
