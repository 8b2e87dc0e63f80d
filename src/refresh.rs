//! Periodic event that moves producer frames into the exposed snapshot
//! and fans out multipart parts to every attached streaming client.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client;
use crate::producer::FrameSlot;
use crate::registry::{ClientHandle, ClientRegistry};
use crate::snapshot::ExposedSnapshot;

struct ClientSlot {
    tx: mpsc::Sender<Bytes>,
}

/// A newly accepted `/stream` connection, handed off from the HTTP
/// dispatcher to the refresh ticker for registration.
pub struct NewStreamClient {
    pub stream: TcpStream,
}

/// Owns the client registry and the exposed snapshot exclusively; the
/// sole writer of both. Runs until `cancel` fires.
pub struct RefreshTicker {
    frame_slot: Arc<FrameSlot>,
    exposed: Arc<RwLock<ExposedSnapshot>>,
    refresh_interval: Duration,
    registry: ClientRegistry<ClientSlot>,
}

impl RefreshTicker {
    pub fn new(
        frame_slot: Arc<FrameSlot>,
        exposed: Arc<RwLock<ExposedSnapshot>>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            frame_slot,
            exposed,
            refresh_interval,
            registry: ClientRegistry::new(),
        }
    }

    pub async fn run(
        mut self,
        mut new_clients_rx: mpsc::Receiver<NewStreamClient>,
        cancel: CancellationToken,
    ) {
        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel::<ClientHandle>();
        let mut ticker = interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("refresh ticker started, interval = {:?}", self.refresh_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    self.drain_closed(&mut closed_rx);
                    self.on_tick().await;
                }
                Some(new_client) = new_clients_rx.recv() => {
                    self.drain_closed(&mut closed_rx);
                    self.attach(new_client, closed_tx.clone());
                }
            }
        }

        self.teardown();
        info!("refresh ticker stopped");
    }

    fn drain_closed(&mut self, closed_rx: &mut mpsc::UnboundedReceiver<ClientHandle>) {
        while let Ok(handle) = closed_rx.try_recv() {
            self.registry.detach(handle);
        }
    }

    fn attach(&mut self, new_client: NewStreamClient, closed_tx: mpsc::UnboundedSender<ClientHandle>) {
        let (tx, rx) = client::new_channel();
        let handle = self.registry.attach(ClientSlot { tx });
        debug!("attached new stream client");
        tokio::spawn(client::run(new_client.stream, handle, rx, closed_tx));
    }

    /// One firing of the refresh timer: implements spec.md §4.E exactly.
    async fn on_tick(&mut self) {
        let mut should_fanout = false;

        let mut slot = self.frame_slot.lock();
        if slot.updated {
            if !slot.picture.is_empty() {
                self.exposed.write().adopt(&slot.picture, slot.width, slot.height);
                slot.updated = false;
                drop(slot);
            } else {
                slot.updated = false;
                drop(slot);
                self.exposed.write().blankify();
            }
            should_fanout = true;
        } else {
            drop(slot);
            if !self.exposed.read().online() {
                should_fanout = true;
            }
        }

        if should_fanout {
            self.fanout();
        }
    }

    /// Copy the exposed picture once, then hand a cheap refcounted clone
    /// to every attached client, one copy per tick, not one per client.
    fn fanout(&self) {
        let payload = {
            let exposed = self.exposed.read();
            Bytes::copy_from_slice(exposed.bytes())
        };

        self.registry.for_each(|_, slot| {
            // Bounded channel of capacity 1: if the client hasn't drained
            // last tick's frame, this tick's frame is dropped for it.
            let _ = slot.tx.try_send(payload.clone());
        });
    }

    fn teardown(&mut self) {
        let drained = self.registry.drain();
        debug!("refresh ticker teardown: dropping {} client channel(s)", drained.len());
        // Dropping each ClientSlot closes its mpsc sender, which in turn
        // ends that client's run() loop and closes its socket.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::FrameSlot;

    fn new_ticker() -> RefreshTicker {
        RefreshTicker::new(
            Arc::new(FrameSlot::new()),
            Arc::new(RwLock::new(ExposedSnapshot::blank())),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_on_tick_adopts_frame_and_flips_online() {
        let mut ticker = new_ticker();
        ticker.frame_slot.publish(&[0xFF, 0xD8, 1, 2, 0xFF, 0xD9], 320, 240);
        ticker.on_tick().await;

        let exposed = ticker.exposed.read();
        assert!(exposed.online());
        assert_eq!(exposed.bytes(), &[0xFF, 0xD8, 1, 2, 0xFF, 0xD9]);
        assert_eq!(exposed.width(), 320);
        assert_eq!(exposed.height(), 240);
    }

    #[tokio::test]
    async fn test_on_tick_with_empty_frame_goes_blank() {
        let mut ticker = new_ticker();
        ticker.frame_slot.publish(&[1, 2, 3], 320, 240);
        ticker.on_tick().await;
        assert!(ticker.exposed.read().online());

        ticker.frame_slot.publish_offline();
        ticker.on_tick().await;
        assert!(!ticker.exposed.read().online());
    }

    #[tokio::test]
    async fn test_on_tick_without_update_and_online_does_nothing() {
        let mut ticker = new_ticker();
        ticker.frame_slot.publish(&[1, 2, 3], 320, 240);
        ticker.on_tick().await; // adopts, online now

        let (tx, mut rx) = client::new_channel();
        let handle = ticker.registry.attach(ClientSlot { tx });

        ticker.on_tick().await; // no update, already online: no fanout
        assert!(rx.try_recv().is_err());
        ticker.registry.detach(handle);
    }

    #[tokio::test]
    async fn test_on_tick_fans_out_while_blank_for_keepalive() {
        let mut ticker = new_ticker(); // starts blank/offline
        let (tx, mut rx) = client::new_channel();
        let handle = ticker.registry.attach(ClientSlot { tx });

        ticker.on_tick().await; // no update, still offline: keepalive fanout
        assert!(rx.try_recv().is_ok());
        ticker.registry.detach(handle);
    }

    #[tokio::test]
    async fn test_fanout_drops_frame_for_slow_client_without_blocking() {
        let mut ticker = new_ticker();
        let (tx, mut rx) = client::new_channel();
        let handle = ticker.registry.attach(ClientSlot { tx });

        // Fanout twice without the client draining in between: the
        // channel has capacity 1, so the second frame is dropped for
        // this client rather than queued or blocking the ticker.
        ticker.fanout();
        ticker.fanout();

        assert!(rx.try_recv().is_ok(), "first frame should be queued");
        assert!(
            rx.try_recv().is_err(),
            "second frame should have been dropped, not queued"
        );
        let _ = handle;
    }
}
