use async_trait::async_trait;
use lb_protocol::ServiceEvent;
use tokio::sync::mpsc;

/// The upstream watcher that discovers service add/modify/delete events
/// from a live cluster. A real implementation is an external collaborator
/// (§1); this trait is the seam the dispatcher reads through, so it can run
/// against a channel-backed stand-in locally and a real cluster watcher in
/// production without any change to E/D.
#[async_trait]
pub trait EventSource: Send {
    async fn recv(&mut self) -> Option<ServiceEvent>;
    fn close(&mut self);
}

/// A channel-backed stand-in. In `debug` mode the HTTP surface's
/// `POST /debug/events` route feeds this channel's sender, mirroring the
/// original process's own "http bind type is a log-only placeholder"
/// carve-out: it exists to drive the core from curl/tests, not to watch a
/// real cluster.
pub struct ChannelEventSource {
    rx: mpsc::Receiver<ServiceEvent>,
}

impl ChannelEventSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<ServiceEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn recv(&mut self) -> Option<ServiceEvent> {
        self.rx.recv().await
    }

    fn close(&mut self) {
        self.rx.close();
    }
}
