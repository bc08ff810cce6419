// In-page broadcast channel shared by two realms
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default number of frames a slow listener may fall behind before losing some
pub const DEFAULT_CAPACITY: usize = 1000;

/// Upper bound on the channel buffer, which is allocated up front
pub const MAX_CAPACITY: usize = 65_536;

/// Untyped broadcast primitive connecting realms that share a document.
///
/// Every frame sent is observed by every listener registered at send time,
/// including listeners of the sending realm. There is no addressing and no
/// retained delivery: a listener registered after a send never sees it.
#[derive(Debug, Clone)]
pub struct Transport {
    tx: broadcast::Sender<String>,
}

impl Transport {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Capacity is clamped to `1..=MAX_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Self {
        let clamped = capacity.clamp(1, MAX_CAPACITY);
        if clamped != capacity {
            warn!(target: "transport", requested = capacity, capacity = clamped, "Transport capacity out of range; clamped");
        }
        let (tx, _) = broadcast::channel(clamped);
        Self { tx }
    }

    /// Broadcast a serialized envelope. Returns how many listeners observed it.
    ///
    /// Sending while nobody listens drops the frame silently.
    pub fn send(&self, frame: String) -> usize {
        match self.tx.send(frame) {
            Ok(n) => n,
            Err(_) => {
                trace!(target: "transport", "Frame sent with no listener; dropped");
                0
            }
        }
    }

    /// Register a listener receiving every frame broadcast from now on.
    pub fn listen(&self) -> TransportListener {
        TransportListener {
            rx: self.tx.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a [`Transport`].
pub struct TransportListener {
    rx: broadcast::Receiver<String>,
}

impl TransportListener {
    /// Next frame in send order, or `None` once every sender is gone.
    ///
    /// Frames lost to lag are skipped rather than reported.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(target: "transport", skipped, "Listener lagged; frames lost");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_listener_observes_frame() {
        let transport = Transport::new();
        let mut a = transport.listen();
        let mut b = transport.listen();

        assert_eq!(transport.send("one".to_string()), 2);
        assert_eq!(a.recv().await.as_deref(), Some("one"));
        assert_eq!(b.recv().await.as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn test_late_listener_misses_earlier_frames() {
        let transport = Transport::new();
        let mut early = transport.listen();
        transport.send("before".to_string());

        let mut late = transport.listen();
        transport.send("after".to_string());

        assert_eq!(early.recv().await.as_deref(), Some("before"));
        assert_eq!(early.recv().await.as_deref(), Some("after"));
        assert_eq!(late.recv().await.as_deref(), Some("after"));
    }

    #[test]
    fn test_send_without_listener_is_dropped() {
        let transport = Transport::new();
        assert_eq!(transport.send("nobody".to_string()), 0);
        assert_eq!(transport.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_fifo_per_sender() {
        let transport = Transport::new();
        let mut rx = transport.listen();
        for i in 0..10 {
            transport.send(format!("f{i}"));
        }
        for i in 0..10 {
            assert_eq!(rx.recv().await, Some(format!("f{i}")));
        }
    }

    #[tokio::test]
    async fn test_out_of_range_capacity_is_clamped() {
        let huge = Transport::with_capacity(usize::MAX);
        let mut rx = huge.listen();
        assert_eq!(huge.send("still works".to_string()), 1);
        assert_eq!(rx.recv().await.as_deref(), Some("still works"));

        let zero = Transport::with_capacity(0);
        let mut rx = zero.listen();
        zero.send("one".to_string());
        assert_eq!(rx.recv().await.as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn test_lagged_listener_skips_lost_frames() {
        let transport = Transport::with_capacity(2);
        let mut rx = transport.listen();
        for i in 0..5 {
            transport.send(format!("f{i}"));
        }
        // Oldest frames were overwritten; the listener resumes at the oldest retained one
        assert_eq!(rx.recv().await.as_deref(), Some("f3"));
        assert_eq!(rx.recv().await.as_deref(), Some("f4"));
    }
}
