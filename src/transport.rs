//! Transport boundary – a per-observer, ordered, reliable `send` primitive.
//!
//! The scheduler never blocks on a transport. A failed send only affects the
//! observer it was addressed to.

use crate::error::TransportError;
use crate::protocol::SyncMessage;
use crate::types::ObserverId;
use std::collections::HashSet;

pub trait Transport {
    /// Called once at the start of every tick with the tick number.
    fn begin_tick(&mut self, _tick: u64) {}

    fn send(&mut self, observer: ObserverId, message: &SyncMessage) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// In-memory transport
// ---------------------------------------------------------------------------

/// Records every delivered message. Observers marked disconnected fail.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Vec<(u64, ObserverId, SyncMessage)>,
    disconnected: HashSet<ObserverId>,
    tick: u64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disconnect(&mut self, observer: ObserverId) {
        self.disconnected.insert(observer);
    }

    pub fn reconnect(&mut self, observer: ObserverId) {
        self.disconnected.remove(&observer);
    }

    /// Every delivered message as `(tick, observer, message)`.
    pub fn sent(&self) -> &[(u64, ObserverId, SyncMessage)] {
        &self.sent
    }

    /// Messages delivered to `observer`, in order.
    pub fn sent_to(&self, observer: ObserverId) -> Vec<&SyncMessage> {
        self.sent
            .iter()
            .filter(|(_, o, _)| *o == observer)
            .map(|(_, _, m)| m)
            .collect()
    }

    pub fn take(&mut self) -> Vec<(u64, ObserverId, SyncMessage)> {
        std::mem::take(&mut self.sent)
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Transport for MemoryTransport {
    fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    fn send(&mut self, observer: ObserverId, message: &SyncMessage) -> Result<(), TransportError> {
        if self.disconnected.contains(&observer) {
            return Err(TransportError::Disconnected(observer));
        }
        self.sent.push((self.tick, observer, message.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Channel transport (server feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "server")]
pub use channel::ChannelTransport;

#[cfg(feature = "server")]
mod channel {
    use super::Transport;
    use crate::error::TransportError;
    use crate::protocol::{SyncEvent, SyncMessage};
    use crate::types::ObserverId;
    use bytes::Bytes;
    use std::collections::HashMap;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

    /// One unbounded tokio channel per observer carrying JSON-encoded
    /// [`SyncEvent`] envelopes.
    pub struct ChannelTransport {
        session: String,
        frame: u64,
        channels: HashMap<ObserverId, UnboundedSender<Bytes>>,
    }

    impl ChannelTransport {
        pub fn new(session: impl Into<String>) -> Self {
            Self {
                session: session.into(),
                frame: 0,
                channels: HashMap::new(),
            }
        }

        /// Open (or replace) the channel for `observer`.
        pub fn register(&mut self, observer: ObserverId) -> UnboundedReceiver<Bytes> {
            let (tx, rx) = unbounded_channel();
            self.channels.insert(observer, tx);
            rx
        }

        pub fn unregister(&mut self, observer: ObserverId) -> bool {
            self.channels.remove(&observer).is_some()
        }

        pub fn is_registered(&self, observer: ObserverId) -> bool {
            self.channels.contains_key(&observer)
        }
    }

    impl Transport for ChannelTransport {
        fn begin_tick(&mut self, tick: u64) {
            self.frame = tick;
        }

        fn send(
            &mut self,
            observer: ObserverId,
            message: &SyncMessage,
        ) -> Result<(), TransportError> {
            let tx = self
                .channels
                .get(&observer)
                .ok_or(TransportError::Disconnected(observer))?;
            let payload = serde_json::to_vec(&SyncEvent::new(
                self.session.as_str(),
                self.frame,
                message,
            ))?;
            tx.send(Bytes::from(payload))
                .map_err(|_| TransportError::Disconnected(observer))
        }
    }
}
