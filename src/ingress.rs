//! Observer command queue.
//!
//! Session events arrive on network threads; the scheduler drains them once
//! per tick on the simulation thread, so subscription sets are never touched
//! concurrently.

use crate::protocol::ObserverCommand;
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable handle for pushing commands from any thread.
#[derive(Clone, Default)]
pub struct CommandSender {
    queue: Arc<Mutex<Vec<ObserverCommand>>>,
}

impl CommandSender {
    pub fn send(&self, command: ObserverCommand) {
        self.queue.lock().push(command);
    }

    pub fn join(&self, id: u64, x: f64, y: f64, z: f64) {
        self.send(ObserverCommand::Join { id, x, y, z });
    }

    pub fn leave(&self, id: u64) {
        self.send(ObserverCommand::Leave { id });
    }

    pub fn move_to(&self, id: u64, x: f64, y: f64, z: f64) {
        self.send(ObserverCommand::Move { id, x, y, z });
    }
}

/// Receiving side, owned by the scheduler.
#[derive(Default)]
pub struct CommandQueue {
    sender: CommandSender,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Take every queued command in arrival order.
    pub fn drain(&self) -> Vec<ObserverCommand> {
        std::mem::take(&mut *self.sender.queue.lock())
    }

    pub fn len(&self) -> usize {
        self.sender.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_from_cloned_senders_drain_in_order() {
        let queue = CommandQueue::new();
        let a = queue.sender();
        let b = a.clone();

        a.join(1, 0.0, 0.0, 0.0);
        b.move_to(1, 2.0, 0.0, 0.0);
        a.leave(1);
        assert_eq!(queue.len(), 3);

        let drained = queue.drain();
        assert_eq!(drained[0].subject(), "sync.observer.join");
        assert_eq!(drained[2], ObserverCommand::Leave { id: 1 });
        assert!(queue.is_empty());
    }
}
