use flume::{unbounded, Receiver, Sender};

/// Emitted by a derived list after every rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidated;

/// Fan-out of events to any number of subscribers.
///
/// Subscribers whose receiver has been dropped are forgotten on the next emit.
#[derive(Debug)]
pub struct Notifier<E> {
    senders: Vec<Sender<E>>,
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self {
            senders: Vec::new(),
        }
    }
}

impl<E: Clone> Notifier<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<E> {
        let (sender, receiver) = unbounded();
        self.senders.push(sender);
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.len()
    }

    pub fn emit(&mut self, event: E) {
        let before = self.senders.len();
        self.senders.retain(|sender| sender.send(event.clone()).is_ok());
        if self.senders.len() < before {
            log::debug!("Dropped {} subscriber(s)", before - self.senders.len());
        }
    }
}
