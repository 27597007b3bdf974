use crossbeam::channel::{self, Receiver, Sender};
use crate::{FileId, PlaylistDefinition};

/// Notifications a playlist publishes to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistEvent {
    LoadStart { name: String },
    Load { songs: usize },
    Change,
    Reset,
    Add { fid: FileId },
    Remove { fid: FileId },
    /// Songs were removed from the playlist itself; the new definition should be saved.
    DefinitionUpdate(PlaylistDefinition),
    SelectionChange { selected: usize },
}

/// Fan-out of events to any number of channel subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<PlaylistEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<PlaylistEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Send to every live subscriber, dropping the ones whose receiver is gone.
    pub fn emit(&mut self, event: PlaylistEvent) {
        log::trace!("playlist event: {:?}", event);
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut bus = EventBus::default();
        let kept = bus.subscribe();
        let dropped = bus.subscribe();
        drop(dropped);

        bus.emit(PlaylistEvent::Change);
        assert_eq!(bus.subscribers.len(), 1);
        assert_eq!(kept.try_recv(), Ok(PlaylistEvent::Change));
    }
}
