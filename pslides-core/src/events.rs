//! Deck notifications.
//!
//! Fire-and-forget: every subscriber gets its own channel, and subscribers
//! that dropped their receiver are pruned on the next emit.

use std::sync::mpsc::{channel, Receiver, Sender};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deck::DeckMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeckEvent {
    SlideChanged {
        slide: Uuid,
        index: usize,
        /// The slide that was current before, if any.
        previous: Option<Uuid>,
    },
    Finished,
    ClockStarted { timestamp: i64, elapsed: i64 },
    ClockStopped { elapsed: i64 },
    ClockSet { elapsed: i64 },
    FragmentToggled {
        slide: Uuid,
        fragments: Vec<Uuid>,
        activated: bool,
    },
    ModeChanged { mode: DeckMode },
}

#[derive(Debug, Default)]
pub struct EventEmitter {
    subscribers: Vec<Sender<DeckEvent>>,
}

impl EventEmitter {
    pub fn subscribe(&mut self) -> Receiver<DeckEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: DeckEvent) {
        log::trace!("emit {:?} to {} subscriber(s)", event, self.subscribers.len());
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives() {
        let mut emitter = EventEmitter::default();
        let a = emitter.subscribe();
        let b = emitter.subscribe();
        emitter.emit(DeckEvent::Finished);
        assert_eq!(a.try_recv(), Ok(DeckEvent::Finished));
        assert_eq!(b.try_recv(), Ok(DeckEvent::Finished));
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut emitter = EventEmitter::default();
        let kept = emitter.subscribe();
        drop(emitter.subscribe());
        emitter.emit(DeckEvent::ClockSet { elapsed: 0 });
        assert_eq!(emitter.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(DeckEvent::ClockStopped { elapsed: 3500 }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "clock_stopped", "elapsed": 3500 }));
    }
}
