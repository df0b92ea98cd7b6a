use serde::Serialize;
use tokio::sync::mpsc;

use crate::types::GameEvent;

/// Receives every event the game publishes.
pub trait Observer: Send {
    fn notify(&mut self, event: &GameEvent);
}

impl<F> Observer for F
where
    F: FnMut(&GameEvent) + Send,
{
    fn notify(&mut self, event: &GameEvent) {
        (self)(event)
    }
}

/// Forwards events into a channel; a closed receiver is ignored.
pub struct ChannelObserver(pub mpsc::UnboundedSender<GameEvent>);

impl Observer for ChannelObserver {
    fn notify(&mut self, event: &GameEvent) {
        let _ = self.0.send(event.clone());
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct NotificationBus {
    next_id: u64,
    observers: Vec<(SubscriptionId, Box<dyn Observer>)>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn Observer>) -> SubscriptionId {
        self.next_id = self.next_id.saturating_add(1);
        let id = SubscriptionId(self.next_id);
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn publish(&mut self, event: &GameEvent) {
        for (_, observer) in &mut self.observers {
            observer.notify(event);
        }
    }

    pub fn publish_all(&mut self, events: &[GameEvent]) {
        for event in events {
            self.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::types::Coord;

    #[test]
    fn observers_receive_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut bus = NotificationBus::new();
        bus.subscribe(Box::new(move |event: &GameEvent| {
            sink.lock().expect("lock").push(event.clone());
        }));

        let events = vec![
            GameEvent::PointCleared {
                at: Coord::new(1, 1),
            },
            GameEvent::KeyCollected { key: 0 },
        ];
        bus.publish_all(&events);
        assert_eq!(*seen.lock().expect("lock"), events);
    }

    #[test]
    fn unsubscribed_observers_stop_receiving() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bus = NotificationBus::new();
        let id = bus.subscribe(Box::new(ChannelObserver(tx)));
        bus.publish(&GameEvent::KeyCollected { key: 1 });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&GameEvent::KeyCollected { key: 2 });

        assert_eq!(rx.try_recv().ok(), Some(GameEvent::KeyCollected { key: 1 }));
        assert!(rx.try_recv().is_err());
    }
}
