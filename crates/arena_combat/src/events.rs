//! Visual combat events.
//!
//! Damage numbers and gold bounties are gameplay *outputs*: the simulation
//! appends them to a small per-entity ring and presentation layers consume
//! them through a per-viewer cursor. The ring is capped so a neglected
//! entity never grows unboundedly; the cursor guarantees each event is
//! delivered exactly once per viewer whatever the viewer's frame rate.

use arena_clock::Tick;
use arena_ecs::{BufferComponent, Component};
use serde::{Deserialize, Serialize};

/// What a visual event shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisualKind {
    /// Red damage number.
    Damage,
    /// Gold bounty number.
    Bounty,
}

/// One floating combat number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualEvent {
    /// Displayed amount.
    pub amount: i32,
    /// Damage or bounty.
    pub kind: VisualKind,
    /// Tick the event happened on.
    pub tick: Tick,
}

/// Capped ring of [`VisualEvent`]s on one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualEvents {
    events: Vec<VisualEvent>,
}

impl VisualEvents {
    /// Maximum retained events; the oldest is evicted beyond this.
    pub const CAPACITY: usize = 10;

    /// All retained events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[VisualEvent] {
        &self.events
    }
}

impl Component for VisualEvents {
    fn type_name() -> &'static str {
        "VisualEvents"
    }
}

impl BufferComponent for VisualEvents {
    type Element = VisualEvent;
    fn push(&mut self, element: VisualEvent) {
        if self.events.len() >= Self::CAPACITY {
            self.events.remove(0);
        }
        self.events.push(element);
    }
}

/// A viewer's read position into an entity's [`VisualEvents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerCursor {
    last_seen: Tick,
}

impl Default for ViewerCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerCursor {
    /// A cursor that has seen nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_seen: Tick::INVALID,
        }
    }

    /// Yield every event newer than this cursor and advance it.
    ///
    /// Events from the same tick are delivered together; calling again
    /// without new events yields nothing, so each event reaches a viewer
    /// exactly once.
    pub fn take_newer<'a>(&mut self, events: &'a VisualEvents) -> Vec<&'a VisualEvent> {
        let fresh: Vec<&VisualEvent> = events
            .events()
            .iter()
            .filter(|event| {
                !self.last_seen.is_valid() || event.tick.is_newer_than(self.last_seen)
            })
            .collect();
        if let Some(newest) = fresh.iter().map(|e| e.tick).max_by(|a, b| {
            if a.is_newer_than(*b) {
                std::cmp::Ordering::Greater
            } else if b.is_newer_than(*a) {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        }) {
            self.last_seen = newest;
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn damage(amount: i32, tick: u32) -> VisualEvent {
        VisualEvent {
            amount,
            kind: VisualKind::Damage,
            tick: Tick::new(tick),
        }
    }

    #[test]
    fn test_ring_evicts_oldest_at_capacity() {
        let mut events = VisualEvents::default();
        for i in 0..(VisualEvents::CAPACITY as i32 + 3) {
            events.push(damage(i, i as u32));
        }
        assert_eq!(events.events().len(), VisualEvents::CAPACITY);
        assert_eq!(events.events()[0].amount, 3);
    }

    #[test]
    fn test_cursor_yields_each_event_once() {
        let mut events = VisualEvents::default();
        events.push(damage(30, 5));
        events.push(damage(40, 6));

        let mut cursor = ViewerCursor::new();
        let first = cursor.take_newer(&events);
        assert_eq!(first.len(), 2);
        assert!(cursor.take_newer(&events).is_empty());

        events.push(damage(25, 7));
        let second = cursor.take_newer(&events);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].amount, 25);
    }

    #[test]
    fn test_two_viewers_have_independent_cursors() {
        let mut events = VisualEvents::default();
        events.push(damage(10, 1));

        let mut fast = ViewerCursor::new();
        let mut slow = ViewerCursor::new();
        assert_eq!(fast.take_newer(&events).len(), 1);
        events.push(damage(20, 2));
        assert_eq!(fast.take_newer(&events).len(), 1);
        // The slow viewer polls late and still sees both, once.
        assert_eq!(slow.take_newer(&events).len(), 2);
        assert!(slow.take_newer(&events).is_empty());
    }

    #[test]
    fn test_same_tick_events_delivered_together() {
        let mut events = VisualEvents::default();
        events.push(damage(5, 3));
        events.push(damage(6, 3));
        let mut cursor = ViewerCursor::new();
        assert_eq!(cursor.take_newer(&events).len(), 2);
        assert!(cursor.take_newer(&events).is_empty());
    }
}
