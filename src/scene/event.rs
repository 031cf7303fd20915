//! Scene Change Notifications
//!
//! Every scene mutator that could affect a display list emits an event into
//! a single queue. The engine drains the queue at the start of each tick
//! (and before any on-demand list read) and routes each event through the
//! entity watcher, which decides whether it dirties the caches.
//!
//! This is the drained-queue rendition of a property-change subscription
//! graph: subscription state lives in the watcher, not in the entities, so
//! a change to an unwatched entity costs one enum push and nothing else.

use super::entity::Entity;
use super::sprite::SpriteId;
use super::viewport::ViewportId;

/// A queue for events of a single type.
/// Events are collected during the tick and drained at specific points.
#[derive(Debug)]
pub(crate) struct EventQueue<T> {
    events: Vec<T>,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Send an event (add to queue)
    pub fn send(&mut self, event: T) {
        self.events.push(event);
    }

    /// Drain all events (returns iterator and clears queue)
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.events.drain(..)
    }

    /// Check if there are any events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events in queue
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One observable change to the scene.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SceneEvent {
    /// A watched-class property of an entity changed value (visibility,
    /// enabled flag, position, or render layer). The watcher raises the
    /// same coarse dirty signal for all of them, so the event does not
    /// say which one.
    EntityChanged { entity: Entity },

    /// An entity was reparented (affects inherited visibility and the
    /// ancestor chains the watcher must cover).
    ParentChanged { child: Entity },

    /// An entity's animation was replaced, cleared, or advanced a frame
    /// (the current sprite - and hence its draw-order key - may differ).
    AnimationChanged { entity: Entity },

    /// A sprite's position changed; relevant only to entities whose
    /// current animation frame shows this sprite.
    SpriteChanged { sprite: SpriteId },

    /// Reachability may have changed: object added to / removed from a
    /// room, background replaced, overlay set edited, current room
    /// switched, or an entity anchored to a different viewport.
    StructureChanged,

    /// An entity left the scene entirely.
    EntityDespawned { entity: Entity },

    /// A viewport's display settings changed.
    ViewportChanged { viewport: ViewportId },

    /// A viewport was removed from the scene.
    ViewportRemoved { viewport: ViewportId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_queue() {
        let mut queue: EventQueue<i32> = EventQueue::new();

        queue.send(1);
        queue.send(2);
        queue.send(3);

        assert_eq!(queue.len(), 3);

        let collected: Vec<_> = queue.drain().collect();
        assert_eq!(collected, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }
}
