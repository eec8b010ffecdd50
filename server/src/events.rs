//! Per-tick collation of inbound events.

use shared::{Event, EventKind};
use std::collections::BTreeMap;

/// One tick's worth of events, split the way the simulation consumes them.
#[derive(Debug, Default)]
pub struct Collated {
    /// Join/leave/switch/ready, in arrival order.
    pub lifecycle: Vec<Event>,
    /// Remaining events per player: one per kind, sorted by kind.
    pub by_player: BTreeMap<u32, Vec<Event>>,
}

impl Collated {
    pub fn events_for(&self, player_id: u32) -> &[Event] {
        self.by_player
            .get(&player_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Default)]
pub struct EventManager;

impl EventManager {
    pub fn collate(events: Vec<Event>) -> Collated {
        let mut lifecycle = Vec::new();
        let mut grouped: BTreeMap<u32, BTreeMap<EventKind, Event>> = BTreeMap::new();

        for event in events {
            if event.kind.is_lifecycle() {
                lifecycle.push(event);
            } else {
                // Later events of the same kind replace earlier ones.
                grouped
                    .entry(event.player_id)
                    .or_default()
                    .insert(event.kind, event);
            }
        }

        let by_player = grouped
            .into_iter()
            .map(|(player, kinds)| (player, kinds.into_values().collect()))
            .collect();

        Collated {
            lifecycle,
            by_player,
        }
    }
}
