//! Broad phase, pair discovery and iterative resolution.
//!
//! Each tick the manager indexes every collidable entity in a fresh [`QuadTree`],
//! collects overlapping `(movable, other)` pairs into an ordered pending set, then
//! resolves pairs one at a time. After a pair is handled, whichever side moved is
//! indexed again at its new position and re-queried, so overlaps uncovered by a
//! correction are processed in the same tick. A per-tick ceiling bounds the loop.

use crate::entity::{CollisionContext, Entity, EntityId};
use crate::spatial::QuadTree;
use log::{trace, warn};
use shared::Vec2;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollisionStats {
    pub indexed: usize,
    pub processed: usize,
    /// Pairs discarded because one side no longer exists.
    pub dropped: usize,
    pub capped: bool,
}

#[derive(Debug)]
pub struct CollisionManager {
    pending: BTreeSet<(EntityId, EntityId)>,
    cap: usize,
}

impl CollisionManager {
    pub fn new(cap: usize) -> Self {
        Self {
            pending: BTreeSet::new(),
            cap: cap.max(1),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Adds a pair to resolve on the next pass. Self-pairs are ignored.
    pub fn queue_pair(&mut self, a: EntityId, b: EntityId) {
        if a != b {
            self.pending.insert((a, b));
        }
    }

    pub fn resolve(
        &mut self,
        entities: &mut BTreeMap<EntityId, Entity>,
        center: Vec2,
        half_extent: f32,
        ctx: &mut CollisionContext<'_>,
    ) -> CollisionStats {
        let mut stats = CollisionStats::default();
        let mut tree = QuadTree::new(center, half_extent);
        for entity in entities.values().filter(|e| e.is_collidable()) {
            tree.insert(entity.id(), entity.body().aabb());
            stats.indexed += 1;
        }

        for entity in entities
            .values()
            .filter(|e| !e.is_static() && e.is_collidable())
        {
            for other in overlapping(&tree, entities, entity) {
                self.pending.insert((entity.id(), other));
            }
        }

        while let Some((a_id, b_id)) = self.pending.pop_first() {
            if stats.processed >= self.cap {
                warn!(
                    "Collision pass hit its ceiling of {} pairs, dropping {} pending",
                    self.cap,
                    self.pending.len() + 1
                );
                stats.capped = true;
                self.pending.clear();
                break;
            }

            let Some(mut a) = entities.remove(&a_id) else {
                warn!("Dropping collision pair ({}, {}): {} is gone", a_id, b_id, a_id);
                stats.dropped += 1;
                continue;
            };
            let Some(b) = entities.get_mut(&b_id) else {
                warn!("Dropping collision pair ({}, {}): {} is gone", a_id, b_id, b_id);
                entities.insert(a_id, a);
                stats.dropped += 1;
                continue;
            };
            if a.is_destroyed() || b.is_destroyed() {
                entities.insert(a_id, a);
                continue;
            }

            stats.processed += 1;
            trace!("Resolving pair ({}, {})", a_id, b_id);

            let pushed = a.handle_push_back(b);
            let outcome_a = a.handle_collision(b, ctx);
            let outcome_b = b.handle_collision(&a, ctx);
            if !b.is_static() {
                self.pending.remove(&(b_id, a_id));
            }

            let b_moved = (pushed && !b.is_static()) || outcome_b.relocated;
            let b_gone = b.is_destroyed() || outcome_b.relocated;
            let a_moved = (pushed && !a.is_static()) || outcome_a.relocated;
            let a_gone = a.is_destroyed() || outcome_a.relocated;
            entities.insert(a_id, a);

            // A relocated or destroyed entity's other pairs describe a stale position.
            if a_gone {
                self.purge(a_id);
            }
            if b_gone {
                self.purge(b_id);
            }
            if a_moved {
                self.requery(&mut tree, entities, a_id);
            }
            if b_moved {
                self.requery(&mut tree, entities, b_id);
            }
        }

        stats
    }

    fn purge(&mut self, id: EntityId) {
        self.pending.retain(|(a, b)| *a != id && *b != id);
    }

    /// Indexes `id` at its current footprint and queues every pair that still needs
    /// separating.
    fn requery(&mut self, tree: &mut QuadTree, entities: &BTreeMap<EntityId, Entity>, id: EntityId) {
        let Some(entity) = entities.get(&id) else {
            return;
        };
        if !entity.is_collidable() || entity.is_static() {
            return;
        }
        tree.insert(id, entity.body().aabb());
        for other_id in overlapping(tree, entities, entity) {
            if let Some(other) = entities.get(&other_id) {
                if entity.solid_with(other) && other.solid_with(entity) {
                    self.pending.insert((id, other_id));
                }
            }
        }
    }
}

/// Ids of entities whose bodies truly overlap `entity`, using the tree as broad phase.
fn overlapping(
    tree: &QuadTree,
    entities: &BTreeMap<EntityId, Entity>,
    entity: &Entity,
) -> Vec<EntityId> {
    let mut candidates = tree.query(&entity.body().aabb());
    candidates.sort_unstable();
    candidates.dedup();
    entity.colliding(candidates.iter().filter_map(|id| entities.get(id)))
}
