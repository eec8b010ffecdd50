//! Region quadtree over entity footprints, rebuilt from scratch every tick.
//!
//! The tree owns its nodes in a flat arena; children are arena indices. Entries are
//! `(EntityId, Aabb)` copies, so the tree never borrows from the entity collection.

use crate::entity::EntityId;
use shared::Vec2;

pub const DEFAULT_CAPACITY: usize = 4;
const MAX_DEPTH: usize = 10;

/// Axis-aligned rectangle on the ground plane. Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: Vec2, half_width: f32, half_depth: f32) -> Self {
        Self {
            min: Vec2::new(center.x - half_width, center.y - half_depth),
            max: Vec2::new(center.x + half_width, center.y + half_depth),
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}

#[derive(Debug)]
struct Node {
    bounds: Aabb,
    depth: usize,
    items: Vec<(EntityId, Aabb)>,
    children: Option<[usize; 4]>,
}

impl Node {
    fn new(center: Vec2, half: f32, depth: usize) -> Self {
        Self {
            bounds: Aabb::from_center(center, half, half),
            depth,
            items: Vec::new(),
            children: None,
        }
    }
}

#[derive(Debug)]
pub struct QuadTree {
    nodes: Vec<Node>,
    capacity: usize,
    len: usize,
}

impl QuadTree {
    /// Creates an empty tree covering the square `center ± half_extent`.
    pub fn new(center: Vec2, half_extent: f32) -> Self {
        Self::with_capacity(center, half_extent, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(center: Vec2, half_extent: f32, capacity: usize) -> Self {
        Self {
            nodes: vec![Node::new(center, half_extent, 0)],
            capacity: capacity.max(1),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Stores the footprint at the deepest existing node that fully contains it.
    pub fn insert(&mut self, id: EntityId, footprint: Aabb) {
        let mut idx = 0;
        while let Some(child) = self.child_containing(idx, &footprint) {
            idx = child;
        }

        self.nodes[idx].items.push((id, footprint));
        self.len += 1;

        let node = &self.nodes[idx];
        if node.children.is_none() && node.items.len() > self.capacity && node.depth < MAX_DEPTH {
            self.split(idx);
        }
    }

    /// Returns every entry that may overlap `footprint`.
    ///
    /// All entries on the path from the root are included, plus the contents of every
    /// child region the footprint touches. Entries are never omitted when their
    /// footprints overlap; extra candidates are left to the narrow phase.
    pub fn query(&self, footprint: &Aabb) -> Vec<EntityId> {
        let mut found = Vec::new();
        self.collect(0, footprint, &mut found);
        found
    }

    /// Depth of the node holding `id`, if present.
    pub fn depth_of(&self, id: EntityId) -> Option<usize> {
        self.nodes
            .iter()
            .find(|node| node.items.iter().any(|(item, _)| *item == id))
            .map(|node| node.depth)
    }

    fn child_containing(&self, idx: usize, footprint: &Aabb) -> Option<usize> {
        let children = self.nodes[idx].children?;
        children
            .into_iter()
            .find(|&child| self.nodes[child].bounds.contains(footprint))
    }

    fn collect(&self, idx: usize, footprint: &Aabb, found: &mut Vec<EntityId>) {
        let node = &self.nodes[idx];
        found.extend(node.items.iter().map(|(id, _)| *id));

        if let Some(children) = node.children {
            for child in children {
                if self.nodes[child].bounds.intersects(footprint) {
                    self.collect(child, footprint, found);
                }
            }
        }
    }

    fn split(&mut self, idx: usize) {
        let center = self.nodes[idx].bounds.center();
        let half = (self.nodes[idx].bounds.max.x - self.nodes[idx].bounds.min.x) * 0.25;
        let depth = self.nodes[idx].depth + 1;

        let first = self.nodes.len();
        for (dx, dy) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
            let child_center = Vec2::new(center.x + dx * half, center.y + dy * half);
            self.nodes.push(Node::new(child_center, half, depth));
        }
        let children = [first, first + 1, first + 2, first + 3];
        self.nodes[idx].children = Some(children);

        // Entries move by identity; whatever still straddles a boundary stays here.
        let items = std::mem::take(&mut self.nodes[idx].items);
        for (id, footprint) in items {
            match children
                .into_iter()
                .find(|&child| self.nodes[child].bounds.contains(&footprint))
            {
                Some(child) => self.nodes[child].items.push((id, footprint)),
                None => self.nodes[idx].items.push((id, footprint)),
            }
        }
    }
}
