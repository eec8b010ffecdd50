//! Roster of connected players and their pre-round choices.

use crate::entity::{EntityId, Side};
use log::info;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Players pick sides and ready up; gameplay entities are not simulated.
    Lobby,
    Active,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub side: Side,
    pub ready: bool,
    /// Avatar controlled by this player while a round is running.
    pub entity: Option<EntityId>,
}

#[derive(Debug)]
pub struct Lobby {
    players: BTreeMap<u32, Player>,
    min_per_side: usize,
}

impl Lobby {
    pub fn new(min_per_side: usize) -> Self {
        Self {
            players: BTreeMap::new(),
            min_per_side: min_per_side.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn count(&self, side: Side) -> usize {
        self.players.values().filter(|p| p.side == side).count()
    }

    /// Players currently controlling an avatar.
    pub fn participants(&self) -> usize {
        self.players.values().filter(|p| p.entity.is_some()).count()
    }

    /// Adds a player on the smaller side, or renames one that is already present.
    pub fn join(&mut self, id: u32, name: Option<&str>) -> Side {
        if let Some(player) = self.players.get_mut(&id) {
            if let Some(name) = name {
                player.name = name.to_string();
            }
            return player.side;
        }

        let side = if self.count(Side::Dog) < self.count(Side::Human) {
            Side::Dog
        } else {
            Side::Human
        };
        let name = name.map_or_else(|| format!("player{}", id), str::to_string);
        info!("Player {} ({}) joined as {:?}", id, name, side);
        self.players.insert(
            id,
            Player {
                id,
                name,
                side,
                ready: false,
                entity: None,
            },
        );
        side
    }

    pub fn leave(&mut self, id: u32) -> Option<Player> {
        let player = self.players.remove(&id)?;
        info!("Player {} left", id);
        Some(player)
    }

    /// Moves a player to the other side. Switching clears their ready flag.
    pub fn switch(&mut self, id: u32) -> Option<Side> {
        let player = self.players.get_mut(&id)?;
        player.side = player.side.other();
        player.ready = false;
        Some(player.side)
    }

    pub fn set_ready(&mut self, id: u32) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.ready = true;
                true
            }
            None => false,
        }
    }

    /// True when everyone is ready and each side has enough players.
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty()
            && self.players.values().all(|p| p.ready)
            && self.count(Side::Human) >= self.min_per_side
            && self.count(Side::Dog) >= self.min_per_side
    }

    /// Forgets every avatar and ready flag, keeping names and sides.
    pub fn reset(&mut self) {
        for player in self.players.values_mut() {
            player.ready = false;
            player.entity = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joiners_balance_sides() {
        let mut lobby = Lobby::new(1);
        assert_eq!(lobby.join(1, None), Side::Human);
        assert_eq!(lobby.join(2, None), Side::Dog);
        assert_eq!(lobby.join(3, Some("cat")), Side::Human);
        assert_eq!(lobby.get(3).unwrap().name, "cat");
        assert_eq!(lobby.get(1).unwrap().name, "player1");
    }

    #[test]
    fn test_rejoin_renames_without_moving() {
        let mut lobby = Lobby::new(1);
        lobby.join(1, None);
        assert_eq!(lobby.join(1, Some("ann")), Side::Human);
        assert_eq!(lobby.len(), 1);
        assert_eq!(lobby.get(1).unwrap().name, "ann");
    }

    #[test]
    fn test_all_ready_requires_both_sides() {
        let mut lobby = Lobby::new(1);
        lobby.join(1, None);
        lobby.set_ready(1);
        assert!(!lobby.all_ready());

        lobby.join(2, None);
        assert!(!lobby.all_ready());
        lobby.set_ready(2);
        assert!(lobby.all_ready());

        lobby.switch(2);
        assert!(!lobby.all_ready());
        assert_eq!(lobby.count(Side::Human), 2);
    }

    #[test]
    fn test_empty_lobby_is_never_ready() {
        let lobby = Lobby::new(1);
        assert!(!lobby.all_ready());
    }

    #[test]
    fn test_reset_clears_ready_and_avatars() {
        let mut lobby = Lobby::new(1);
        lobby.join(1, None);
        lobby.set_ready(1);
        if let Some(player) = lobby.players_mut().next() {
            player.entity = Some(40);
        }
        assert_eq!(lobby.participants(), 1);
        assert_eq!(lobby.get(1).unwrap().entity, Some(40));

        lobby.reset();
        assert_eq!(lobby.participants(), 0);
        assert!(!lobby.get(1).unwrap().ready);
    }

    #[test]
    fn test_unknown_players_are_ignored() {
        let mut lobby = Lobby::new(1);
        assert!(!lobby.set_ready(9));
        assert!(lobby.switch(9).is_none());
        assert!(lobby.leave(9).is_none());
    }
}
