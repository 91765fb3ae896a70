//! Entity/component store.
//!
//! Owns every object and player of a game. All component mutations go through
//! the methods here, and each one that a trigger could observe appends a raw
//! [`GameEvent`] to the store's log. The log is drained once per atomic
//! mutation batch by the trigger collector.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::InvariantFailure;
use crate::game_event::{DamageTarget, GameEvent};
use crate::ids::{ObjectId, PlayerId};
use crate::object::{CounterType, Object};
use crate::player::Player;
use crate::zone::Zone;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectStore {
    objects: BTreeMap<ObjectId, Object>,
    players: Vec<Player>,
    /// Permanents in the order they entered.
    battlefield: Vec<ObjectId>,
    exile: Vec<ObjectId>,
    events: Vec<GameEvent>,
}

impl ObjectStore {
    pub fn new(players: Vec<Player>) -> Self {
        Self {
            players,
            ..Self::default()
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.index())
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn battlefield(&self) -> &[ObjectId] {
        &self.battlefield
    }

    pub fn exile(&self) -> &[ObjectId] {
        &self.exile
    }

    /// Events recorded since the last [`take_events`](Self::take_events).
    pub fn pending_events(&self) -> &[GameEvent] {
        &self.events
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object, InvariantFailure> {
        self.objects
            .get_mut(&id)
            .ok_or(InvariantFailure::UnknownObject(id))
    }

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.index())
    }

    pub(crate) fn record(&mut self, event: GameEvent) {
        trace!(?event, "recorded");
        self.events.push(event);
    }

    pub(crate) fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Adds a new object to its zone. Tokens entering the battlefield record a
    /// zone change from nowhere.
    pub(crate) fn insert(&mut self, object: Object) {
        let id = object.id;
        let zone = object.zone;
        let owner = object.owner;
        let created_on_battlefield = object.is_token() && zone == Zone::Battlefield;
        self.objects.insert(id, object);
        self.push_to_zone(id, owner, zone);
        if created_on_battlefield {
            if let Some(obj) = self.objects.get_mut(&id) {
                obj.summoning_sick = true;
            }
            self.record(GameEvent::ZoneChanged {
                object: id,
                from: None,
                to: zone,
            });
        }
    }

    /// Removes an object from the game entirely (a token ceasing to exist).
    pub(crate) fn remove(&mut self, id: ObjectId) -> Result<Object, InvariantFailure> {
        let object = self
            .objects
            .remove(&id)
            .ok_or(InvariantFailure::UnknownObject(id))?;
        self.remove_from_zone(id, object.owner, object.zone);
        Ok(object)
    }

    /// Moves an object to a new zone. The object keeps its id but loses its
    /// tapped state, damage, counters, attachment and control change.
    pub(crate) fn move_to_zone(&mut self, id: ObjectId, to: Zone) -> Result<(), InvariantFailure> {
        let obj = self.object_mut(id)?;
        let from = obj.zone;
        let owner = obj.owner;
        obj.reset_for_zone_change();
        obj.zone = to;
        if to == Zone::Battlefield {
            obj.summoning_sick = true;
        }

        self.remove_from_zone(id, owner, from);
        self.push_to_zone(id, owner, to);

        // Anything attached to a permanent that left stays where it is; the
        // state-based checks deal with it.
        self.record(GameEvent::ZoneChanged {
            object: id,
            from: Some(from),
            to,
        });
        Ok(())
    }

    /// Sets the tapped state. Returns whether it changed.
    pub(crate) fn set_tapped(&mut self, id: ObjectId, tapped: bool) -> Result<bool, InvariantFailure> {
        let obj = self.object_mut(id)?;
        if obj.tapped == tapped {
            return Ok(false);
        }
        obj.tapped = tapped;
        self.record(if tapped {
            GameEvent::Tapped { object: id }
        } else {
            GameEvent::Untapped { object: id }
        });
        Ok(true)
    }

    pub(crate) fn mark_damage(
        &mut self,
        source: ObjectId,
        id: ObjectId,
        amount: u32,
    ) -> Result<(), InvariantFailure> {
        if amount == 0 {
            return Ok(());
        }
        let obj = self.object_mut(id)?;
        obj.damage = obj.damage.saturating_add(amount);
        self.record(GameEvent::DamageDealt {
            source,
            target: DamageTarget::Object(id),
            amount,
        });
        Ok(())
    }

    pub(crate) fn clear_damage(&mut self, id: ObjectId) -> Result<(), InvariantFailure> {
        self.object_mut(id)?.damage = 0;
        Ok(())
    }

    pub(crate) fn add_counters(
        &mut self,
        id: ObjectId,
        counter: CounterType,
        count: u32,
    ) -> Result<(), InvariantFailure> {
        if count == 0 {
            return Ok(());
        }
        self.object_mut(id)?.add_counters(counter, count);
        self.record(GameEvent::CountersPut {
            object: id,
            counter,
            count,
        });
        Ok(())
    }

    /// Removes up to `count` counters, returning how many were removed.
    pub(crate) fn remove_counters(
        &mut self,
        id: ObjectId,
        counter: CounterType,
        count: u32,
    ) -> Result<u32, InvariantFailure> {
        Ok(self.object_mut(id)?.remove_counters(counter, count))
    }

    pub(crate) fn attach(&mut self, id: ObjectId, to: ObjectId) -> Result<(), InvariantFailure> {
        if !self.contains(to) {
            return Err(InvariantFailure::UnknownObject(to));
        }
        self.object_mut(id)?.attached_to = Some(to);
        Ok(())
    }

    pub(crate) fn detach(&mut self, id: ObjectId) -> Result<(), InvariantFailure> {
        self.object_mut(id)?.attached_to = None;
        Ok(())
    }

    /// Sets the controller recorded on the object itself, for example a
    /// permanent spell resolving under its caster's control. Control-changing
    /// effects go through the layer system instead.
    pub(crate) fn set_base_controller(
        &mut self,
        id: ObjectId,
        controller: PlayerId,
    ) -> Result<(), InvariantFailure> {
        self.object_mut(id)?.controller = controller;
        Ok(())
    }

    pub(crate) fn set_summoning_sick(&mut self, id: ObjectId, sick: bool) -> Result<(), InvariantFailure> {
        self.object_mut(id)?.summoning_sick = sick;
        Ok(())
    }

    pub(crate) fn gain_life(&mut self, player: PlayerId, amount: u32) {
        if let Some(p) = self.player_mut(player) {
            p.gain_life(amount);
            self.record(GameEvent::LifeGained { player, amount });
        }
    }

    pub(crate) fn lose_life(&mut self, player: PlayerId, amount: u32) {
        if amount == 0 {
            return;
        }
        if let Some(p) = self.player_mut(player) {
            p.lose_life(amount);
            self.record(GameEvent::LifeLost { player, amount });
        }
    }

    /// Damage to a player is life loss plus a damage event.
    pub(crate) fn damage_player(&mut self, source: ObjectId, player: PlayerId, amount: u32) {
        if amount == 0 {
            return;
        }
        self.lose_life(player, amount);
        self.record(GameEvent::DamageDealt {
            source,
            target: DamageTarget::Player(player),
            amount,
        });
    }

    /// Draws the top card of a library. Drawing from an empty library sets the
    /// player's loss flag and returns `None`.
    pub(crate) fn draw(&mut self, player: PlayerId) -> Result<Option<ObjectId>, InvariantFailure> {
        let Some(p) = self.player_mut(player) else {
            return Ok(None);
        };
        let Some(card) = p.top_of_library() else {
            p.drew_from_empty_library = true;
            return Ok(None);
        };
        self.move_to_zone(card, Zone::Hand)?;
        self.record(GameEvent::CardDrawn {
            player,
            object: card,
        });
        Ok(Some(card))
    }

    pub(crate) fn mark_lost(&mut self, player: PlayerId) {
        if let Some(p) = self.player_mut(player)
            && !p.has_lost
        {
            p.has_lost = true;
            self.record(GameEvent::PlayerLost { player });
        }
    }

    fn push_to_zone(&mut self, id: ObjectId, owner: PlayerId, zone: Zone) {
        match zone {
            Zone::Battlefield => self.battlefield.push(id),
            Zone::Exile => self.exile.push(id),
            Zone::Library | Zone::Hand | Zone::Graveyard => {
                if let Some(p) = self.player_mut(owner) {
                    match zone {
                        Zone::Library => p.library.push(id),
                        Zone::Hand => p.hand.push(id),
                        _ => p.graveyard.push(id),
                    }
                }
            }
            // Stack order is kept by the game state.
            Zone::Stack | Zone::Command => {}
        }
    }

    fn remove_from_zone(&mut self, id: ObjectId, owner: PlayerId, zone: Zone) {
        match zone {
            Zone::Battlefield => self.battlefield.retain(|&o| o != id),
            Zone::Exile => self.exile.retain(|&o| o != id),
            Zone::Library | Zone::Hand | Zone::Graveyard => {
                if let Some(p) = self.player_mut(owner) {
                    let list = match zone {
                        Zone::Library => &mut p.library,
                        Zone::Hand => &mut p.hand,
                        _ => &mut p.graveyard,
                    };
                    list.retain(|&o| o != id);
                }
            }
            Zone::Stack | Zone::Command => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures;

    fn store_with_bears() -> (ObjectStore, ObjectId) {
        let mut store = ObjectStore::new(vec![
            Player::new(PlayerId::from_index(0), "Alice", 20),
            Player::new(PlayerId::from_index(1), "Bob", 20),
        ]);
        let id = ObjectId::from_raw(1);
        store.insert(Object::from_definition(
            id,
            &fixtures::grizzly_bears(),
            PlayerId::from_index(0),
            Zone::Hand,
        ));
        (store, id)
    }

    #[test]
    fn test_zone_lists_follow_moves() {
        let (mut store, id) = store_with_bears();
        let alice = PlayerId::from_index(0);
        assert_eq!(store.player(alice).unwrap().hand, vec![id]);

        store.move_to_zone(id, Zone::Battlefield).unwrap();
        assert!(store.player(alice).unwrap().hand.is_empty());
        assert_eq!(store.battlefield(), &[id]);
        assert!(store.get(id).unwrap().summoning_sick);

        store.move_to_zone(id, Zone::Graveyard).unwrap();
        assert!(store.battlefield().is_empty());
        assert_eq!(store.player(alice).unwrap().graveyard, vec![id]);
    }

    #[test]
    fn test_mutations_are_logged() {
        let (mut store, id) = store_with_bears();
        store.move_to_zone(id, Zone::Battlefield).unwrap();
        store.set_tapped(id, true).unwrap();
        assert!(!store.set_tapped(id, true).unwrap());
        store.add_counters(id, CounterType::PlusOnePlusOne, 2).unwrap();

        let events = store.take_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], GameEvent::Tapped { object } if object == id));
        assert!(store.pending_events().is_empty());
    }

    #[test]
    fn test_zone_change_wipes_components() {
        let (mut store, id) = store_with_bears();
        store.move_to_zone(id, Zone::Battlefield).unwrap();
        store.mark_damage(id, id, 1).unwrap();
        store.add_counters(id, CounterType::PlusOnePlusOne, 1).unwrap();
        store.set_tapped(id, true).unwrap();

        store.move_to_zone(id, Zone::Hand).unwrap();
        let obj = store.get(id).unwrap();
        assert_eq!(obj.damage, 0);
        assert!(obj.counters.is_empty());
        assert!(!obj.tapped);
    }

    #[test]
    fn test_draw_from_empty_library_sets_flag() {
        let (mut store, _) = store_with_bears();
        let bob = PlayerId::from_index(1);
        assert_eq!(store.draw(bob).unwrap(), None);
        assert!(store.player(bob).unwrap().drew_from_empty_library);
    }

    #[test]
    fn test_damage_saturates() {
        let (mut store, id) = store_with_bears();
        store.mark_damage(id, id, u32::MAX).unwrap();
        store.mark_damage(id, id, 5).unwrap();
        assert_eq!(store.get(id).unwrap().damage, u32::MAX);
    }
}
