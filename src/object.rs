use std::collections::BTreeMap;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::ability::{ActivatedAbility, StaticAbility, TargetSpec, TriggeredAbility};
use crate::cards::CardDefinition;
use crate::characteristics::Characteristics;
use crate::effect::Effect;
use crate::filter::ObjectFilter;
use crate::ids::{CardId, ObjectId, PlayerId};
use crate::zone::Zone;

/// Types of counters that can be placed on objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum CounterType {
    // P/T modifying counters
    PlusOnePlusOne,
    MinusOneMinusOne,

    Loyalty,
    Charge,
    Lore,
    Stun,
}

/// The kind of game object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum ObjectKind {
    /// A physical card
    Card,
    /// A token permanent
    Token,
}

/// Runtime representation of a game object.
///
/// Holds the printed characteristics plus every component the store tracks
/// for the object: zone, tapped state, damage, counters and attachment.
/// Only [`ObjectStore`](crate::store::ObjectStore) mutates these fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub id: ObjectId,
    pub kind: ObjectKind,
    /// Reference to the card definition (None for tokens created from scratch)
    pub card: Option<CardId>,
    pub zone: Zone,

    // Ownership (owner never changes, controller can)
    pub owner: PlayerId,
    pub controller: PlayerId,

    pub printed: Characteristics,
    pub static_abilities: Vec<StaticAbility>,
    pub activated_abilities: Vec<ActivatedAbility>,
    pub triggered_abilities: Vec<TriggeredAbility>,

    /// What the object does when it resolves as an instant or sorcery.
    pub spell_effects: Vec<Effect>,
    pub spell_targets: Vec<TargetSpec>,
    /// Enchant restriction for Auras.
    pub enchant: Option<ObjectFilter>,

    pub tapped: bool,
    pub damage: u32,
    pub counters: BTreeMap<CounterType, u32>,
    pub attached_to: Option<ObjectId>,
    /// Came under its controller's control since their most recent turn began.
    pub summoning_sick: bool,
}

impl Object {
    pub fn from_definition(id: ObjectId, def: &CardDefinition, owner: PlayerId, zone: Zone) -> Self {
        Self {
            id,
            kind: ObjectKind::Card,
            card: Some(def.id),
            zone,
            owner,
            controller: owner,
            printed: def.characteristics.clone(),
            static_abilities: def.static_abilities.clone(),
            activated_abilities: def.activated_abilities.clone(),
            triggered_abilities: def.triggered_abilities.clone(),
            spell_effects: def.spell_effects.clone(),
            spell_targets: def.spell_targets.clone(),
            enchant: def.enchant.clone(),
            tapped: false,
            damage: 0,
            counters: BTreeMap::new(),
            attached_to: None,
            summoning_sick: false,
        }
    }

    pub fn new_token(id: ObjectId, def: &CardDefinition, controller: PlayerId) -> Self {
        let mut token = Self::from_definition(id, def, controller, Zone::Battlefield);
        token.kind = ObjectKind::Token;
        token.card = None;
        token
    }

    pub fn name(&self) -> &str {
        &self.printed.name
    }

    pub fn is_token(&self) -> bool {
        self.kind == ObjectKind::Token
    }

    pub fn counter_count(&self, counter_type: CounterType) -> u32 {
        self.counters.get(&counter_type).copied().unwrap_or(0)
    }

    pub(crate) fn add_counters(&mut self, counter_type: CounterType, amount: u32) {
        *self.counters.entry(counter_type).or_insert(0) += amount;
    }

    /// Removes up to `amount` counters, returning how many were removed.
    pub(crate) fn remove_counters(&mut self, counter_type: CounterType, amount: u32) -> u32 {
        let Some(current) = self.counters.get_mut(&counter_type) else {
            return 0;
        };
        let removed = (*current).min(amount);
        *current -= removed;
        if *current == 0 {
            self.counters.remove(&counter_type);
        }
        removed
    }

    /// Clears everything a permanent loses when it changes zones (rule 400.7).
    pub(crate) fn reset_for_zone_change(&mut self) {
        self.tapped = false;
        self.damage = 0;
        self.counters.clear();
        self.attached_to = None;
        self.summoning_sick = false;
        self.controller = self.owner;
    }
}
