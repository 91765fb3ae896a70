//! Complete state of one game.
//!
//! `GameState` owns the object store, the continuous effect registry, the
//! stack and the turn structure. It is a plain value: the engine clones it,
//! applies a command to the clone and swaps it in only on success.

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ability::{SourceLeftPolicy, TargetSpec};
use crate::cards::CardDefinition;
use crate::config::{ConfigError, GameConfig};
use crate::continuous::{ContinuousEffect, ContinuousEffectId, ContinuousEffectManager};
use crate::decision::{DecisionId, PendingDecision};
use crate::effect::Effect;
use crate::error::{EngineError, InvariantFailure};
use crate::game_event::GameEvent;
use crate::ids::{IdAllocator, ObjectId, PlayerId};
use crate::object::{CounterType, Object};
use crate::player::Player;
use crate::projection::{ProjectedView, project};
use crate::rules::combat::CombatState;
use crate::snapshot::ObjectSnapshot;
use crate::store::ObjectStore;
use crate::triggers::{TriggerQueue, TriggeredAbilityEntry};
use crate::turn::PriorityTracker;
use crate::types::CardType;
use crate::zone::Zone;

/// Game phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Phase {
    Beginning,
    FirstMain,
    Combat,
    NextMain,
    Ending,
}

/// Steps within phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Step {
    // Beginning phase
    Untap,
    Upkeep,
    Draw,
    // Combat phase
    BeginCombat,
    DeclareAttackers,
    DeclareBlockers,
    CombatDamage,
    EndCombat,
    // Ending phase
    End,
    Cleanup,
}

/// Turn state tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct TurnState {
    pub active_player: PlayerId,
    pub priority_player: Option<PlayerId>,
    pub turn_number: u32,
    pub phase: Phase,
    pub step: Option<Step>,
}

impl TurnState {
    pub fn new(active_player: PlayerId) -> Self {
        Self {
            active_player,
            priority_player: Some(active_player),
            turn_number: 1,
            phase: Phase::Beginning,
            step: Some(Step::Untap),
        }
    }
}

/// A chosen target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Target {
    Object(ObjectId),
    Player(PlayerId),
}

/// How the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum GameResult {
    Winner(PlayerId),
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum StackEntryKind {
    Spell,
    ActivatedAbility,
    TriggeredAbility,
}

/// An object on the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    /// For spells, the card itself. Abilities get a fresh id.
    pub id: ObjectId,
    pub source: ObjectId,
    pub controller: PlayerId,
    pub kind: StackEntryKind,
    pub effects: Vec<Effect>,
    pub target_specs: Vec<TargetSpec>,
    pub targets: Vec<Target>,
    /// The source as it was when the entry was put on the stack.
    pub source_snapshot: Option<ObjectSnapshot>,
    pub source_left: SourceLeftPolicy,
    pub description: String,
}

impl StackEntry {
    pub fn is_spell(&self) -> bool {
        self.kind == StackEntryKind::Spell
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub store: ObjectStore,
    pub effects: ContinuousEffectManager,
    pub ids: IdAllocator,
    pub turn: TurnState,
    /// Players in turn order.
    pub turn_order: Vec<PlayerId>,
    /// Bottom first.
    pub stack: Vec<StackEntry>,
    pub trigger_queue: TriggerQueue,
    /// Triggers whose order is fixed, waiting to be put on the stack front
    /// first.
    pub staged_triggers: Vec<TriggeredAbilityEntry>,
    pub pending_decision: Option<PendingDecision>,
    pub combat: CombatState,
    pub priority: PriorityTracker,
    pub config: GameConfig,
    pub result: Option<GameResult>,
    next_decision: u64,
}

impl GameState {
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let turn_order: Vec<PlayerId> = (0..config.player_names.len())
            .map(|i| PlayerId::from_index(i as u8))
            .collect();
        let players = config
            .player_names
            .iter()
            .zip(&turn_order)
            .map(|(name, &id)| Player::new(id, name.clone(), config.starting_life))
            .collect();
        let first = turn_order[0];
        Ok(Self {
            store: ObjectStore::new(players),
            effects: ContinuousEffectManager::new(),
            ids: IdAllocator::new(),
            turn: TurnState::new(first),
            priority: PriorityTracker::new(turn_order.len()),
            turn_order,
            stack: Vec::new(),
            trigger_queue: TriggerQueue::new(),
            staged_triggers: Vec::new(),
            pending_decision: None,
            combat: CombatState::default(),
            config,
            result: None,
            next_decision: 1,
        })
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.store.player(id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.store.get(id)
    }

    pub fn active_player(&self) -> PlayerId {
        self.turn.active_player
    }

    pub fn is_in_game(&self, player: PlayerId) -> bool {
        self.player(player).is_some_and(Player::is_in_game)
    }

    /// Players still in the game, in turn order.
    pub fn players_in_game(&self) -> Vec<PlayerId> {
        self.turn_order
            .iter()
            .copied()
            .filter(|&p| self.is_in_game(p))
            .collect()
    }

    /// Players still in the game starting with the active player (rule 101.4).
    pub fn apnap_order(&self) -> Vec<PlayerId> {
        let n = self.turn_order.len();
        let start = self
            .turn_order
            .iter()
            .position(|&p| p == self.turn.active_player)
            .unwrap_or(0);
        (0..n)
            .map(|i| self.turn_order[(start + i) % n])
            .filter(|&p| self.is_in_game(p))
            .collect()
    }

    pub fn stack_is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn is_game_over(&self) -> bool {
        self.result.is_some()
    }

    /// Project the current characteristics of everything.
    pub fn project(&self) -> Result<ProjectedView, EngineError> {
        project(&self.store, &self.effects)
    }

    // ---------------------------------------------------------------------
    // Setup
    // ---------------------------------------------------------------------

    /// Create a card owned by `owner` in a zone. Permanents put directly onto
    /// the battlefield this way are not summoning sick and raise no events.
    pub fn add_card(
        &mut self,
        def: &CardDefinition,
        owner: PlayerId,
        zone: Zone,
    ) -> Result<ObjectId, EngineError> {
        let id = self.ids.next_object_id();
        let mut obj = Object::from_definition(id, def, owner, zone);
        if zone == Zone::Battlefield {
            enter_with_loyalty(&mut obj);
        }
        self.store.insert(obj);
        if zone == Zone::Battlefield {
            self.register_static_abilities(id)?;
        }
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    pub fn next_timestamp(&mut self) -> u64 {
        self.ids.next_timestamp()
    }

    /// Register a continuous effect, stamping it with the next timestamp and
    /// binding controller-relative durations.
    pub fn add_continuous_effect(
        &mut self,
        mut effect: ContinuousEffect,
    ) -> Result<ContinuousEffectId, InvariantFailure> {
        effect.timestamp = self.next_timestamp();
        effect.duration = effect.duration.bind(effect.controller);
        self.effects.add_effect(effect)
    }

    /// A permanent's static abilities start applying, timestamped now.
    pub(crate) fn register_static_abilities(&mut self, id: ObjectId) -> Result<(), InvariantFailure> {
        let obj = self.store.get(id).ok_or(InvariantFailure::UnknownObject(id))?;
        let controller = obj.controller;
        let generated: Vec<ContinuousEffect> = obj
            .static_abilities
            .iter()
            .map(|ability| ability.to_effect(id, controller))
            .collect();
        for effect in generated {
            self.add_continuous_effect(effect)?;
        }
        Ok(())
    }

    /// Move an object between zones. Leaving the battlefield ends every
    /// effect that names the object and every effect from its static
    /// abilities.
    pub(crate) fn move_object(&mut self, id: ObjectId, to: Zone) -> Result<(), InvariantFailure> {
        if self.relocate(id, to)? {
            self.register_static_abilities(id)?;
        }
        Ok(())
    }

    /// Put an object onto the battlefield under `controller`'s control.
    pub(crate) fn put_onto_battlefield(
        &mut self,
        id: ObjectId,
        controller: PlayerId,
    ) -> Result<(), InvariantFailure> {
        let entered = self.relocate(id, Zone::Battlefield)?;
        self.store.set_base_controller(id, controller)?;
        if entered {
            self.register_static_abilities(id)?;
        }
        Ok(())
    }

    /// Returns whether the object entered the battlefield from another zone.
    fn relocate(&mut self, id: ObjectId, to: Zone) -> Result<bool, InvariantFailure> {
        let from = self
            .store
            .get(id)
            .ok_or(InvariantFailure::UnknownObject(id))?
            .zone;
        if from == Zone::Battlefield && to != Zone::Battlefield {
            let ended = self.effects.remove_effects_from_source(id)
                + self.effects.remove_effects_targeting(id);
            if ended > 0 {
                debug!(object = %id, ended, "effects ended by zone change");
            }
            self.combat.remove(id);
        }
        self.store.move_to_zone(id, to)?;
        let entered = to == Zone::Battlefield && from != Zone::Battlefield;
        if entered {
            enter_with_loyalty(self.store.object_mut(id)?);
        }
        Ok(entered)
    }

    pub(crate) fn create_token(
        &mut self,
        def: &CardDefinition,
        controller: PlayerId,
    ) -> Result<ObjectId, InvariantFailure> {
        let id = self.ids.next_object_id();
        self.store.insert(Object::new_token(id, def, controller));
        self.register_static_abilities(id)?;
        Ok(id)
    }

    pub(crate) fn draw_cards(
        &mut self,
        player: PlayerId,
        count: u32,
    ) -> Result<Vec<ObjectId>, InvariantFailure> {
        let mut drawn = Vec::new();
        for _ in 0..count {
            match self.store.draw(player)? {
                Some(card) => drawn.push(card),
                None => break,
            }
        }
        Ok(drawn)
    }

    pub(crate) fn deal_damage(
        &mut self,
        source: ObjectId,
        target: Target,
        amount: u32,
    ) -> Result<(), InvariantFailure> {
        match target {
            Target::Player(player) => {
                self.store.damage_player(source, player, amount);
                Ok(())
            }
            Target::Object(id) => {
                // Damage to a planeswalker removes loyalty instead.
                let is_planeswalker = self
                    .store
                    .get(id)
                    .is_some_and(|o| o.printed.has_card_type(CardType::Planeswalker));
                self.store.mark_damage(source, id, amount)?;
                if is_planeswalker {
                    self.store.clear_damage(id)?;
                    self.store
                        .remove_counters(id, CounterType::Loyalty, amount)?;
                }
                Ok(())
            }
        }
    }

    pub(crate) fn record_event(&mut self, event: GameEvent) {
        self.store.record(event);
    }

    pub(crate) fn next_decision_id(&mut self) -> DecisionId {
        let id = DecisionId(self.next_decision);
        self.next_decision += 1;
        id
    }
}

/// A planeswalker enters with its printed loyalty in loyalty counters.
fn enter_with_loyalty(obj: &mut Object) {
    if let Some(loyalty) = obj.printed.loyalty
        && obj.printed.has_card_type(CardType::Planeswalker)
    {
        obj.add_counters(CounterType::Loyalty, loyalty);
    }
}
