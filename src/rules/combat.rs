//! Combat: declarations, legality and combat damage.
//!
//! Legality is read off the projected view, so keywords granted or removed by
//! continuous effects count.

use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::characteristics::Keyword;
use crate::error::{EngineError, IllegalAction};
use crate::game_state::{GameState, Step, Target};
use crate::ids::{ObjectId, PlayerId};
use crate::projection::ProjectedView;
use crate::zone::Zone;

/// An attacking creature and the player it attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct AttackerInfo {
    pub creature: ObjectId,
    pub defender: PlayerId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct CombatState {
    pub attackers: Vec<AttackerInfo>,
    /// Attacker to its blockers in damage assignment order. An attacker stays
    /// blocked even if its blockers leave combat.
    pub blockers: BTreeMap<ObjectId, Vec<ObjectId>>,
    pub attackers_declared: bool,
    /// Defending players who have declared blockers.
    pub blocks_declared: BTreeSet<PlayerId>,
}

impl CombatState {
    pub fn is_attacking(&self, creature: ObjectId) -> bool {
        self.attackers.iter().any(|a| a.creature == creature)
    }

    pub fn is_blocking(&self, creature: ObjectId) -> bool {
        self.blockers.values().any(|b| b.contains(&creature))
    }

    pub fn is_blocked(&self, attacker: ObjectId) -> bool {
        self.blockers.contains_key(&attacker)
    }

    pub fn blockers_of(&self, attacker: ObjectId) -> &[ObjectId] {
        self.blockers.get(&attacker).map_or(&[], Vec::as_slice)
    }

    pub fn defender_of(&self, attacker: ObjectId) -> Option<PlayerId> {
        self.attackers
            .iter()
            .find(|a| a.creature == attacker)
            .map(|a| a.defender)
    }

    /// Removes a creature from combat.
    pub fn remove(&mut self, creature: ObjectId) {
        self.attackers.retain(|a| a.creature != creature);
        for blockers in self.blockers.values_mut() {
            blockers.retain(|&b| b != creature);
        }
    }
}

/// Whether a creature can attack right now. The error is a human-readable
/// reason.
pub fn can_attack(view: &ProjectedView, creature: ObjectId, sick: bool) -> Result<(), String> {
    let obj = view
        .object(creature)
        .filter(|o| o.zone == Zone::Battlefield)
        .ok_or_else(|| "not on the battlefield".to_string())?;
    if !obj.characteristics.is_creature() {
        return Err("not a creature".to_string());
    }
    if obj.tapped {
        return Err("tapped".to_string());
    }
    if view.has_capability(creature, Keyword::Defender) {
        return Err("has defender".to_string());
    }
    if sick && !view.has_capability(creature, Keyword::Haste) {
        return Err("summoning sick".to_string());
    }
    Ok(())
}

/// Whether `blocker` can block `attacker`, evasion included.
pub fn can_block(view: &ProjectedView, attacker: ObjectId, blocker: ObjectId) -> Result<(), String> {
    let obj = view
        .object(blocker)
        .filter(|o| o.zone == Zone::Battlefield)
        .ok_or_else(|| "not on the battlefield".to_string())?;
    if !obj.characteristics.is_creature() {
        return Err("not a creature".to_string());
    }
    if obj.tapped {
        return Err("tapped".to_string());
    }
    if view.has_capability(attacker, Keyword::Flying)
        && !view.has_capability(blocker, Keyword::Flying)
        && !view.has_capability(blocker, Keyword::Reach)
    {
        return Err("attacker has flying".to_string());
    }
    Ok(())
}

pub fn has_vigilance(view: &ProjectedView, creature: ObjectId) -> bool {
    view.has_capability(creature, Keyword::Vigilance)
}

/// Declares the active player's attackers. Everything is validated before
/// any creature taps.
pub fn declare_attackers(
    game: &mut GameState,
    player: PlayerId,
    declarations: &[(ObjectId, PlayerId)],
) -> Result<(), EngineError> {
    if game.turn.step != Some(Step::DeclareAttackers)
        || game.combat.attackers_declared
        || !game.stack_is_empty()
    {
        return Err(IllegalAction::WrongStep.into());
    }
    if player != game.turn.active_player {
        return Err(IllegalAction::NotPriorityHolder { player }.into());
    }

    let view = game.project()?;
    let mut seen = BTreeSet::new();
    for &(creature, defender) in declarations {
        let invalid = |reason: &str| IllegalAction::InvalidAttacker {
            object: creature,
            reason: reason.to_string(),
        };
        if !seen.insert(creature) {
            return Err(invalid("declared twice").into());
        }
        if view.controller(creature) != Some(player) {
            return Err(IllegalAction::NotController {
                player,
                object: creature,
            }
            .into());
        }
        if defender == player || !game.is_in_game(defender) {
            return Err(invalid("can't attack that player").into());
        }
        let sick = game.object(creature).is_some_and(|o| o.summoning_sick);
        can_attack(&view, creature, sick).map_err(|reason| invalid(&reason))?;
    }

    for &(creature, defender) in declarations {
        game.combat.attackers.push(AttackerInfo { creature, defender });
        if !has_vigilance(&view, creature) {
            game.store.set_tapped(creature, true)?;
        }
    }
    game.combat.attackers_declared = true;
    debug!(player = %player, count = declarations.len(), "attackers declared");
    Ok(())
}

/// Declares one defending player's blockers as (blocker, attacker) pairs.
pub fn declare_blockers(
    game: &mut GameState,
    player: PlayerId,
    declarations: &[(ObjectId, ObjectId)],
) -> Result<(), EngineError> {
    if game.turn.step != Some(Step::DeclareBlockers)
        || game.combat.blocks_declared.contains(&player)
        || !game.stack_is_empty()
    {
        return Err(IllegalAction::WrongStep.into());
    }

    let view = game.project()?;
    let mut seen = BTreeSet::new();
    for &(blocker, attacker) in declarations {
        let invalid = |reason: &str| IllegalAction::InvalidBlocker {
            object: blocker,
            reason: reason.to_string(),
        };
        if !seen.insert(blocker) {
            return Err(invalid("can only block one attacker").into());
        }
        if view.controller(blocker) != Some(player) {
            return Err(IllegalAction::NotController {
                player,
                object: blocker,
            }
            .into());
        }
        if game.combat.defender_of(attacker) != Some(player) {
            return Err(invalid("that creature isn't attacking you").into());
        }
        can_block(&view, attacker, blocker).map_err(|reason| invalid(&reason))?;
    }

    for &(blocker, attacker) in declarations {
        game.combat.blockers.entry(attacker).or_default().push(blocker);
    }
    game.combat.blocks_declared.insert(player);
    debug!(player = %player, count = declarations.len(), "blockers declared");
    Ok(())
}

/// Combat damage, all dealt at once. A blocked attacker assigns lethal damage
/// to each blocker in order and the rest to the last one.
pub fn deal_combat_damage(game: &mut GameState) -> Result<(), EngineError> {
    let view = game.project()?;
    let on_battlefield = |id: ObjectId| {
        view.object(id)
            .is_some_and(|o| o.zone == Zone::Battlefield && o.characteristics.is_creature())
    };
    let mut assignments: Vec<(ObjectId, Target, u32)> = Vec::new();

    for attack in &game.combat.attackers {
        if !on_battlefield(attack.creature) {
            continue;
        }
        let power = non_negative(view.displayed_power(attack.creature));
        if !game.combat.is_blocked(attack.creature) {
            assignments.push((attack.creature, Target::Player(attack.defender), power));
            continue;
        }
        let blockers: Vec<ObjectId> = game
            .combat
            .blockers_of(attack.creature)
            .iter()
            .copied()
            .filter(|&b| on_battlefield(b))
            .collect();
        let mut remaining = power;
        for (i, &blocker) in blockers.iter().enumerate() {
            let last = i + 1 == blockers.len();
            let toughness = non_negative(view.displayed_toughness(blocker));
            let marked = view.object(blocker).map_or(0, |o| o.damage);
            let lethal = toughness.saturating_sub(marked).max(1);
            let amount = if last { remaining } else { remaining.min(lethal) };
            remaining -= amount;
            assignments.push((attack.creature, Target::Object(blocker), amount));
        }
        for &blocker in &blockers {
            let power = non_negative(view.displayed_power(blocker));
            assignments.push((blocker, Target::Object(attack.creature), power));
        }
    }

    for (source, target, amount) in assignments {
        game.deal_damage(source, target, amount)?;
    }
    Ok(())
}

fn non_negative(value: Option<i32>) -> u32 {
    value.map_or(0, |v| v.max(0) as u32)
}
