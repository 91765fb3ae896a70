//! State-based actions.
//!
//! State-based actions are checked whenever a player would receive priority.
//! They don't use the stack and happen simultaneously: every violation is
//! detected from one projected view, then all of them are applied together.
//! The check repeats until nothing is detected.

use std::collections::BTreeMap;

use tracing::debug;

use crate::characteristics::Keyword;
use crate::decision::{DecisionId, DecisionKind, PendingDecision};
use crate::error::{EngineError, IllegalAction, InvariantFailure};
use crate::filter::FilterContext;
use crate::game_state::{GameResult, GameState};
use crate::ids::{ObjectId, PlayerId};
use crate::object::CounterType;
use crate::projection::ProjectedView;
use crate::types::{CardType, Subtype, Supertype};
use crate::zone::Zone;

/// A state-based action that needs to be performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateBasedAction {
    /// A creature with zero toughness or lethal damage goes to the graveyard.
    ObjectDies(ObjectId),

    /// A planeswalker with no loyalty goes to the graveyard.
    PlaneswalkerDies(ObjectId),

    PlayerLoses {
        player: PlayerId,
        reason: LoseReason,
    },

    /// Two or more legendary permanents with the same name are controlled by
    /// the same player, who chooses one to keep.
    LegendRuleViolation {
        player: PlayerId,
        name: String,
        permanents: Vec<ObjectId>,
    },

    /// An Aura is not attached to anything or is attached illegally.
    AuraFallsOff(ObjectId),

    /// An Equipment is attached to something it can't equip. It stays on the
    /// battlefield unattached.
    EquipmentFallsOff(ObjectId),

    /// +1/+1 and -1/-1 counters on a permanent annihilate in pairs.
    CountersAnnihilate { permanent: ObjectId, count: u32 },

    /// A token outside the battlefield ceases to exist.
    TokenCeasesToExist(ObjectId),
}

/// Reason why a player loses the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoseReason {
    ZeroLife,
    Poison,
    DrewFromEmptyLibrary,
    /// An effect said so.
    Effect(String),
}

/// Result of running state-based actions to a fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SbaOutcome {
    pub any_applied: bool,
    /// Set when the loop stopped on a player decision.
    pub suspended: Option<DecisionId>,
}

/// Detect every state-based action in one pass over the projected view.
pub fn check_state_based_actions(game: &GameState, view: &ProjectedView) -> Vec<StateBasedAction> {
    let mut actions = Vec::new();
    check_player_sbas(game, &mut actions);
    check_permanent_sbas(view, &mut actions);
    check_token_cleanup(view, &mut actions);
    check_counter_annihilation(view, &mut actions);
    check_legend_rule(view, &mut actions);
    actions
}

fn check_player_sbas(game: &GameState, actions: &mut Vec<StateBasedAction>) {
    for player in game.store.players() {
        if !player.is_in_game() {
            continue;
        }
        let reason = if player.has_lethal_life() {
            Some(LoseReason::ZeroLife)
        } else if player.poison_counters >= game.config.poison_limit {
            Some(LoseReason::Poison)
        } else if player.drew_from_empty_library {
            Some(LoseReason::DrewFromEmptyLibrary)
        } else {
            player.pending_loss.clone().map(LoseReason::Effect)
        };
        if let Some(reason) = reason {
            actions.push(StateBasedAction::PlayerLoses {
                player: player.id,
                reason,
            });
        }
    }
}

fn check_permanent_sbas(view: &ProjectedView, actions: &mut Vec<StateBasedAction>) {
    for obj in view.battlefield() {
        let chars = &obj.characteristics;

        if chars.is_creature() {
            let toughness = chars.toughness.unwrap_or(0);
            // Indestructible doesn't save a creature with zero toughness.
            if toughness <= 0 {
                actions.push(StateBasedAction::ObjectDies(obj.id));
                continue;
            }
            if obj.damage >= toughness as u32
                && !view.has_capability(obj.id, Keyword::Indestructible)
            {
                actions.push(StateBasedAction::ObjectDies(obj.id));
                continue;
            }
        }

        if chars.has_card_type(CardType::Planeswalker)
            && obj.counters.get(&CounterType::Loyalty).copied().unwrap_or(0) == 0
        {
            actions.push(StateBasedAction::PlaneswalkerDies(obj.id));
            continue;
        }

        if chars.has_subtype(Subtype::Aura) && aura_is_illegal(view, obj.id) {
            actions.push(StateBasedAction::AuraFallsOff(obj.id));
            continue;
        }

        if chars.has_subtype(Subtype::Equipment)
            && let Some(host) = obj.attached_to
        {
            let legal = view.object(host).is_some_and(|h| {
                h.zone == Zone::Battlefield && h.characteristics.is_creature()
            });
            if !legal || chars.is_creature() {
                actions.push(StateBasedAction::EquipmentFallsOff(obj.id));
            }
        }
    }
}

fn aura_is_illegal(view: &ProjectedView, aura: ObjectId) -> bool {
    let Some(obj) = view.object(aura) else {
        return false;
    };
    let Some(host) = obj.attached_to.filter(|&h| h != aura) else {
        return true;
    };
    let Some(host_obj) = view.object(host).filter(|h| h.zone == Zone::Battlefield) else {
        return true;
    };
    let ctx = FilterContext::new(obj.controller(), Some(aura));
    obj.enchant
        .as_ref()
        .is_some_and(|filter| !filter.matches(host_obj, &ctx))
}

fn check_token_cleanup(view: &ProjectedView, actions: &mut Vec<StateBasedAction>) {
    for obj in view.objects() {
        if obj.is_token && obj.zone != Zone::Battlefield {
            actions.push(StateBasedAction::TokenCeasesToExist(obj.id));
        }
    }
}

fn check_counter_annihilation(view: &ProjectedView, actions: &mut Vec<StateBasedAction>) {
    for obj in view.battlefield() {
        let plus = obj
            .counters
            .get(&CounterType::PlusOnePlusOne)
            .copied()
            .unwrap_or(0);
        let minus = obj
            .counters
            .get(&CounterType::MinusOneMinusOne)
            .copied()
            .unwrap_or(0);
        if plus > 0 && minus > 0 {
            actions.push(StateBasedAction::CountersAnnihilate {
                permanent: obj.id,
                count: plus.min(minus),
            });
        }
    }
}

/// No player can control two legendary permanents with the same name.
fn check_legend_rule(view: &ProjectedView, actions: &mut Vec<StateBasedAction>) {
    let mut legends: BTreeMap<(PlayerId, String), Vec<ObjectId>> = BTreeMap::new();
    for obj in view.battlefield() {
        if obj.characteristics.has_supertype(Supertype::Legendary) {
            legends
                .entry((obj.controller(), obj.name().to_string()))
                .or_default()
                .push(obj.id);
        }
    }
    for ((player, name), permanents) in legends {
        if permanents.len() > 1 {
            actions.push(StateBasedAction::LegendRuleViolation {
                player,
                name,
                permanents,
            });
        }
    }
}

/// Applies a batch. Legend rule violations are handled after everything
/// else in the batch: only legends still on the battlefield are offered, and
/// the first violation that still has two or more becomes a pending decision.
/// The rest are found again on the next check. Returns whether anything was
/// applied.
pub fn apply_state_based_actions(
    game: &mut GameState,
    actions: Vec<StateBasedAction>,
) -> Result<bool, EngineError> {
    let mut any_applied = false;
    let mut legend_violations = Vec::new();
    for action in actions {
        match action {
            StateBasedAction::LegendRuleViolation {
                player,
                name,
                permanents,
            } => legend_violations.push((player, name, permanents)),
            other => {
                apply_single_sba(game, other)?;
                any_applied = true;
            }
        }
    }

    for (player, name, permanents) in legend_violations {
        if game.pending_decision.is_some() {
            break;
        }
        let permanents: Vec<ObjectId> = permanents
            .into_iter()
            .filter(|&id| game.object(id).is_some_and(|o| o.zone == Zone::Battlefield))
            .collect();
        if permanents.len() < 2 {
            continue;
        }
        let id = game.next_decision_id();
        debug!(player = %player, name = %name, "legend rule needs a choice");
        game.pending_decision = Some(PendingDecision {
            id,
            player,
            kind: DecisionKind::LegendRule { name, permanents },
        });
    }
    Ok(any_applied)
}

fn apply_single_sba(game: &mut GameState, action: StateBasedAction) -> Result<(), EngineError> {
    match action {
        StateBasedAction::ObjectDies(id)
        | StateBasedAction::PlaneswalkerDies(id)
        | StateBasedAction::AuraFallsOff(id) => {
            if game.object(id).is_some_and(|o| o.zone == Zone::Battlefield) {
                game.move_object(id, Zone::Graveyard)?;
            }
        }
        StateBasedAction::EquipmentFallsOff(id) => game.store.detach(id)?,
        StateBasedAction::CountersAnnihilate { permanent, count } => {
            game.store
                .remove_counters(permanent, CounterType::PlusOnePlusOne, count)?;
            game.store
                .remove_counters(permanent, CounterType::MinusOneMinusOne, count)?;
        }
        StateBasedAction::TokenCeasesToExist(id) => {
            game.store.remove(id)?;
        }
        StateBasedAction::PlayerLoses { player, reason } => {
            debug!(player = %player, ?reason, "player loses");
            game.store.mark_lost(player);
        }
        StateBasedAction::LegendRuleViolation { .. } => {}
    }
    Ok(())
}

/// Puts every other legendary permanent sharing the kept one's name and
/// controller into its owner's graveyard.
///
/// The kept permanent has to still be on the battlefield.
pub fn apply_legend_rule_choice(game: &mut GameState, keep: ObjectId) -> Result<(), EngineError> {
    let view = game.project()?;
    let Some(kept) = view.object(keep).filter(|o| o.zone == Zone::Battlefield) else {
        return Err(IllegalAction::InvalidAnswer(format!(
            "{keep} is no longer on the battlefield"
        ))
        .into());
    };
    let (name, controller) = (kept.name().to_string(), kept.controller());
    let to_remove: Vec<ObjectId> = view
        .battlefield()
        .filter(|o| {
            o.id != keep
                && o.controller() == controller
                && o.name() == name
                && o.characteristics.has_supertype(Supertype::Legendary)
        })
        .map(|o| o.id)
        .collect();
    for id in to_remove {
        game.move_object(id, Zone::Graveyard)?;
    }
    Ok(())
}

/// Run state-based actions to a fixed point.
pub fn check_and_apply_sbas(game: &mut GameState) -> Result<SbaOutcome, EngineError> {
    check_and_apply_sbas_with(game, |_, _| Ok(()))
}

/// Run state-based actions to a fixed point, calling `after_batch` with the
/// view from before each applied batch so the caller can look for triggers.
pub fn check_and_apply_sbas_with(
    game: &mut GameState,
    mut after_batch: impl FnMut(&mut GameState, &ProjectedView) -> Result<(), EngineError>,
) -> Result<SbaOutcome, EngineError> {
    let mut outcome = SbaOutcome::default();
    for pass in 0..game.config.max_sba_passes {
        if let Some(decision) = &game.pending_decision {
            outcome.suspended = Some(decision.id);
            return Ok(outcome);
        }
        let view = game.project()?;
        let actions = check_state_based_actions(game, &view);
        if actions.is_empty() {
            return Ok(outcome);
        }
        debug!(pass, count = actions.len(), "applying state-based actions");
        if apply_state_based_actions(game, actions)? {
            outcome.any_applied = true;
            after_batch(game, &view)?;
        }
        if update_game_result(game) {
            return Ok(outcome);
        }
    }
    if let Some(decision) = &game.pending_decision {
        outcome.suspended = Some(decision.id);
        return Ok(outcome);
    }
    Err(InvariantFailure::SbaDidNotConverge {
        passes: game.config.max_sba_passes,
    }
    .into())
}

/// Ends the game when one or no players remain. Returns whether it is over.
pub fn update_game_result(game: &mut GameState) -> bool {
    if game.result.is_some() {
        return true;
    }
    let remaining = game.players_in_game();
    let result = match remaining.as_slice() {
        [] => GameResult::Draw,
        [winner] => GameResult::Winner(*winner),
        _ => return false,
    };
    debug!(?result, "game over");
    game.result = Some(result);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::continuous::{ContinuousEffect, EffectTarget, Modification, Value};
    use crate::tests::fixtures;

    fn alice() -> PlayerId {
        PlayerId::from_index(0)
    }

    fn bob() -> PlayerId {
        PlayerId::from_index(1)
    }

    fn new_game() -> GameState {
        GameState::new(GameConfig::default()).unwrap()
    }

    #[test]
    fn test_no_violations_is_a_no_op() {
        let mut game = new_game();
        game.add_card(&fixtures::grizzly_bears(), alice(), Zone::Battlefield)
            .unwrap();
        let before = game.clone();

        let outcome = check_and_apply_sbas(&mut game).unwrap();
        assert!(!outcome.any_applied);
        let again = check_and_apply_sbas(&mut game).unwrap();
        assert!(!again.any_applied);
        assert_eq!(game, before);
    }

    #[test]
    fn test_lethal_damage_and_surviving_damage() {
        let mut game = new_game();
        let dead = game
            .add_card(&fixtures::grizzly_bears(), alice(), Zone::Battlefield)
            .unwrap();
        let hurt = game
            .add_card(&fixtures::grizzly_bears(), alice(), Zone::Battlefield)
            .unwrap();
        game.store.mark_damage(dead, dead, 2).unwrap();
        game.store.mark_damage(hurt, hurt, 1).unwrap();

        check_and_apply_sbas(&mut game).unwrap();
        assert_eq!(game.object(dead).unwrap().zone, Zone::Graveyard);
        assert_eq!(game.object(hurt).unwrap().zone, Zone::Battlefield);
        assert_eq!(game.project().unwrap().toughness(hurt), Some(2));
    }

    #[test]
    fn test_all_lethal_creatures_die_in_one_batch() {
        let mut game = new_game();
        let ids: Vec<ObjectId> = (0..4)
            .map(|_| {
                let id = game
                    .add_card(&fixtures::grizzly_bears(), alice(), Zone::Battlefield)
                    .unwrap();
                game.store.mark_damage(id, id, 3).unwrap();
                id
            })
            .collect();

        let view = game.project().unwrap();
        let actions = check_state_based_actions(&game, &view);
        assert_eq!(actions.len(), 4);
        apply_state_based_actions(&mut game, actions).unwrap();
        for id in ids {
            assert_eq!(game.object(id).unwrap().zone, Zone::Graveyard);
        }
    }

    #[test]
    fn test_indestructible_survives_damage_but_not_zero_toughness() {
        let mut game = new_game();
        let golem = game
            .add_card(&fixtures::indestructible_golem(), alice(), Zone::Battlefield)
            .unwrap();
        game.store.mark_damage(golem, golem, 10).unwrap();
        check_and_apply_sbas(&mut game).unwrap();
        assert_eq!(game.object(golem).unwrap().zone, Zone::Battlefield);

        game.add_continuous_effect(ContinuousEffect::new(
            golem,
            alice(),
            EffectTarget::Specific(golem),
            Modification::SetPowerToughness {
                power: Value::Fixed(0),
                toughness: Value::Fixed(0),
            },
        ))
        .unwrap();
        check_and_apply_sbas(&mut game).unwrap();
        assert_eq!(game.object(golem).unwrap().zone, Zone::Graveyard);
    }

    #[test]
    fn test_counters_annihilate() {
        let mut game = new_game();
        let bears = game
            .add_card(&fixtures::grizzly_bears(), alice(), Zone::Battlefield)
            .unwrap();
        game.store
            .add_counters(bears, CounterType::PlusOnePlusOne, 2)
            .unwrap();
        game.store
            .add_counters(bears, CounterType::MinusOneMinusOne, 3)
            .unwrap();

        check_and_apply_sbas(&mut game).unwrap();
        let obj = game.object(bears).unwrap();
        assert_eq!(obj.counter_count(CounterType::PlusOnePlusOne), 0);
        assert_eq!(obj.counter_count(CounterType::MinusOneMinusOne), 1);
        assert_eq!(obj.zone, Zone::Battlefield);
    }

    #[test]
    fn test_unattached_aura_goes_to_graveyard() {
        let mut game = new_game();
        let aura = game
            .add_card(&fixtures::holy_strength(), alice(), Zone::Battlefield)
            .unwrap();
        check_and_apply_sbas(&mut game).unwrap();
        assert_eq!(game.object(aura).unwrap().zone, Zone::Graveyard);
    }

    #[test]
    fn test_aura_falls_off_when_host_stops_matching() {
        let mut game = new_game();
        let bears = game
            .add_card(&fixtures::grizzly_bears(), alice(), Zone::Battlefield)
            .unwrap();
        let aura = game
            .add_card(&fixtures::holy_strength(), alice(), Zone::Battlefield)
            .unwrap();
        game.store.attach(aura, bears).unwrap();
        check_and_apply_sbas(&mut game).unwrap();
        assert_eq!(game.project().unwrap().power(bears), Some(3));

        game.add_continuous_effect(ContinuousEffect::new(
            bears,
            alice(),
            EffectTarget::Specific(bears),
            Modification::RemoveCardType(CardType::Creature),
        ))
        .unwrap();
        check_and_apply_sbas(&mut game).unwrap();
        assert_eq!(game.object(aura).unwrap().zone, Zone::Graveyard);
    }

    #[test]
    fn test_equipment_unattaches_but_stays() {
        let mut game = new_game();
        let sword = game
            .add_card(&fixtures::equipment(), alice(), Zone::Battlefield)
            .unwrap();
        let bears = game
            .add_card(&fixtures::grizzly_bears(), alice(), Zone::Battlefield)
            .unwrap();
        game.store.attach(sword, bears).unwrap();
        game.move_object(bears, Zone::Graveyard).unwrap();

        check_and_apply_sbas(&mut game).unwrap();
        let obj = game.object(sword).unwrap();
        assert_eq!(obj.zone, Zone::Battlefield);
        assert_eq!(obj.attached_to, None);
    }

    #[test]
    fn test_token_outside_battlefield_ceases_to_exist() {
        let mut game = new_game();
        let token = game
            .create_token(&fixtures::grizzly_bears(), alice())
            .unwrap();
        game.move_object(token, Zone::Graveyard).unwrap();

        check_and_apply_sbas(&mut game).unwrap();
        assert!(game.object(token).is_none());
        assert!(game.player(alice()).unwrap().graveyard.is_empty());
    }

    #[test]
    fn test_legend_rule_suspends_but_applies_the_rest() {
        let mut game = new_game();
        let first = game
            .add_card(&fixtures::legend(), alice(), Zone::Battlefield)
            .unwrap();
        let second = game
            .add_card(&fixtures::legend(), alice(), Zone::Battlefield)
            .unwrap();
        let bears = game
            .add_card(&fixtures::grizzly_bears(), bob(), Zone::Battlefield)
            .unwrap();
        game.store.mark_damage(bears, bears, 2).unwrap();

        let outcome = check_and_apply_sbas(&mut game).unwrap();
        assert!(outcome.any_applied);
        assert!(outcome.suspended.is_some());
        assert_eq!(game.object(bears).unwrap().zone, Zone::Graveyard);
        match &game.pending_decision {
            Some(PendingDecision {
                player,
                kind: DecisionKind::LegendRule { permanents, .. },
                ..
            }) => {
                assert_eq!(*player, alice());
                assert_eq!(permanents, &vec![first, second]);
            }
            other => panic!("expected a legend rule decision, got {other:?}"),
        }

        game.pending_decision = None;
        apply_legend_rule_choice(&mut game, second).unwrap();
        assert_eq!(game.object(first).unwrap().zone, Zone::Graveyard);
        assert_eq!(game.object(second).unwrap().zone, Zone::Battlefield);
    }

    #[test]
    fn test_keeping_a_legend_that_left_is_refused() {
        let mut game = new_game();
        let gone = game
            .add_card(&fixtures::legend(), alice(), Zone::Battlefield)
            .unwrap();
        let survivor = game
            .add_card(&fixtures::legend(), alice(), Zone::Battlefield)
            .unwrap();
        game.move_object(gone, Zone::Graveyard).unwrap();

        let err = apply_legend_rule_choice(&mut game, gone).unwrap_err();
        assert!(matches!(
            err,
            EngineError::IllegalAction(IllegalAction::InvalidAnswer(_))
        ));
        assert_eq!(game.object(survivor).unwrap().zone, Zone::Battlefield);
    }

    #[test]
    fn test_players_lose_and_game_ends() {
        let mut game = new_game();
        game.store.lose_life(bob(), 20);
        check_and_apply_sbas(&mut game).unwrap();
        assert!(game.player(bob()).unwrap().has_lost);
        assert_eq!(game.result, Some(GameResult::Winner(alice())));
    }

    #[test]
    fn test_simultaneous_loss_is_a_draw() {
        let mut game = new_game();
        game.store.player_mut(alice()).unwrap().drew_from_empty_library = true;
        game.store.player_mut(bob()).unwrap().poison_counters = 10;
        check_and_apply_sbas(&mut game).unwrap();
        assert_eq!(game.result, Some(GameResult::Draw));
    }

    #[test]
    fn test_non_converging_loop_is_an_invariant_failure() {
        let mut game = new_game();
        game.config.max_sba_passes = 1;
        // Two batches: the creature dies, then its token copy ceases to exist.
        let token = game
            .create_token(&fixtures::grizzly_bears(), alice())
            .unwrap();
        game.store.mark_damage(token, token, 2).unwrap();

        let err = check_and_apply_sbas(&mut game).unwrap_err();
        assert_eq!(
            err,
            EngineError::Invariant(InvariantFailure::SbaDidNotConverge { passes: 1 })
        );
    }
}
