//! Turn structure and priority.
//!
//! This module handles:
//! - Turn and phase progression
//! - Priority pass counting
//! - Turn-based actions (untapping, drawing, cleanup)

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::effect::UntilEvent;
use crate::error::{EngineError, InvariantFailure};
use crate::game_event::GameEvent;
use crate::game_state::{GameState, Phase, Step};
use crate::ids::PlayerId;
use crate::rules::combat::{self, CombatState};

/// Result of passing priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityResult {
    /// More players need to pass priority.
    Continue,
    /// All players passed in succession; resolve the top of the stack.
    StackResolves,
    /// All players passed with an empty stack; the step ends.
    StepEnds,
}

/// Counts consecutive priority passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct PriorityTracker {
    /// Number of consecutive passes without any player taking an action.
    pub consecutive_passes: usize,
    pub players_in_game: usize,
}

impl PriorityTracker {
    pub fn new(players_in_game: usize) -> Self {
        Self {
            consecutive_passes: 0,
            players_in_game,
        }
    }

    /// Records a priority pass. Returns true if all players have now passed.
    pub fn record_pass(&mut self) -> bool {
        self.consecutive_passes += 1;
        self.all_passed()
    }

    /// Called when a player takes an action.
    pub fn reset(&mut self) {
        self.consecutive_passes = 0;
    }

    pub fn set_players_in_game(&mut self, count: usize) {
        self.players_in_game = count;
    }

    pub fn all_passed(&self) -> bool {
        self.consecutive_passes >= self.players_in_game
    }
}

/// Returns the next step within a phase, or None if the phase is over.
pub fn next_step(phase: Phase, current_step: Option<Step>) -> Option<Step> {
    match (phase, current_step) {
        // Beginning phase
        (Phase::Beginning, Some(Step::Untap)) => Some(Step::Upkeep),
        (Phase::Beginning, Some(Step::Upkeep)) => Some(Step::Draw),
        (Phase::Beginning, Some(Step::Draw)) => None,
        (Phase::Beginning, None) => Some(Step::Untap),

        // Main phases have no steps
        (Phase::FirstMain, _) => None,
        (Phase::NextMain, _) => None,

        // Combat phase
        (Phase::Combat, Some(Step::BeginCombat)) => Some(Step::DeclareAttackers),
        (Phase::Combat, Some(Step::DeclareAttackers)) => Some(Step::DeclareBlockers),
        (Phase::Combat, Some(Step::DeclareBlockers)) => Some(Step::CombatDamage),
        (Phase::Combat, Some(Step::CombatDamage)) => Some(Step::EndCombat),
        (Phase::Combat, Some(Step::EndCombat)) => None,
        (Phase::Combat, None) => Some(Step::BeginCombat),

        // Ending phase
        (Phase::Ending, Some(Step::End)) => Some(Step::Cleanup),
        (Phase::Ending, Some(Step::Cleanup)) => None,
        (Phase::Ending, None) => Some(Step::End),

        _ => None,
    }
}

/// Returns the next phase, or None at the end of the turn.
pub fn next_phase(phase: Phase) -> Option<Phase> {
    match phase {
        Phase::Beginning => Some(Phase::FirstMain),
        Phase::FirstMain => Some(Phase::Combat),
        Phase::Combat => Some(Phase::NextMain),
        Phase::NextMain => Some(Phase::Ending),
        Phase::Ending => None,
    }
}

pub fn first_step_of_phase(phase: Phase) -> Option<Step> {
    match phase {
        Phase::Beginning => Some(Step::Untap),
        Phase::FirstMain => None,
        Phase::Combat => Some(Step::BeginCombat),
        Phase::NextMain => None,
        Phase::Ending => Some(Step::End),
    }
}

/// Moves the turn pointer to the next step, phase or turn and performs the
/// turn-based actions of whatever begins. Mana pools empty between steps.
pub fn advance_step(game: &mut GameState) -> Result<(), EngineError> {
    if game.players_in_game().is_empty() {
        return Err(InvariantFailure::GameHalted.into());
    }
    for player in game.turn_order.clone() {
        if let Some(p) = game.store.player_mut(player) {
            p.mana_pool.empty();
        }
    }
    game.priority.reset();

    if let Some(next) = next_step(game.turn.phase, game.turn.step) {
        game.turn.step = Some(next);
    } else if let Some(phase) = next_phase(game.turn.phase) {
        game.turn.phase = phase;
        game.turn.step = first_step_of_phase(phase);
    } else {
        begin_next_turn(game);
    }
    game.turn.priority_player = Some(game.turn.active_player);
    debug!(turn = game.turn.turn_number, step = %current_phase_description(game), "step begins");
    begin_step(game)
}

/// Hands the turn to the next player still in the game.
fn begin_next_turn(game: &mut GameState) {
    let current = game.turn.active_player;
    let n = game.turn_order.len();
    let index = game
        .turn_order
        .iter()
        .position(|&p| p == current)
        .unwrap_or(0);
    let next = (1..=n)
        .map(|i| game.turn_order[(index + i) % n])
        .find(|&p| game.is_in_game(p))
        .unwrap_or(current);

    game.turn.active_player = next;
    game.turn.turn_number += 1;
    game.turn.phase = Phase::Beginning;
    game.turn.step = Some(Step::Untap);
    game.combat = CombatState::default();
    for player in game.turn_order.clone() {
        if let Some(p) = game.store.player_mut(player) {
            p.lands_played_this_turn = 0;
        }
    }
    let expired = game
        .effects
        .expire_event(&UntilEvent::NextTurnOf(next));
    if expired > 0 {
        debug!(player = %next, expired, "effects ended at start of turn");
    }
}

/// Performs the turn-based actions of the step that just began.
pub fn begin_step(game: &mut GameState) -> Result<(), EngineError> {
    let Some(step) = game.turn.step else {
        return Ok(());
    };
    match step {
        Step::Untap => execute_untap_step(game)?,
        Step::Draw => {
            game.record_event(step_began(game, step));
            execute_draw_step(game)?;
        }
        Step::CombatDamage => {
            game.record_event(step_began(game, step));
            combat::deal_combat_damage(game)?;
        }
        Step::Cleanup => execute_cleanup_step(game)?,
        _ => game.record_event(step_began(game, step)),
    }
    Ok(())
}

fn step_began(game: &GameState, step: Step) -> GameEvent {
    GameEvent::StepBegan {
        step,
        active_player: game.turn.active_player,
    }
}

pub fn has_priority(game: &GameState, player: PlayerId) -> bool {
    game.turn.priority_player == Some(player)
}

/// Records a pass by the priority holder and moves priority on.
pub fn pass_priority(game: &mut GameState) -> PriorityResult {
    game.priority.set_players_in_game(game.players_in_game().len());
    if game.priority.record_pass() {
        if game.stack_is_empty() {
            PriorityResult::StepEnds
        } else {
            PriorityResult::StackResolves
        }
    } else {
        advance_priority_to_next_player(game);
        PriorityResult::Continue
    }
}

/// Gives priority to a player and restarts the pass count.
pub fn grant_priority(game: &mut GameState, player: PlayerId) {
    game.priority.reset();
    game.turn.priority_player = Some(player);
}

pub fn grant_active_player_priority(game: &mut GameState) {
    let active = game.turn.active_player;
    grant_priority(game, active);
}

fn advance_priority_to_next_player(game: &mut GameState) {
    let Some(current) = game.turn.priority_player else {
        return;
    };
    let n = game.turn_order.len();
    let index = game
        .turn_order
        .iter()
        .position(|&p| p == current)
        .unwrap_or(0);
    for i in 1..=n {
        let next = game.turn_order[(index + i) % n];
        if game.is_in_game(next) {
            game.turn.priority_player = Some(next);
            return;
        }
    }
}

/// Main phase of `player`'s own turn with an empty stack.
pub fn is_sorcery_timing(game: &GameState, player: PlayerId) -> bool {
    is_main_phase(game) && game.stack_is_empty() && game.turn.active_player == player
}

/// Untap and cleanup normally grant no priority.
pub fn is_no_priority_step(game: &GameState) -> bool {
    matches!(game.turn.step, Some(Step::Untap) | Some(Step::Cleanup))
}

/// Untaps the active player's permanents and ends their summoning sickness.
pub fn execute_untap_step(game: &mut GameState) -> Result<(), EngineError> {
    let active = game.turn.active_player;
    let view = game.project()?;
    let permanents: Vec<_> = view
        .battlefield()
        .filter(|o| o.controller() == active)
        .map(|o| o.id)
        .collect();
    for id in permanents {
        game.store.set_tapped(id, false)?;
        game.store.set_summoning_sick(id, false)?;
    }
    game.turn.priority_player = None;
    Ok(())
}

/// The active player draws, unless this is the first turn of the game and
/// the first draw is skipped.
pub fn execute_draw_step(game: &mut GameState) -> Result<(), InvariantFailure> {
    let active = game.turn.active_player;
    if game.turn.turn_number == 1 && game.config.skip_first_draw {
        return Ok(());
    }
    game.draw_cards(active, 1)?;
    Ok(())
}

/// Damage wears off and "until end of turn" effects end.
pub fn execute_cleanup_step(game: &mut GameState) -> Result<(), InvariantFailure> {
    for id in game.store.battlefield().to_vec() {
        game.store.clear_damage(id)?;
    }
    let expired = game.effects.expire_end_of_turn();
    if expired > 0 {
        debug!(expired, "end of turn effects expired");
    }
    game.turn.priority_player = None;
    Ok(())
}

pub fn current_phase_description(game: &GameState) -> String {
    let phase_name = match game.turn.phase {
        Phase::Beginning => "Beginning",
        Phase::FirstMain => "Precombat Main",
        Phase::Combat => "Combat",
        Phase::NextMain => "Postcombat Main",
        Phase::Ending => "Ending",
    };

    if let Some(step) = game.turn.step {
        let step_name = match step {
            Step::Untap => "Untap",
            Step::Upkeep => "Upkeep",
            Step::Draw => "Draw",
            Step::BeginCombat => "Beginning of Combat",
            Step::DeclareAttackers => "Declare Attackers",
            Step::DeclareBlockers => "Declare Blockers",
            Step::CombatDamage => "Combat Damage",
            Step::EndCombat => "End of Combat",
            Step::End => "End Step",
            Step::Cleanup => "Cleanup",
        };
        format!("{} Phase - {} Step", phase_name, step_name)
    } else {
        format!("{} Phase", phase_name)
    }
}

pub fn is_main_phase(game: &GameState) -> bool {
    matches!(game.turn.phase, Phase::FirstMain | Phase::NextMain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::continuous::{ContinuousEffect, EffectTarget, Modification};
    use crate::effect::Until;
    use crate::tests::fixtures;
    use crate::zone::Zone;

    fn test_game() -> GameState {
        GameState::new(GameConfig::default()).unwrap()
    }

    #[test]
    fn test_next_step_beginning_phase() {
        assert_eq!(
            next_step(Phase::Beginning, Some(Step::Untap)),
            Some(Step::Upkeep)
        );
        assert_eq!(
            next_step(Phase::Beginning, Some(Step::Upkeep)),
            Some(Step::Draw)
        );
        assert_eq!(next_step(Phase::Beginning, Some(Step::Draw)), None);
    }

    #[test]
    fn test_next_step_combat_phase() {
        assert_eq!(
            next_step(Phase::Combat, Some(Step::BeginCombat)),
            Some(Step::DeclareAttackers)
        );
        assert_eq!(
            next_step(Phase::Combat, Some(Step::CombatDamage)),
            Some(Step::EndCombat)
        );
        assert_eq!(next_step(Phase::Combat, Some(Step::EndCombat)), None);
    }

    #[test]
    fn test_main_phases_have_no_steps() {
        assert_eq!(next_step(Phase::FirstMain, None), None);
        assert_eq!(next_step(Phase::NextMain, None), None);
        assert_eq!(first_step_of_phase(Phase::FirstMain), None);
        assert_eq!(first_step_of_phase(Phase::Ending), Some(Step::End));
    }

    #[test]
    fn test_advance_through_beginning_phase() {
        let mut game = test_game();
        assert_eq!(game.turn.step, Some(Step::Untap));

        advance_step(&mut game).unwrap();
        assert_eq!(game.turn.step, Some(Step::Upkeep));

        advance_step(&mut game).unwrap();
        assert_eq!(game.turn.step, Some(Step::Draw));

        advance_step(&mut game).unwrap();
        assert_eq!(game.turn.phase, Phase::FirstMain);
        assert_eq!(game.turn.step, None);
    }

    #[test]
    fn test_turn_passes_to_next_player() {
        let mut game = test_game();
        game.turn.phase = Phase::Ending;
        game.turn.step = Some(Step::Cleanup);

        advance_step(&mut game).unwrap();
        assert_eq!(game.turn.turn_number, 2);
        assert_eq!(game.turn.active_player, PlayerId::from_index(1));
        assert_eq!(game.turn.phase, Phase::Beginning);
        assert_eq!(game.turn.step, Some(Step::Untap));
    }

    #[test]
    fn test_priority_tracker() {
        let mut tracker = PriorityTracker::new(2);

        assert!(!tracker.all_passed());
        assert!(!tracker.record_pass());
        assert!(tracker.record_pass());

        tracker.reset();
        assert!(!tracker.all_passed());
    }

    #[test]
    fn test_pass_priority_goes_around_the_table() {
        let mut game = test_game();
        game.turn.phase = Phase::FirstMain;
        game.turn.step = None;
        grant_priority(&mut game, PlayerId::from_index(0));

        assert_eq!(pass_priority(&mut game), PriorityResult::Continue);
        assert!(has_priority(&game, PlayerId::from_index(1)));
        assert_eq!(pass_priority(&mut game), PriorityResult::StepEnds);
    }

    #[test]
    fn test_untap_step_untaps_and_cures_sickness() {
        let mut game = test_game();
        let alice = PlayerId::from_index(0);
        let bears = game
            .add_card(&fixtures::grizzly_bears(), alice, Zone::Battlefield)
            .unwrap();
        game.store.set_tapped(bears, true).unwrap();
        game.store.set_summoning_sick(bears, true).unwrap();

        execute_untap_step(&mut game).unwrap();
        let obj = game.object(bears).unwrap();
        assert!(!obj.tapped);
        assert!(!obj.summoning_sick);
        assert_eq!(game.turn.priority_player, None);
    }

    #[test]
    fn test_first_draw_is_skipped() {
        let mut game = test_game();
        let alice = PlayerId::from_index(0);
        game.add_card(&fixtures::grizzly_bears(), alice, Zone::Library)
            .unwrap();

        execute_draw_step(&mut game).unwrap();
        assert!(game.player(alice).unwrap().hand.is_empty());

        game.turn.turn_number = 3;
        execute_draw_step(&mut game).unwrap();
        assert_eq!(game.player(alice).unwrap().hand.len(), 1);
    }

    #[test]
    fn test_cleanup_removes_damage_and_end_of_turn_effects() {
        let mut game = test_game();
        let alice = PlayerId::from_index(0);
        let bears = game
            .add_card(&fixtures::grizzly_bears(), alice, Zone::Battlefield)
            .unwrap();
        game.store.mark_damage(bears, bears, 1).unwrap();
        game.add_continuous_effect(
            ContinuousEffect::new(
                bears,
                alice,
                EffectTarget::Specific(bears),
                Modification::ModifyPowerToughness {
                    power: 3,
                    toughness: 3,
                },
            )
            .until(Until::EndOfTurn),
        )
        .unwrap();

        execute_cleanup_step(&mut game).unwrap();
        assert_eq!(game.object(bears).unwrap().damage, 0);
        assert!(game.effects.is_empty());
    }

    #[test]
    fn test_next_turn_ends_until_your_next_turn_effects() {
        let mut game = test_game();
        let bob = PlayerId::from_index(1);
        let bears = game
            .add_card(&fixtures::grizzly_bears(), bob, Zone::Battlefield)
            .unwrap();
        game.add_continuous_effect(
            ContinuousEffect::new(
                bears,
                bob,
                EffectTarget::Specific(bears),
                Modification::ModifyPowerToughness {
                    power: 1,
                    toughness: 0,
                },
            )
            .until(Until::Event(UntilEvent::ControllersNextTurn)),
        )
        .unwrap();
        game.turn.phase = Phase::Ending;
        game.turn.step = Some(Step::Cleanup);

        advance_step(&mut game).unwrap();
        assert_eq!(game.turn.active_player, bob);
        assert!(game.effects.is_empty());
    }
}
