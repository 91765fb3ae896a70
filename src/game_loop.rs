//! Game loop: commands, the stack and priority.
//!
//! This module provides the engine that drives a game:
//! - Command validation and execution
//! - Stack resolution
//! - Putting triggered abilities on the stack in APNAP order
//! - State-based action integration
//! - Turn advancement when every player passes
//!
//! Every command runs against a copy of the game state. The copy replaces the
//! real state only if the whole command succeeded, so a rejected command
//! leaves nothing behind.

use tracing::{debug, trace, warn};

use crate::ability::{SourceLeftPolicy, TargetSpec, Timing};
use crate::cost::{Cost, CostPayer, PaymentChoices, PaymentContext, PoolCostPayer};
use crate::decision::{DecisionAnswer, DecisionId, DecisionKind, PendingDecision, TriggerChoice};
use crate::error::{EngineError, IllegalAction, InvariantFailure};
use crate::executor::{ResolutionContext, execute_effects};
use crate::filter::FilterContext;
use crate::game_state::{GameState, StackEntry, StackEntryKind, Target};
use crate::ids::{ObjectId, PlayerId};
use crate::projection::ProjectedView;
use crate::rules::combat;
use crate::rules::state_based::{apply_legend_rule_choice, check_and_apply_sbas_with};
use crate::snapshot::ObjectSnapshot;
use crate::triggers::{TriggeredAbilityEntry, collect};
use crate::turn::{self, PriorityResult};
use crate::types::CardType;
use crate::zone::Zone;

/// Where the engine is between commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// A player has priority and the stack is empty.
    WaitingForAction,
    /// Triggered abilities are waiting to be put on the stack.
    TriggersPending,
    /// A player has priority and the stack is not empty.
    StackNonEmpty,
    Resolving,
    SbaCheck,
    /// A player must answer the pending decision.
    AwaitingDecision,
    GameOver,
}

/// A player action.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CastSpell {
        player: PlayerId,
        card: ObjectId,
        targets: Vec<Target>,
        payment: PaymentChoices,
    },
    ActivateAbility {
        player: PlayerId,
        source: ObjectId,
        index: usize,
        targets: Vec<Target>,
        payment: PaymentChoices,
    },
    PlayLand {
        player: PlayerId,
        card: ObjectId,
    },
    /// (attacker, defending player) pairs.
    DeclareAttackers {
        player: PlayerId,
        attackers: Vec<(ObjectId, PlayerId)>,
    },
    /// (blocker, attacker) pairs.
    DeclareBlockers {
        player: PlayerId,
        blockers: Vec<(ObjectId, ObjectId)>,
    },
    PassPriority {
        player: PlayerId,
    },
    SubmitDecision {
        player: PlayerId,
        id: DecisionId,
        answer: DecisionAnswer,
    },
}

impl Command {
    pub fn cast(player: PlayerId, card: ObjectId, targets: Vec<Target>) -> Self {
        Command::CastSpell {
            player,
            card,
            targets,
            payment: PaymentChoices::default(),
        }
    }

    pub fn activate(player: PlayerId, source: ObjectId, index: usize, targets: Vec<Target>) -> Self {
        Command::ActivateAbility {
            player,
            source,
            index,
            targets,
            payment: PaymentChoices::default(),
        }
    }

    pub fn pass(player: PlayerId) -> Self {
        Command::PassPriority { player }
    }
}

/// Drives one game.
#[derive(Debug)]
pub struct Engine {
    game: GameState,
    payer: Box<dyn CostPayer>,
    state: EngineState,
    halted: bool,
}

impl Engine {
    pub fn new(game: GameState) -> Self {
        Self::with_payer(game, Box::new(PoolCostPayer))
    }

    pub fn with_payer(mut game: GameState, payer: Box<dyn CostPayer>) -> Self {
        // Setup mutations are not part of any batch.
        game.store.take_events();
        let state = waiting_state(&game);
        Self {
            game,
            payer,
            state,
            halted: false,
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn pending_decision(&self) -> Option<&PendingDecision> {
        self.game.pending_decision.as_ref()
    }

    pub fn view(&self) -> Result<ProjectedView, EngineError> {
        self.game.project()
    }

    /// Runs the turn-based actions of the step the game is in and moves on
    /// to the first step where a player gets priority.
    pub fn start(&mut self) -> Result<EngineState, EngineError> {
        self.transact(|game, _| {
            refuse_while_deciding(game)?;
            let old_view = game.project()?;
            turn::begin_step(game)?;
            settle(game, &old_view)?;
            proceed(game)
        })
    }

    pub fn pass_priority(&mut self, player: PlayerId) -> Result<EngineState, EngineError> {
        self.apply(Command::PassPriority { player })
    }

    /// Apply a command. On error nothing changes; a fatal error halts the
    /// engine for good.
    pub fn apply(&mut self, command: Command) -> Result<EngineState, EngineError> {
        debug!(?command, "applying command");
        self.transact(|game, payer| run_command(game, payer, command))
    }

    fn transact(
        &mut self,
        body: impl FnOnce(&mut GameState, &dyn CostPayer) -> Result<EngineState, EngineError>,
    ) -> Result<EngineState, EngineError> {
        if self.halted {
            return Err(InvariantFailure::GameHalted.into());
        }
        if self.game.is_game_over() {
            return Err(IllegalAction::GameOver.into());
        }
        let mut next = self.game.clone();
        match body(&mut next, self.payer.as_ref()) {
            Ok(state) => {
                self.game = next;
                self.state = state;
                trace!(?state, "engine state");
                Ok(state)
            }
            Err(err) => {
                if err.is_fatal() {
                    warn!(error = %err, "fatal error, halting the game");
                    self.halted = true;
                } else {
                    debug!(error = %err, "command rejected");
                }
                Err(err)
            }
        }
    }
}

/// Only `SubmitDecision` may move a game that is waiting on a decision.
fn refuse_while_deciding(game: &GameState) -> Result<(), EngineError> {
    match &game.pending_decision {
        Some(decision) => Err(EngineError::DecisionPending { id: decision.id }),
        None => Ok(()),
    }
}

fn run_command(
    game: &mut GameState,
    payer: &dyn CostPayer,
    command: Command,
) -> Result<EngineState, EngineError> {
    if !matches!(command, Command::SubmitDecision { .. }) {
        refuse_while_deciding(game)?;
    }
    let old_view = game.project()?;

    match command {
        Command::CastSpell {
            player,
            card,
            targets,
            payment,
        } => cast_spell(game, payer, player, card, targets, payment)?,
        Command::ActivateAbility {
            player,
            source,
            index,
            targets,
            payment,
        } => activate_ability(game, payer, &old_view, player, source, index, targets, payment)?,
        Command::PlayLand { player, card } => play_land(game, player, card)?,
        Command::DeclareAttackers { player, attackers } => {
            combat::declare_attackers(game, player, &attackers)?;
            turn::grant_active_player_priority(game);
        }
        Command::DeclareBlockers { player, blockers } => {
            combat::declare_blockers(game, player, &blockers)?;
            turn::grant_active_player_priority(game);
        }
        Command::PassPriority { player } => {
            require_priority(game, player)?;
            match turn::pass_priority(game) {
                PriorityResult::Continue => {}
                PriorityResult::StackResolves => {
                    trace!(state = ?EngineState::Resolving, "engine state");
                    resolve_top(game)?;
                    turn::grant_active_player_priority(game);
                }
                PriorityResult::StepEnds => {
                    turn::advance_step(game)?;
                }
            }
        }
        Command::SubmitDecision { player, id, answer } => {
            submit_decision(game, player, id, answer)?;
        }
    }

    settle(game, &old_view)?;
    proceed(game)
}

fn require_priority(game: &GameState, player: PlayerId) -> Result<(), IllegalAction> {
    if turn::has_priority(game, player) {
        Ok(())
    } else {
        Err(IllegalAction::NotPriorityHolder { player })
    }
}

fn cast_spell(
    game: &mut GameState,
    payer: &dyn CostPayer,
    player: PlayerId,
    card: ObjectId,
    targets: Vec<Target>,
    payment: PaymentChoices,
) -> Result<(), EngineError> {
    require_priority(game, player)?;
    let obj = game
        .object(card)
        .ok_or(IllegalAction::UnknownObject(card))?;
    if obj.zone != Zone::Hand || obj.owner != player {
        return Err(IllegalAction::NotInHand {
            player,
            object: card,
        }
        .into());
    }
    if obj.printed.has_card_type(CardType::Land) {
        return Err(IllegalAction::CannotCastLand(card).into());
    }
    let name = obj.name().to_string();
    if !obj.printed.has_card_type(CardType::Instant) && !turn::is_sorcery_timing(game, player) {
        return Err(IllegalAction::SorcerySpeed { what: name }.into());
    }
    let specs = obj.spell_targets.clone();
    let effects = obj.spell_effects.clone();
    let cost = obj
        .printed
        .mana_cost
        .clone()
        .map_or_else(Cost::free, Cost::mana);

    let view = game.project()?;
    validate_targets(game, &view, &specs, &targets, &FilterContext::new(player, Some(card)))?;

    let ctx = PaymentContext::new(card, player).with_choices(payment);
    *game = payer.try_pay(&cost, &ctx, game)?;

    game.move_object(card, Zone::Stack)?;
    let snapshot = game
        .project()?
        .object(card)
        .map(ObjectSnapshot::from_projected);
    put_on_stack(
        game,
        StackEntry {
            id: card,
            source: card,
            controller: player,
            kind: StackEntryKind::Spell,
            effects,
            target_specs: specs,
            targets,
            source_snapshot: snapshot,
            source_left: SourceLeftPolicy::default(),
            description: name,
        },
    );
    game.record_event(crate::game_event::GameEvent::SpellCast {
        spell: card,
        caster: player,
    });
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn activate_ability(
    game: &mut GameState,
    payer: &dyn CostPayer,
    view: &ProjectedView,
    player: PlayerId,
    source: ObjectId,
    index: usize,
    targets: Vec<Target>,
    payment: PaymentChoices,
) -> Result<(), EngineError> {
    require_priority(game, player)?;
    let projected = view
        .object(source)
        .filter(|o| o.zone == Zone::Battlefield)
        .ok_or(IllegalAction::UnknownObject(source))?;
    if projected.controller() != player {
        return Err(IllegalAction::NotController {
            player,
            object: source,
        }
        .into());
    }
    let not_found = IllegalAction::AbilityNotFound {
        object: source,
        index,
    };
    // Copy effects and ability loss are already reflected in the view.
    let ability = projected
        .activated_abilities
        .get(index)
        .cloned()
        .ok_or(not_found)?;
    if ability.timing == Timing::Sorcery && !turn::is_sorcery_timing(game, player) {
        return Err(IllegalAction::SorcerySpeed {
            what: ability.description.clone(),
        }
        .into());
    }
    validate_targets(
        game,
        view,
        &ability.targets,
        &targets,
        &FilterContext::new(player, Some(source)),
    )?;

    // How the source looked before costs like sacrificing it were paid.
    let snapshot = ObjectSnapshot::from_projected(projected);
    let ctx = PaymentContext::new(source, player).with_choices(payment);
    *game = payer.try_pay(&ability.cost, &ctx, game)?;

    if ability.is_mana_ability() {
        // Mana abilities don't use the stack.
        let ctx = ResolutionContext::new(source, player).with_snapshot(snapshot);
        execute_effects(game, &ability.effects, &ctx)?;
        turn::grant_priority(game, player);
        return Ok(());
    }

    let description = if ability.description.is_empty() {
        format!("ability of {}", snapshot.name())
    } else {
        ability.description.clone()
    };
    let id = game.ids.next_object_id();
    put_on_stack(
        game,
        StackEntry {
            id,
            source,
            controller: player,
            kind: StackEntryKind::ActivatedAbility,
            effects: ability.effects,
            target_specs: ability.targets,
            targets,
            source_snapshot: Some(snapshot),
            source_left: ability.source_left,
            description,
        },
    );
    Ok(())
}

fn play_land(game: &mut GameState, player: PlayerId, card: ObjectId) -> Result<(), EngineError> {
    require_priority(game, player)?;
    let obj = game
        .object(card)
        .ok_or(IllegalAction::UnknownObject(card))?;
    if obj.zone != Zone::Hand || obj.owner != player {
        return Err(IllegalAction::NotInHand {
            player,
            object: card,
        }
        .into());
    }
    if !obj.printed.has_card_type(CardType::Land) {
        return Err(IllegalAction::NotALand(card).into());
    }
    if !turn::is_sorcery_timing(game, player) {
        return Err(IllegalAction::SorcerySpeed {
            what: "playing a land".to_string(),
        }
        .into());
    }
    let played = game.player(player).map_or(0, |p| p.lands_played_this_turn);
    if played >= game.config.land_plays_per_turn {
        return Err(IllegalAction::LandAlreadyPlayed { player }.into());
    }

    game.put_onto_battlefield(card, player)?;
    if let Some(p) = game.store.player_mut(player) {
        p.lands_played_this_turn += 1;
    }
    debug!(player = %player, land = %card, "land played");
    turn::grant_priority(game, player);
    Ok(())
}

fn validate_targets(
    game: &GameState,
    view: &ProjectedView,
    specs: &[TargetSpec],
    targets: &[Target],
    ctx: &FilterContext,
) -> Result<(), IllegalAction> {
    if specs.len() != targets.len() {
        return Err(IllegalAction::WrongTargetCount {
            expected: specs.len(),
            got: targets.len(),
        });
    }
    for (slot, (spec, target)) in specs.iter().zip(targets).enumerate() {
        if !spec.is_legal(target, game, view, ctx) {
            return Err(IllegalAction::IllegalTarget { slot });
        }
    }
    Ok(())
}

/// Put an entry on top of the stack. Its controller receives priority.
pub fn put_on_stack(game: &mut GameState, entry: StackEntry) {
    debug!(entry = %entry.description, controller = %entry.controller, "put on stack");
    let controller = entry.controller;
    game.stack.push(entry);
    turn::grant_priority(game, controller);
}

/// Resolve the top of the stack.
///
/// Targets are checked again first. If every target has become illegal the
/// entry does nothing, and a spell goes to its owner's graveyard.
pub fn resolve_top(game: &mut GameState) -> Result<(), EngineError> {
    let entry = game.stack.pop().ok_or(InvariantFailure::StackUnderflow)?;
    debug!(entry = %entry.description, "resolving");

    if !entry.is_spell()
        && entry.source_left == SourceLeftPolicy::DoNothing
        && source_has_left(game, &entry)
    {
        debug!(entry = %entry.description, "source left, ability does nothing");
        return Ok(());
    }

    let view = game.project()?;
    let filter_ctx = FilterContext::new(entry.controller, Some(entry.source));
    let legal: Vec<bool> = entry
        .target_specs
        .iter()
        .zip(&entry.targets)
        .map(|(spec, target)| spec.is_legal(target, game, &view, &filter_ctx))
        .collect();
    if !legal.is_empty() && legal.iter().all(|l| !l) {
        debug!(entry = %entry.description, "all targets illegal, fizzles");
        if entry.is_spell() {
            game.move_object(entry.id, Zone::Graveyard)?;
        }
        return Ok(());
    }

    let ctx = ResolutionContext::for_entry(&entry, legal);
    if !entry.is_spell() {
        return execute_effects(game, &entry.effects, &ctx);
    }

    let (is_permanent, is_aura) = game.object(entry.id).map_or((false, false), |o| {
        (o.printed.is_permanent(), o.enchant.is_some())
    });
    if is_permanent {
        game.put_onto_battlefield(entry.id, entry.controller)?;
        if is_aura && let Some(Target::Object(host)) = ctx.target(0) {
            game.store.attach(entry.id, host)?;
        }
    } else {
        execute_effects(game, &entry.effects, &ctx)?;
        if game.object(entry.id).is_some_and(|o| o.zone == Zone::Stack) {
            game.move_object(entry.id, Zone::Graveyard)?;
        }
    }
    Ok(())
}

fn source_has_left(game: &GameState, entry: &StackEntry) -> bool {
    let current = game.object(entry.source).map(|o| o.zone);
    match &entry.source_snapshot {
        Some(snapshot) => current != Some(snapshot.zone),
        None => current != Some(Zone::Battlefield),
    }
}

/// Collect the triggers caused by one batch of mutations.
fn collect_triggers(game: &mut GameState, old_view: &ProjectedView) -> Result<(), EngineError> {
    let events = game.store.take_events();
    if events.is_empty() {
        return Ok(());
    }
    let new_view = game.project()?;
    let triggered = collect(old_view, &new_view, &events);
    if !triggered.is_empty() {
        debug!(count = triggered.len(), "abilities triggered");
        game.trigger_queue.extend(triggered);
    }
    Ok(())
}

/// Bring the game to a point where a player can act: state-based actions to
/// a fixed point, then triggered abilities onto the stack. Stops early when a
/// player has to decide something.
fn settle(game: &mut GameState, old_view: &ProjectedView) -> Result<(), EngineError> {
    collect_triggers(game, old_view)?;
    loop {
        trace!(state = ?EngineState::SbaCheck, "engine state");
        let outcome = check_and_apply_sbas_with(game, collect_triggers)?;
        if game.is_game_over() || outcome.suspended.is_some() {
            return Ok(());
        }
        if game.trigger_queue.is_empty() && game.staged_triggers.is_empty() {
            return Ok(());
        }
        trace!(state = ?EngineState::TriggersPending, "engine state");
        if place_triggers(game)? {
            return Ok(());
        }
    }
}

/// Put waiting triggers on the stack: the active player's first, then each
/// other player's in turn order, so the last player's resolve first. Returns
/// true if a player has to make a choice before this can finish.
fn place_triggers(game: &mut GameState) -> Result<bool, EngineError> {
    let in_game: Vec<PlayerId> = game.players_in_game();
    game.trigger_queue
        .entries
        .retain(|e| in_game.contains(&e.controller));

    loop {
        while let Some(entry) = game.staged_triggers.first() {
            let candidates = target_candidates(game, entry)?;
            if candidates.iter().any(Vec::is_empty) {
                let entry = game.staged_triggers.remove(0);
                debug!(trigger = %entry.description(), "no legal targets, removed");
                continue;
            }
            if candidates.iter().any(|c| c.len() > 1) {
                let (player, source, description) =
                    (entry.controller, entry.source, entry.description());
                let id = game.next_decision_id();
                game.pending_decision = Some(PendingDecision {
                    id,
                    player,
                    kind: DecisionKind::ChooseTargets {
                        source,
                        description,
                        candidates,
                    },
                });
                return Ok(true);
            }
            let targets = candidates.into_iter().flatten().collect();
            let entry = game.staged_triggers.remove(0);
            push_trigger(game, entry, targets);
        }

        let next_player = game
            .apnap_order()
            .into_iter()
            .find(|&p| game.trigger_queue.entries.iter().any(|e| e.controller == p));
        let Some(player) = next_player else {
            return Ok(false);
        };
        let mine: Vec<&TriggeredAbilityEntry> = game
            .trigger_queue
            .entries
            .iter()
            .filter(|e| e.controller == player)
            .collect();
        if mine.len() > 1 {
            let triggers = mine
                .iter()
                .map(|e| TriggerChoice {
                    source: e.source,
                    description: e.description(),
                })
                .collect();
            let id = game.next_decision_id();
            game.pending_decision = Some(PendingDecision {
                id,
                player,
                kind: DecisionKind::OrderTriggers { triggers },
            });
            return Ok(true);
        }
        let staged = game.trigger_queue.take_for_player(player);
        game.staged_triggers.extend(staged);
    }
}

fn target_candidates(
    game: &GameState,
    entry: &TriggeredAbilityEntry,
) -> Result<Vec<Vec<Target>>, EngineError> {
    if entry.ability.targets.is_empty() {
        return Ok(Vec::new());
    }
    let view = game.project()?;
    let ctx = FilterContext::new(entry.controller, Some(entry.source));
    Ok(entry
        .ability
        .targets
        .iter()
        .map(|spec| spec.legal_targets(game, &view, &ctx))
        .collect())
}

fn push_trigger(game: &mut GameState, entry: TriggeredAbilityEntry, targets: Vec<Target>) {
    let id = game.ids.next_object_id();
    let description = entry.description();
    put_on_stack(
        game,
        StackEntry {
            id,
            source: entry.source,
            controller: entry.controller,
            kind: StackEntryKind::TriggeredAbility,
            effects: entry.ability.effects,
            target_specs: entry.ability.targets,
            targets,
            source_snapshot: Some(entry.source_snapshot),
            source_left: entry.ability.source_left,
            description,
        },
    );
    // The active player receives priority once triggers are on the stack.
    turn::grant_active_player_priority(game);
}

fn submit_decision(
    game: &mut GameState,
    player: PlayerId,
    id: DecisionId,
    answer: DecisionAnswer,
) -> Result<(), EngineError> {
    let decision = game
        .pending_decision
        .clone()
        .filter(|d| d.id == id)
        .ok_or(IllegalAction::UnknownDecision)?;
    if decision.player != player {
        return Err(IllegalAction::NotYourDecision { player }.into());
    }
    decision.validate(&answer)?;
    game.pending_decision = None;

    match (decision.kind, answer) {
        (DecisionKind::LegendRule { .. }, DecisionAnswer::Keep(keep)) => {
            apply_legend_rule_choice(game, keep)?;
        }
        (DecisionKind::OrderTriggers { .. }, DecisionAnswer::Order(order)) => {
            let mut mine: Vec<Option<TriggeredAbilityEntry>> = game
                .trigger_queue
                .take_for_player(player)
                .into_iter()
                .map(Some)
                .collect();
            let ordered = order.iter().filter_map(|&i| mine.get_mut(i)?.take());
            game.staged_triggers.extend(ordered);
        }
        (DecisionKind::ChooseTargets { .. }, DecisionAnswer::Targets(targets)) => {
            if game.staged_triggers.is_empty() {
                return Err(InvariantFailure::StackUnderflow.into());
            }
            let entry = game.staged_triggers.remove(0);
            push_trigger(game, entry, targets);
        }
        _ => {
            return Err(IllegalAction::InvalidAnswer("answer does not fit the decision".to_string()).into());
        }
    }
    Ok(())
}

/// Skip through steps where nobody gets priority and report where the game
/// stopped.
fn proceed(game: &mut GameState) -> Result<EngineState, EngineError> {
    loop {
        if game.is_game_over() {
            return Ok(EngineState::GameOver);
        }
        if game.pending_decision.is_some() {
            return Ok(EngineState::AwaitingDecision);
        }
        if game.turn.priority_player.is_some() {
            return Ok(waiting_state(game));
        }
        if !game.stack_is_empty() {
            turn::grant_active_player_priority(game);
            continue;
        }
        let old_view = game.project()?;
        turn::advance_step(game)?;
        settle(game, &old_view)?;
    }
}

fn waiting_state(game: &GameState) -> EngineState {
    if game.is_game_over() {
        EngineState::GameOver
    } else if game.pending_decision.is_some() {
        EngineState::AwaitingDecision
    } else if game.stack_is_empty() {
        EngineState::WaitingForAction
    } else {
        EngineState::StackNonEmpty
    }
}
