//! Effect execution.
//!
//! Runs the one-shot effects of a resolving spell or ability against the game
//! state. References inside effects ("target creature", "this", "enchanted
//! creature") are resolved through a [`ResolutionContext`] built from the
//! stack entry.

use tracing::{debug, trace};

use crate::characteristics::Keyword;
use crate::continuous::{ContinuousEffect, EffectTarget};
use crate::effect::{Affected, Effect, ObjectRef, PlayerRef, Recipient, UntilEvent};
use crate::error::EngineError;
use crate::filter::FilterContext;
use crate::game_state::{GameState, StackEntry, Target};
use crate::ids::{ObjectId, PlayerId};
use crate::snapshot::ObjectSnapshot;
use crate::zone::Zone;

/// Everything an effect needs to know about the object that is resolving.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionContext {
    pub source: ObjectId,
    pub controller: PlayerId,
    pub targets: Vec<Target>,
    /// Whether each target slot is still legal. Illegal targets are ignored.
    pub target_legal: Vec<bool>,
    /// Last-known information about the source.
    pub snapshot: Option<ObjectSnapshot>,
}

impl ResolutionContext {
    pub fn new(source: ObjectId, controller: PlayerId) -> Self {
        Self {
            source,
            controller,
            targets: Vec::new(),
            target_legal: Vec::new(),
            snapshot: None,
        }
    }

    pub fn for_entry(entry: &StackEntry, target_legal: Vec<bool>) -> Self {
        Self {
            source: entry.source,
            controller: entry.controller,
            targets: entry.targets.clone(),
            target_legal,
            snapshot: entry.source_snapshot.clone(),
        }
    }

    pub fn with_targets(mut self, targets: Vec<Target>) -> Self {
        self.target_legal = vec![true; targets.len()];
        self.targets = targets;
        self
    }

    pub fn with_snapshot(mut self, snapshot: ObjectSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// The target chosen for a slot, if it is still legal.
    pub fn target(&self, slot: usize) -> Option<Target> {
        let legal = self.target_legal.get(slot).copied().unwrap_or(false);
        legal.then(|| self.targets.get(slot).copied()).flatten()
    }

    pub fn filter_context(&self) -> FilterContext {
        FilterContext::new(self.controller, Some(self.source))
    }

    /// The source, if it is still the object that was put on the stack: in
    /// the zone it was in when the snapshot was taken.
    fn live_source(&self, game: &GameState) -> Option<ObjectId> {
        let obj = game.object(self.source)?;
        match &self.snapshot {
            Some(snapshot) if snapshot.zone != obj.zone => None,
            _ => Some(self.source),
        }
    }

    pub fn resolve_object(&self, game: &GameState, reference: ObjectRef) -> Option<ObjectId> {
        match reference {
            ObjectRef::Source => self.live_source(game),
            ObjectRef::Target(slot) => match self.target(slot)? {
                Target::Object(id) => game.object(id).map(|_| id),
                Target::Player(_) => None,
            },
            ObjectRef::AttachedToSource => match self.live_source(game) {
                Some(source) => game.object(source)?.attached_to,
                None => self.snapshot.as_ref()?.attached_to,
            },
        }
    }

    pub fn resolve_players(
        &self,
        game: &GameState,
        reference: PlayerRef,
    ) -> Result<Vec<PlayerId>, EngineError> {
        let players = match reference {
            PlayerRef::You => vec![self.controller],
            PlayerRef::Target(slot) => match self.target(slot) {
                Some(Target::Player(player)) => vec![player],
                _ => Vec::new(),
            },
            PlayerRef::EachOpponent => game
                .apnap_order()
                .into_iter()
                .filter(|&p| p != self.controller)
                .collect(),
            PlayerRef::EachPlayer => game.apnap_order(),
            PlayerRef::ControllerOfTarget(slot) => match self.target(slot) {
                Some(Target::Object(id)) => game.project()?.controller(id).into_iter().collect(),
                _ => Vec::new(),
            },
        };
        Ok(players)
    }
}

/// Execute effects in order.
pub fn execute_effects(
    game: &mut GameState,
    effects: &[Effect],
    ctx: &ResolutionContext,
) -> Result<(), EngineError> {
    for effect in effects {
        execute_effect(game, effect, ctx)?;
    }
    Ok(())
}

pub fn execute_effect(
    game: &mut GameState,
    effect: &Effect,
    ctx: &ResolutionContext,
) -> Result<(), EngineError> {
    trace!(source = %ctx.source, ?effect, "executing effect");
    match effect {
        Effect::DealDamage { amount, to } => {
            for recipient in resolve_recipients(game, *to, ctx)? {
                game.deal_damage(ctx.source, recipient, *amount)?;
            }
        }
        Effect::GainLife { player, amount } => {
            for p in ctx.resolve_players(game, *player)? {
                game.store.gain_life(p, *amount);
            }
        }
        Effect::LoseLife { player, amount } => {
            for p in ctx.resolve_players(game, *player)? {
                game.store.lose_life(p, *amount);
            }
        }
        Effect::DrawCards { player, count } => {
            for p in ctx.resolve_players(game, *player)? {
                game.draw_cards(p, *count)?;
            }
        }
        Effect::Destroy { object } => {
            if let Some(id) = on_battlefield(game, ctx, *object) {
                let view = game.project()?;
                if view.has_capability(id, Keyword::Indestructible) {
                    debug!(object = %id, "indestructible permanent not destroyed");
                } else {
                    game.move_object(id, Zone::Graveyard)?;
                }
            }
        }
        Effect::Exile { object } => {
            if let Some(id) = ctx.resolve_object(game, *object) {
                game.move_object(id, Zone::Exile)?;
            }
        }
        Effect::Tap { object } => {
            if let Some(id) = on_battlefield(game, ctx, *object) {
                game.store.set_tapped(id, true)?;
            }
        }
        Effect::Untap { object } => {
            if let Some(id) = on_battlefield(game, ctx, *object) {
                game.store.set_tapped(id, false)?;
            }
        }
        Effect::PutCounters {
            object,
            counter,
            count,
        } => {
            if let Some(id) = on_battlefield(game, ctx, *object) {
                game.store.add_counters(id, *counter, *count)?;
            }
        }
        Effect::AddMana { symbol, amount } => {
            if let Some(player) = game.store.player_mut(ctx.controller) {
                player.mana_pool.add(*symbol, *amount);
            }
        }
        Effect::CreateTokens { definition, count } => {
            for _ in 0..*count {
                game.create_token(definition, ctx.controller)?;
            }
        }
        Effect::ApplyContinuous {
            affected,
            modification,
            duration,
            reads,
        } => {
            // Filters lock onto the objects that match right now.
            let objects: Vec<ObjectId> = match affected {
                Affected::Object(reference) => {
                    on_battlefield(game, ctx, *reference).into_iter().collect()
                }
                Affected::Matching(filter) => {
                    let view = game.project()?;
                    let filter_ctx = ctx.filter_context();
                    view.objects_matching(filter, &filter_ctx)
                        .map(|o| o.id)
                        .collect()
                }
            };
            for id in objects {
                let effect = ContinuousEffect::new(
                    ctx.source,
                    ctx.controller,
                    EffectTarget::Specific(id),
                    modification.clone(),
                )
                .until(duration.clone())
                .reading(reads.iter().copied());
                game.add_continuous_effect(effect)?;
            }
        }
        Effect::AttachSourceTo { object } => {
            if let (Some(source), Some(host)) = (
                on_battlefield(game, ctx, ObjectRef::Source),
                on_battlefield(game, ctx, *object),
            ) {
                game.store.attach(source, host)?;
            }
        }
        Effect::CounterSpell { target } => {
            if let Some(Target::Object(id)) = ctx.target(*target) {
                counter_stack_entry(game, id)?;
            }
        }
        Effect::LoseTheGame { player } => {
            let reason = ctx
                .snapshot
                .as_ref()
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| "an effect".to_string());
            for p in ctx.resolve_players(game, *player)? {
                if let Some(state) = game.store.player_mut(p) {
                    state.pending_loss = Some(reason.clone());
                }
            }
        }
        Effect::SignalEvent(name) => {
            let expired = game.effects.expire_event(&UntilEvent::Named(name.clone()));
            debug!(event = %name, expired, "named event fired");
        }
        Effect::Custom(custom) => {
            trace!(name = %custom.name, "running custom effect");
            (custom.run)(game, ctx)?;
        }
    }
    Ok(())
}

fn on_battlefield(game: &GameState, ctx: &ResolutionContext, reference: ObjectRef) -> Option<ObjectId> {
    ctx.resolve_object(game, reference)
        .filter(|&id| game.object(id).is_some_and(|o| o.zone == Zone::Battlefield))
}

fn resolve_recipients(
    game: &GameState,
    recipient: Recipient,
    ctx: &ResolutionContext,
) -> Result<Vec<Target>, EngineError> {
    Ok(match recipient {
        Recipient::Target(slot) => ctx.target(slot).into_iter().collect(),
        Recipient::Object(reference) => on_battlefield(game, ctx, reference)
            .map(Target::Object)
            .into_iter()
            .collect(),
        Recipient::Player(reference) => ctx
            .resolve_players(game, reference)?
            .into_iter()
            .map(Target::Player)
            .collect(),
    })
}

/// Remove a spell or ability from the stack. A countered spell goes to its
/// owner's graveyard.
fn counter_stack_entry(game: &mut GameState, id: ObjectId) -> Result<(), EngineError> {
    let Some(index) = game.stack.iter().position(|e| e.id == id) else {
        return Ok(());
    };
    let entry = game.stack.remove(index);
    debug!(entry = %entry.description, "countered");
    if entry.is_spell() {
        game.move_object(entry.id, Zone::Graveyard)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::continuous::Modification;
    use crate::effect::{CustomEffect, Until};
    use crate::filter::ObjectFilter;
    use crate::mana::ManaSymbol;
    use crate::object::CounterType;
    use crate::tests::fixtures;

    fn setup() -> (GameState, PlayerId, PlayerId) {
        let game = GameState::new(GameConfig::default()).unwrap();
        (game, PlayerId::from_index(0), PlayerId::from_index(1))
    }

    #[test]
    fn test_damage_skips_illegal_targets() {
        let (mut game, alice, bob) = setup();
        let source = game
            .add_card(&fixtures::grizzly_bears(), alice, Zone::Battlefield)
            .unwrap();
        let bears = game
            .add_card(&fixtures::grizzly_bears(), bob, Zone::Battlefield)
            .unwrap();
        let mut ctx = ResolutionContext::new(source, alice)
            .with_targets(vec![Target::Object(bears), Target::Player(bob)]);
        ctx.target_legal[0] = false;

        let effects = [
            Effect::deal_damage_to_target(2, 0),
            Effect::deal_damage_to_target(2, 1),
        ];
        execute_effects(&mut game, &effects, &ctx).unwrap();
        assert_eq!(game.object(bears).unwrap().damage, 0);
        assert_eq!(game.player(bob).unwrap().life, 18);
    }

    #[test]
    fn test_filtered_pump_locks_onto_current_objects() {
        let (mut game, alice, _) = setup();
        let early = game
            .add_card(&fixtures::grizzly_bears(), alice, Zone::Battlefield)
            .unwrap();
        let ctx = ResolutionContext::new(early, alice);
        let effect = Effect::ApplyContinuous {
            affected: Affected::Matching(ObjectFilter::creature().you_control()),
            modification: Modification::ModifyPowerToughness {
                power: 1,
                toughness: 1,
            },
            duration: Until::EndOfTurn,
            reads: Vec::new(),
        };
        execute_effect(&mut game, &effect, &ctx).unwrap();
        let late = game
            .add_card(&fixtures::grizzly_bears(), alice, Zone::Battlefield)
            .unwrap();

        let view = game.project().unwrap();
        assert_eq!(view.power(early), Some(3));
        assert_eq!(view.power(late), Some(2));
    }

    #[test]
    fn test_attached_to_source_uses_last_known_information() {
        let (mut game, alice, _) = setup();
        let bears = game
            .add_card(&fixtures::grizzly_bears(), alice, Zone::Battlefield)
            .unwrap();
        let aura = game
            .add_card(&fixtures::holy_strength(), alice, Zone::Battlefield)
            .unwrap();
        game.store.attach(aura, bears).unwrap();
        let snapshot = ObjectSnapshot::from_projected(
            game.project().unwrap().object(aura).unwrap(),
        );
        game.move_object(aura, Zone::Graveyard).unwrap();

        let ctx = ResolutionContext::new(aura, alice).with_snapshot(snapshot);
        assert_eq!(ctx.resolve_object(&game, ObjectRef::Source), None);
        let effect = Effect::PutCounters {
            object: ObjectRef::AttachedToSource,
            counter: CounterType::PlusOnePlusOne,
            count: 1,
        };
        execute_effect(&mut game, &effect, &ctx).unwrap();
        assert_eq!(
            game.object(bears)
                .unwrap()
                .counter_count(CounterType::PlusOnePlusOne),
            1
        );
    }

    #[test]
    fn test_destroy_respects_indestructible() {
        let (mut game, alice, bob) = setup();
        let golem = game
            .add_card(&fixtures::indestructible_golem(), bob, Zone::Battlefield)
            .unwrap();
        let bears = game
            .add_card(&fixtures::grizzly_bears(), bob, Zone::Battlefield)
            .unwrap();
        for id in [golem, bears] {
            let ctx = ResolutionContext::new(id, alice).with_targets(vec![Target::Object(id)]);
            let effect = Effect::Destroy {
                object: ObjectRef::Target(0),
            };
            execute_effect(&mut game, &effect, &ctx).unwrap();
        }
        assert_eq!(game.object(golem).unwrap().zone, Zone::Battlefield);
        assert_eq!(game.object(bears).unwrap().zone, Zone::Graveyard);
    }

    #[test]
    fn test_signal_event_expires_waiting_effects() {
        let (mut game, alice, _) = setup();
        let bears = game
            .add_card(&fixtures::grizzly_bears(), alice, Zone::Battlefield)
            .unwrap();
        let ctx = ResolutionContext::new(bears, alice).with_targets(vec![Target::Object(bears)]);
        let pump = Effect::ApplyContinuous {
            affected: Affected::Object(ObjectRef::Target(0)),
            modification: Modification::ModifyPowerToughness {
                power: 2,
                toughness: 0,
            },
            duration: Until::Event(UntilEvent::Named("storm passes".to_string())),
            reads: Vec::new(),
        };
        execute_effect(&mut game, &pump, &ctx).unwrap();
        assert_eq!(game.project().unwrap().power(bears), Some(4));

        execute_effect(
            &mut game,
            &Effect::SignalEvent("something else".to_string()),
            &ctx,
        )
        .unwrap();
        assert_eq!(game.project().unwrap().power(bears), Some(4));

        execute_effect(
            &mut game,
            &Effect::SignalEvent("storm passes".to_string()),
            &ctx,
        )
        .unwrap();
        assert_eq!(game.project().unwrap().power(bears), Some(2));
    }

    #[test]
    fn test_mana_tokens_and_loss() {
        let (mut game, alice, bob) = setup();
        let source = game
            .add_card(&fixtures::grizzly_bears(), alice, Zone::Battlefield)
            .unwrap();
        let ctx = ResolutionContext::new(source, alice);
        let effects = [
            Effect::AddMana {
                symbol: ManaSymbol::Green,
                amount: 2,
            },
            Effect::CreateTokens {
                definition: Box::new(fixtures::grizzly_bears()),
                count: 2,
            },
            Effect::LoseTheGame {
                player: PlayerRef::EachOpponent,
            },
        ];
        execute_effects(&mut game, &effects, &ctx).unwrap();

        let player = game.player(alice).unwrap();
        assert_eq!(player.mana_pool.amount(ManaSymbol::Green), 2);
        assert_eq!(game.store.battlefield().len(), 3);
        assert!(game.player(bob).unwrap().pending_loss.is_some());
        assert!(game.player(alice).unwrap().pending_loss.is_none());
    }

    #[test]
    fn test_custom_effect_sees_context() {
        let (mut game, alice, _) = setup();
        let source = game
            .add_card(&fixtures::grizzly_bears(), alice, Zone::Battlefield)
            .unwrap();
        let custom = CustomEffect::new("tap the source", |game, ctx| {
            game.store.set_tapped(ctx.source, true)?;
            Ok(())
        });
        execute_effect(&mut game, &Effect::Custom(custom), &ResolutionContext::new(source, alice))
            .unwrap();
        assert!(game.object(source).unwrap().tapped);
    }
}
