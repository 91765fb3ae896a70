pub mod ability;
pub mod cards;
pub mod characteristics;
pub mod color;
pub mod config;
pub mod continuous;
pub mod cost;
pub mod decision;
pub mod dependency;
pub mod effect;
pub mod error;
pub mod executor;
pub mod filter;
pub mod game_event;
pub mod game_loop;
pub mod game_state;
pub mod ids;
pub mod mana;
pub mod object;
pub mod player;
pub mod projection;
pub mod rules;
pub mod snapshot;
pub mod store;
pub mod triggers;
pub mod turn;
pub mod types;
pub mod zone;

#[cfg(test)]
mod tests;

pub use ability::{
    ActivatedAbility, SourceLeftPolicy, StaticAbility, TargetSpec, Timing, TriggeredAbility,
};
pub use cards::{CardCatalog, CardDefinition, CardDefinitionBuilder, CardRegistry};
pub use characteristics::{CalculatedCharacteristics, Characteristics, Keyword};
pub use color::{Color, ColorSet};
pub use config::{ConfigError, GameConfig};
pub use continuous::{
    Aspect, ContinuousEffect, ContinuousEffectId, ContinuousEffectManager, CustomModification,
    EffectSourceType, EffectTarget, Layer, Modification, PtSublayer, Value,
};
pub use cost::{
    Cost, CostComponent, CostPayer, CostRejection, PaymentChoices, PaymentContext, PoolCostPayer,
};
pub use decision::{DecisionAnswer, DecisionId, DecisionKind, PendingDecision, TriggerChoice};
pub use dependency::{effect_depends_on, sort_with_dependencies};
pub use effect::{
    Affected, CustomEffect, Effect, ObjectRef, PlayerRef, Recipient, Until, UntilEvent,
};
pub use error::{EngineError, IllegalAction, InvariantFailure};
pub use executor::{ResolutionContext, execute_effect, execute_effects};
pub use filter::{FilterContext, ObjectFilter, PlayerFilter};
pub use game_event::{DamageTarget, GameEvent};
pub use game_loop::{Command, Engine, EngineState, put_on_stack, resolve_top};
pub use game_state::{
    GameResult, GameState, Phase, StackEntry, StackEntryKind, Step, Target, TurnState,
};
pub use ids::{CardId, ObjectId, PlayerId};
pub use mana::{ManaCost, ManaPool, ManaSymbol};
pub use object::{CounterType, Object, ObjectKind};
pub use player::Player;
pub use projection::{PlayerView, ProjectedObject, ProjectedView, project};
pub use rules::{
    AttackerInfo, CombatState, LoseReason, SbaOutcome, StateBasedAction, apply_legend_rule_choice,
    apply_state_based_actions, can_attack, can_block, check_and_apply_sbas,
    check_and_apply_sbas_with, check_state_based_actions, has_vigilance,
};
pub use snapshot::ObjectSnapshot;
pub use store::ObjectStore;
pub use triggers::{
    Trigger, TriggerContext, TriggerMatcher, TriggerQueue, TriggeredAbilityEntry, collect,
};
pub use turn::{
    PriorityResult, PriorityTracker, advance_step, has_priority, is_main_phase, is_sorcery_timing,
    pass_priority,
};
pub use types::{CardType, Subtype, Supertype};
pub use zone::Zone;
