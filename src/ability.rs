//! Abilities printed on objects: static, activated and triggered.

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::characteristics::Keyword;
use crate::continuous::{Aspect, ContinuousEffect, EffectTarget, Modification};
use crate::cost::Cost;
use crate::effect::Effect;
use crate::filter::{FilterContext, ObjectFilter, PlayerFilter};
use crate::game_state::{GameState, Target};
use crate::ids::{ObjectId, PlayerId};
use crate::projection::ProjectedView;
use crate::triggers::Trigger;
use crate::zone::Zone;

/// A static ability: generates a continuous effect while its source is on the
/// battlefield.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticAbility {
    pub applies_to: EffectTarget,
    pub modification: Modification,
    pub reads: Vec<Aspect>,
    pub characteristic_defining: bool,
}

impl StaticAbility {
    pub fn new(applies_to: EffectTarget, modification: Modification) -> Self {
        Self {
            applies_to,
            modification,
            reads: Vec::new(),
            characteristic_defining: false,
        }
    }

    /// "[Filter] get +P/+T."
    pub fn anthem(filter: ObjectFilter, power: i32, toughness: i32) -> Self {
        Self::new(
            EffectTarget::Filter(filter),
            Modification::ModifyPowerToughness { power, toughness },
        )
    }

    /// "Enchanted/equipped creature gets +P/+T."
    pub fn attached_pump(power: i32, toughness: i32) -> Self {
        Self::new(
            EffectTarget::AttachedToSource,
            Modification::ModifyPowerToughness { power, toughness },
        )
    }

    /// "[Filter] have [keyword]."
    pub fn grant_keyword(filter: ObjectFilter, keyword: Keyword) -> Self {
        Self::new(EffectTarget::Filter(filter), Modification::AddKeyword(keyword))
    }

    pub fn characteristic_defining(mut self) -> Self {
        self.characteristic_defining = true;
        self
    }

    pub fn reading(mut self, aspects: impl IntoIterator<Item = Aspect>) -> Self {
        self.reads.extend(aspects);
        self
    }

    /// The continuous effect this ability generates for a given source.
    /// The timestamp is assigned when the effect is registered.
    pub fn to_effect(&self, source: ObjectId, controller: PlayerId) -> ContinuousEffect {
        let effect = ContinuousEffect::new(
            source,
            controller,
            self.applies_to.clone(),
            self.modification.clone(),
        )
        .from_static_ability()
        .reading(self.reads.iter().copied());
        if self.characteristic_defining {
            effect.characteristic_defining()
        } else {
            effect
        }
    }
}

/// When an ability or spell may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Timing {
    #[default]
    Instant,
    /// Main phase, stack empty, your turn.
    Sorcery,
}

/// What an ability on the stack does when its source has left the battlefield
/// by the time it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum SourceLeftPolicy {
    /// Resolve using the snapshot taken when the ability was put on the stack.
    #[default]
    UseLastKnownInformation,
    /// Do nothing.
    DoNothing,
}

/// A target slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    Object(ObjectFilter),
    Player(PlayerFilter),
    /// Creature, planeswalker or player.
    Any,
    /// A spell on the stack.
    Spell,
}

impl TargetSpec {
    pub fn creature() -> Self {
        TargetSpec::Object(ObjectFilter::creature())
    }

    pub fn player() -> Self {
        TargetSpec::Player(PlayerFilter::Any)
    }

    /// Whether `target` is a legal choice for this slot right now.
    pub fn is_legal(
        &self,
        target: &Target,
        state: &GameState,
        view: &ProjectedView,
        ctx: &FilterContext,
    ) -> bool {
        match (self, target) {
            (TargetSpec::Player(filter), Target::Player(player)) => {
                state.is_in_game(*player) && filter.matches(*player, ctx)
            }
            (TargetSpec::Any, Target::Player(player)) => state.is_in_game(*player),
            (TargetSpec::Object(filter), Target::Object(id)) => view
                .object(*id)
                .is_some_and(|obj| filter.matches(obj, ctx) && targetable_by(view, *id, ctx)),
            (TargetSpec::Any, Target::Object(id)) => view.object(*id).is_some_and(|obj| {
                obj.zone == Zone::Battlefield
                    && (obj.characteristics.is_creature()
                        || obj
                            .characteristics
                            .has_card_type(crate::types::CardType::Planeswalker))
                    && targetable_by(view, *id, ctx)
            }),
            (TargetSpec::Spell, Target::Object(id)) => state.stack.iter().any(|e| e.id == *id),
            _ => false,
        }
    }

    /// Every legal choice for this slot.
    pub fn legal_targets(
        &self,
        state: &GameState,
        view: &ProjectedView,
        ctx: &FilterContext,
    ) -> Vec<Target> {
        let mut candidates: Vec<Target> = Vec::new();
        match self {
            TargetSpec::Player(_) => {
                candidates.extend(state.turn_order.iter().map(|&p| Target::Player(p)));
            }
            TargetSpec::Any => {
                candidates.extend(view.battlefield().map(|o| Target::Object(o.id)));
                candidates.extend(state.turn_order.iter().map(|&p| Target::Player(p)));
            }
            TargetSpec::Object(_) => {
                candidates.extend(view.objects().map(|o| Target::Object(o.id)));
            }
            TargetSpec::Spell => {
                candidates.extend(state.stack.iter().map(|e| Target::Object(e.id)));
            }
        }
        candidates
            .into_iter()
            .filter(|t| self.is_legal(t, state, view, ctx))
            .collect()
    }
}

fn targetable_by(view: &ProjectedView, id: ObjectId, ctx: &FilterContext) -> bool {
    let Some(obj) = view.object(id) else {
        return false;
    };
    !(obj.characteristics.has_keyword(Keyword::Hexproof) && obj.characteristics.controller != ctx.you)
}

/// An activated ability: "[Cost]: [Effect]."
#[derive(Debug, Clone, PartialEq)]
pub struct ActivatedAbility {
    pub cost: Cost,
    pub effects: Vec<Effect>,
    pub targets: Vec<TargetSpec>,
    pub timing: Timing,
    pub source_left: SourceLeftPolicy,
    pub description: String,
}

impl ActivatedAbility {
    pub fn new(cost: Cost, effects: Vec<Effect>) -> Self {
        Self {
            cost,
            effects,
            targets: Vec::new(),
            timing: Timing::Instant,
            source_left: SourceLeftPolicy::default(),
            description: String::new(),
        }
    }

    pub fn targeting(mut self, spec: TargetSpec) -> Self {
        self.targets.push(spec);
        self
    }

    pub fn sorcery_speed(mut self) -> Self {
        self.timing = Timing::Sorcery;
        self
    }

    pub fn when_source_left(mut self, policy: SourceLeftPolicy) -> Self {
        self.source_left = policy;
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mana abilities produce mana, have no targets and don't use the stack.
    pub fn is_mana_ability(&self) -> bool {
        self.targets.is_empty()
            && !self.effects.is_empty()
            && self.effects.iter().all(Effect::is_mana_effect)
    }
}

/// A triggered ability: "When/Whenever/At [trigger], [effect]."
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAbility {
    pub trigger: Trigger,
    pub effects: Vec<Effect>,
    pub targets: Vec<TargetSpec>,
    pub source_left: SourceLeftPolicy,
}

impl TriggeredAbility {
    pub fn new(trigger: Trigger, effects: Vec<Effect>) -> Self {
        Self {
            trigger,
            effects,
            targets: Vec::new(),
            source_left: SourceLeftPolicy::default(),
        }
    }

    pub fn targeting(mut self, spec: TargetSpec) -> Self {
        self.targets.push(spec);
        self
    }

    pub fn when_source_left(mut self, policy: SourceLeftPolicy) -> Self {
        self.source_left = policy;
        self
    }

    pub fn description(&self) -> String {
        self.trigger.display()
    }
}
