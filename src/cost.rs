//! Costs and cost payment.
//!
//! A [`Cost`] is a list of components paid together. Payment goes through the
//! [`CostPayer`] trait, which takes the current state and returns the state
//! after payment or a rejection. The state passed in is never touched, so a
//! rejected payment leaves nothing half-paid.

use std::fmt;

use tracing::trace;

use crate::characteristics::Keyword;
use crate::error::EngineError;
use crate::filter::{FilterContext, ObjectFilter};
use crate::game_state::GameState;
use crate::ids::{ObjectId, PlayerId};
use crate::mana::{ManaCost, ManaShortfall};
use crate::object::CounterType;
use crate::zone::Zone;

/// One part of a cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostComponent {
    Mana(ManaCost),
    /// {T}
    TapSource,
    SacrificeSource,
    /// Sacrifice a permanent you control matching the filter.
    Sacrifice(ObjectFilter),
    Discard(u32),
    PayLife(u32),
    RemoveCounters { counter: CounterType, count: u32 },
}

impl fmt::Display for CostComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostComponent::Mana(mana) => write!(f, "{}", mana.to_oracle()),
            CostComponent::TapSource => write!(f, "{{T}}"),
            CostComponent::SacrificeSource => write!(f, "Sacrifice this permanent"),
            CostComponent::Sacrifice(filter) => write!(f, "Sacrifice a {}", filter.describe()),
            CostComponent::Discard(1) => write!(f, "Discard a card"),
            CostComponent::Discard(n) => write!(f, "Discard {n} cards"),
            CostComponent::PayLife(n) => write!(f, "Pay {n} life"),
            CostComponent::RemoveCounters { counter, count } => {
                write!(f, "Remove {count} {counter:?} counter(s)")
            }
        }
    }
}

/// A complete cost.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cost {
    pub components: Vec<CostComponent>,
}

impl Cost {
    pub fn free() -> Self {
        Self::default()
    }

    pub fn new(components: Vec<CostComponent>) -> Self {
        Self { components }
    }

    pub fn mana(cost: ManaCost) -> Self {
        Self::from(CostComponent::Mana(cost))
    }

    pub fn with(mut self, component: CostComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn is_free(&self) -> bool {
        self.components.iter().all(|c| match c {
            CostComponent::Mana(mana) => mana.is_empty(),
            _ => false,
        })
    }

    /// The mana part of the cost, if any.
    pub fn mana_cost(&self) -> Option<&ManaCost> {
        self.components.iter().find_map(|c| match c {
            CostComponent::Mana(mana) => Some(mana),
            _ => None,
        })
    }

    pub fn requires_tap(&self) -> bool {
        self.components.contains(&CostComponent::TapSource)
    }
}

impl From<CostComponent> for Cost {
    fn from(component: CostComponent) -> Self {
        Self {
            components: vec![component],
        }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "{{0}}");
        }
        let parts: Vec<String> = self.components.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Objects the payer picked for choice-bearing components. When a choice is
/// missing the payer falls back to the first eligible objects in zone order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentChoices {
    pub sacrifice: Vec<ObjectId>,
    pub discard: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentContext {
    /// The spell or permanent whose cost is being paid.
    pub source: ObjectId,
    pub payer: PlayerId,
    pub choices: PaymentChoices,
}

impl PaymentContext {
    pub fn new(source: ObjectId, payer: PlayerId) -> Self {
        Self {
            source,
            payer,
            choices: PaymentChoices::default(),
        }
    }

    pub fn with_choices(mut self, choices: PaymentChoices) -> Self {
        self.choices = choices;
        self
    }
}

/// Why a cost could not be paid.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CostRejection {
    #[error("source {0} not found")]
    SourceNotFound(ObjectId),

    #[error("{0} is already tapped")]
    AlreadyTapped(ObjectId),

    #[error("{0} has summoning sickness")]
    SummoningSickness(ObjectId),

    #[error("{0}")]
    NotEnoughMana(ManaShortfall),

    #[error("not enough life to pay {0}")]
    InsufficientLife(u32),

    #[error("no valid permanent to sacrifice")]
    NoValidSacrifice,

    #[error("not enough cards in hand to discard {0}")]
    InsufficientCardsInHand(u32),

    #[error("not enough {counter:?} counters on {object}")]
    InsufficientCounters {
        object: ObjectId,
        counter: CounterType,
    },

    #[error(transparent)]
    Internal(#[from] EngineError),
}

impl From<crate::error::InvariantFailure> for CostRejection {
    fn from(failure: crate::error::InvariantFailure) -> Self {
        CostRejection::Internal(EngineError::Invariant(failure))
    }
}

impl From<CostRejection> for EngineError {
    fn from(rejection: CostRejection) -> Self {
        match rejection {
            CostRejection::Internal(err) => err,
            other => EngineError::IllegalAction(crate::error::IllegalAction::CannotPay(
                other.to_string(),
            )),
        }
    }
}

/// Pays costs.
///
/// Implementations must be all-or-nothing: either the returned state has the
/// whole cost paid or an error comes back and nothing changed.
pub trait CostPayer: fmt::Debug {
    fn try_pay(
        &self,
        cost: &Cost,
        ctx: &PaymentContext,
        state: &GameState,
    ) -> Result<GameState, CostRejection>;

    fn can_pay(&self, cost: &Cost, ctx: &PaymentContext, state: &GameState) -> bool {
        self.try_pay(cost, ctx, state).is_ok()
    }
}

/// Pays from the player's mana pool and the objects they control.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolCostPayer;

impl CostPayer for PoolCostPayer {
    fn try_pay(
        &self,
        cost: &Cost,
        ctx: &PaymentContext,
        state: &GameState,
    ) -> Result<GameState, CostRejection> {
        let mut next = state.clone();
        for component in &cost.components {
            pay_component(component, ctx, &mut next)?;
        }
        trace!(source = %ctx.source, payer = %ctx.payer, cost = %cost, "cost paid");
        Ok(next)
    }
}

fn pay_component(
    component: &CostComponent,
    ctx: &PaymentContext,
    state: &mut GameState,
) -> Result<(), CostRejection> {
    match component {
        CostComponent::Mana(mana) => {
            let player = state
                .store
                .player_mut(ctx.payer)
                .ok_or(EngineError::IllegalAction(
                    crate::error::IllegalAction::UnknownPlayer(ctx.payer),
                ))?;
            player
                .mana_pool
                .pay(mana)
                .map_err(CostRejection::NotEnoughMana)
        }
        CostComponent::TapSource => {
            let obj = state
                .object(ctx.source)
                .filter(|o| o.zone == Zone::Battlefield)
                .ok_or(CostRejection::SourceNotFound(ctx.source))?;
            if obj.tapped {
                return Err(CostRejection::AlreadyTapped(ctx.source));
            }
            if obj.summoning_sick {
                let view = state.project()?;
                let is_creature = view
                    .characteristics(ctx.source)
                    .is_some_and(|c| c.is_creature());
                if is_creature && !view.has_capability(ctx.source, Keyword::Haste) {
                    return Err(CostRejection::SummoningSickness(ctx.source));
                }
            }
            state.store.set_tapped(ctx.source, true)?;
            Ok(())
        }
        CostComponent::SacrificeSource => {
            if !state
                .object(ctx.source)
                .is_some_and(|o| o.zone == Zone::Battlefield)
            {
                return Err(CostRejection::SourceNotFound(ctx.source));
            }
            state.move_object(ctx.source, Zone::Graveyard)?;
            Ok(())
        }
        CostComponent::Sacrifice(filter) => {
            let view = state.project()?;
            let filter_ctx = FilterContext::new(ctx.payer, Some(ctx.source));
            let eligible = |id: ObjectId| {
                view.object(id).is_some_and(|o| {
                    o.zone == Zone::Battlefield
                        && o.controller() == ctx.payer
                        && filter.matches(o, &filter_ctx)
                })
            };
            let chosen = ctx
                .choices
                .sacrifice
                .iter()
                .copied()
                .find(|&id| eligible(id))
                .or_else(|| view.battlefield().map(|o| o.id).find(|&id| eligible(id)))
                .ok_or(CostRejection::NoValidSacrifice)?;
            state.move_object(chosen, Zone::Graveyard)?;
            Ok(())
        }
        CostComponent::Discard(count) => {
            let hand = state
                .player(ctx.payer)
                .map(|p| p.hand.clone())
                .unwrap_or_default();
            let mut picked: Vec<ObjectId> = ctx
                .choices
                .discard
                .iter()
                .copied()
                .filter(|id| hand.contains(id) && *id != ctx.source)
                .collect();
            picked.dedup();
            for &card in &hand {
                if picked.len() >= *count as usize {
                    break;
                }
                if card != ctx.source && !picked.contains(&card) {
                    picked.push(card);
                }
            }
            picked.truncate(*count as usize);
            if picked.len() < *count as usize {
                return Err(CostRejection::InsufficientCardsInHand(*count));
            }
            for card in picked {
                state.move_object(card, Zone::Graveyard)?;
            }
            Ok(())
        }
        CostComponent::PayLife(amount) => {
            let life = state.player(ctx.payer).map_or(0, |p| p.life);
            if life < *amount as i32 {
                return Err(CostRejection::InsufficientLife(*amount));
            }
            state.store.lose_life(ctx.payer, *amount);
            Ok(())
        }
        CostComponent::RemoveCounters { counter, count } => {
            let available = state
                .object(ctx.source)
                .ok_or(CostRejection::SourceNotFound(ctx.source))?
                .counter_count(*counter);
            if available < *count {
                return Err(CostRejection::InsufficientCounters {
                    object: ctx.source,
                    counter: *counter,
                });
            }
            state.store.remove_counters(ctx.source, *counter, *count)?;
            Ok(())
        }
    }
}
