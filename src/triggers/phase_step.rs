//! "At the beginning of [step]" triggers.

use crate::filter::PlayerFilter;
use crate::game_event::GameEvent;
use crate::game_state::Step;

use super::matcher_trait::{TriggerContext, TriggerMatcher};

/// Fires at the beginning of a step of a matching player's turn.
#[derive(Debug, Clone, PartialEq)]
pub struct BeginningOfStepTrigger {
    pub step: Step,
    /// Whose turn it has to be.
    pub player: PlayerFilter,
}

impl BeginningOfStepTrigger {
    pub fn new(step: Step, player: PlayerFilter) -> Self {
        Self { step, player }
    }

    pub fn your_upkeep() -> Self {
        Self::new(Step::Upkeep, PlayerFilter::You)
    }

    pub fn each_upkeep() -> Self {
        Self::new(Step::Upkeep, PlayerFilter::Any)
    }

    pub fn your_end_step() -> Self {
        Self::new(Step::End, PlayerFilter::You)
    }
}

impl TriggerMatcher for BeginningOfStepTrigger {
    fn matches(&self, event: &GameEvent, ctx: &TriggerContext) -> bool {
        let GameEvent::StepBegan {
            step,
            active_player,
        } = event
        else {
            return false;
        };
        *step == self.step && self.player.matches(*active_player, &ctx.filter_ctx())
    }

    fn display(&self) -> String {
        let step = match self.step {
            Step::Upkeep => "upkeep",
            Step::Draw => "draw step",
            Step::BeginCombat => "combat",
            Step::End => "end step",
            other => return format!("At the beginning of {other:?}"),
        };
        match &self.player {
            PlayerFilter::You => format!("At the beginning of your {step}"),
            PlayerFilter::Any => format!("At the beginning of each {step}"),
            PlayerFilter::Opponent => format!("At the beginning of each opponent's {step}"),
            PlayerFilter::Specific(player) => format!("At the beginning of {player}'s {step}"),
        }
    }

    fn clone_box(&self) -> Box<dyn TriggerMatcher> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            BeginningOfStepTrigger::your_upkeep().display(),
            "At the beginning of your upkeep"
        );
        assert_eq!(
            BeginningOfStepTrigger::new(Step::End, PlayerFilter::Opponent).display(),
            "At the beginning of each opponent's end step"
        );
    }
}
