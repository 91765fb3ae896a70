//! Pending player decisions.
//!
//! When the engine needs a player's choice in the middle of settling the game
//! (legend rule, ordering simultaneous triggers, choosing targets for a
//! trigger) it records one [`PendingDecision`] and stops. Only the matching
//! `SubmitDecision` command moves it forward.

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::error::IllegalAction;
use crate::game_state::Target;
use crate::ids::{ObjectId, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct DecisionId(pub u64);

/// A trigger offered for ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct TriggerChoice {
    pub source: ObjectId,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum DecisionKind {
    /// Two or more legendary permanents with the same name: keep one.
    LegendRule {
        name: String,
        permanents: Vec<ObjectId>,
    },
    /// Put simultaneous triggers on the stack. The first index in the answer
    /// goes on the stack first and so resolves last.
    OrderTriggers { triggers: Vec<TriggerChoice> },
    /// Choose one target per slot for a triggered ability.
    ChooseTargets {
        source: ObjectId,
        description: String,
        candidates: Vec<Vec<Target>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct PendingDecision {
    pub id: DecisionId,
    pub player: PlayerId,
    pub kind: DecisionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum DecisionAnswer {
    Keep(ObjectId),
    Order(Vec<usize>),
    Targets(Vec<Target>),
}

impl PendingDecision {
    /// Check an answer against the legal answers of this decision.
    pub fn validate(&self, answer: &DecisionAnswer) -> Result<(), IllegalAction> {
        match (&self.kind, answer) {
            (DecisionKind::LegendRule { permanents, .. }, DecisionAnswer::Keep(keep)) => {
                if permanents.contains(keep) {
                    Ok(())
                } else {
                    Err(IllegalAction::InvalidAnswer(format!(
                        "{keep} is not one of the legendary permanents"
                    )))
                }
            }
            (DecisionKind::OrderTriggers { triggers }, DecisionAnswer::Order(order)) => {
                let mut seen = vec![false; triggers.len()];
                if order.len() != triggers.len() {
                    return Err(IllegalAction::InvalidAnswer(format!(
                        "expected an order of {} triggers",
                        triggers.len()
                    )));
                }
                for &index in order {
                    match seen.get_mut(index) {
                        Some(slot) if !*slot => *slot = true,
                        _ => {
                            return Err(IllegalAction::InvalidAnswer(format!(
                                "index {index} is out of range or repeated"
                            )));
                        }
                    }
                }
                Ok(())
            }
            (DecisionKind::ChooseTargets { candidates, .. }, DecisionAnswer::Targets(targets)) => {
                if targets.len() != candidates.len() {
                    return Err(IllegalAction::WrongTargetCount {
                        expected: candidates.len(),
                        got: targets.len(),
                    });
                }
                for (slot, (target, legal)) in targets.iter().zip(candidates).enumerate() {
                    if !legal.contains(target) {
                        return Err(IllegalAction::IllegalTarget { slot });
                    }
                }
                Ok(())
            }
            _ => Err(IllegalAction::InvalidAnswer(
                "answer does not fit the decision".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_decision(n: usize) -> PendingDecision {
        PendingDecision {
            id: DecisionId(1),
            player: PlayerId::from_index(0),
            kind: DecisionKind::OrderTriggers {
                triggers: (0..n)
                    .map(|i| TriggerChoice {
                        source: ObjectId::from_raw(i as u64 + 1),
                        description: format!("trigger {i}"),
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn test_order_must_be_permutation() {
        let decision = order_decision(3);
        assert!(decision.validate(&DecisionAnswer::Order(vec![2, 0, 1])).is_ok());
        assert!(decision.validate(&DecisionAnswer::Order(vec![0, 0, 1])).is_err());
        assert!(decision.validate(&DecisionAnswer::Order(vec![0, 1])).is_err());
        assert!(decision.validate(&DecisionAnswer::Order(vec![0, 1, 3])).is_err());
    }

    #[test]
    fn test_legend_rule_answer() {
        let a = ObjectId::from_raw(1);
        let b = ObjectId::from_raw(2);
        let decision = PendingDecision {
            id: DecisionId(2),
            player: PlayerId::from_index(0),
            kind: DecisionKind::LegendRule {
                name: "Isamaru".to_string(),
                permanents: vec![a, b],
            },
        };
        assert!(decision.validate(&DecisionAnswer::Keep(b)).is_ok());
        assert!(decision.validate(&DecisionAnswer::Keep(ObjectId::from_raw(3))).is_err());
        assert!(decision.validate(&DecisionAnswer::Order(vec![0])).is_err());
    }

    #[test]
    fn test_targets_checked_per_slot() {
        let alice = Target::Player(PlayerId::from_index(0));
        let bob = Target::Player(PlayerId::from_index(1));
        let decision = PendingDecision {
            id: DecisionId(3),
            player: PlayerId::from_index(0),
            kind: DecisionKind::ChooseTargets {
                source: ObjectId::from_raw(9),
                description: "deal 1 damage to any target".to_string(),
                candidates: vec![vec![bob]],
            },
        };
        assert!(decision.validate(&DecisionAnswer::Targets(vec![bob])).is_ok());
        assert_eq!(
            decision.validate(&DecisionAnswer::Targets(vec![alice])),
            Err(IllegalAction::IllegalTarget { slot: 0 })
        );
    }
}
