//! Engine error taxonomy.
//!
//! Three kinds of failure leave the engine:
//! - [`IllegalAction`]: the command broke a rule. Recoverable, nothing mutated.
//! - [`EngineError::DecisionPending`]: a player choice is outstanding and the
//!   command was not its answer. Recoverable.
//! - [`InvariantFailure`]: the engine itself is inconsistent. Fatal for the game.
//!
//! State-based actions are not errors. They are silent corrections that only
//! show up in the next projected view.

use crate::continuous::Layer;
use crate::decision::DecisionId;
use crate::ids::{ObjectId, PlayerId};
use crate::zone::Zone;

/// A command that the rules don't allow right now.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IllegalAction {
    #[error("{player} does not have priority")]
    NotPriorityHolder { player: PlayerId },

    #[error("{what} can only be done at sorcery speed")]
    SorcerySpeed { what: String },

    #[error("{object} is not in {player}'s hand")]
    NotInHand { player: PlayerId, object: ObjectId },

    #[error("{object} is not in the expected zone (found in {zone:?})")]
    WrongZone { object: ObjectId, zone: Zone },

    #[error("unknown object {0}")]
    UnknownObject(ObjectId),

    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("cannot pay cost: {0}")]
    CannotPay(String),

    #[error("illegal target for slot {slot}")]
    IllegalTarget { slot: usize },

    #[error("expected {expected} targets, got {got}")]
    WrongTargetCount { expected: usize, got: usize },

    #[error("{player} has already played a land this turn")]
    LandAlreadyPlayed { player: PlayerId },

    #[error("{0} is not a land")]
    NotALand(ObjectId),

    #[error("{0} is a land and can't be cast")]
    CannotCastLand(ObjectId),

    #[error("{object} has no ability #{index}")]
    AbilityNotFound { object: ObjectId, index: usize },

    #[error("{player} does not control {object}")]
    NotController { player: PlayerId, object: ObjectId },

    #[error("not allowed during the current step")]
    WrongStep,

    #[error("{object} can't attack: {reason}")]
    InvalidAttacker { object: ObjectId, reason: String },

    #[error("{object} can't block: {reason}")]
    InvalidBlocker { object: ObjectId, reason: String },

    #[error("the game is over")]
    GameOver,

    #[error("no pending decision with that id")]
    UnknownDecision,

    #[error("invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("{player} is not the player making this decision")]
    NotYourDecision { player: PlayerId },
}

/// An internal inconsistency. The game can't continue after one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantFailure {
    #[error("dependency cycle in layer {}: {dump}", layer.number())]
    DependencyCycle { layer: Layer, dump: String },

    #[error("tried to resolve with an empty stack")]
    StackUnderflow,

    #[error("state-based actions did not converge after {passes} passes")]
    SbaDidNotConverge { passes: u32 },

    #[error("non-monotonic effect timestamp: last {last}, got {got}")]
    NonMonotonicTimestamp { last: u64, got: u64 },

    #[error("object {0} referenced but not in the store")]
    UnknownObject(ObjectId),

    #[error("the game was halted by an earlier fatal error")]
    GameHalted,
}

/// Top-level error returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("illegal action: {0}")]
    IllegalAction(#[from] IllegalAction),

    #[error("decision {id:?} is pending")]
    DecisionPending { id: DecisionId },

    #[error("internal invariant failure: {0}")]
    Invariant(#[from] InvariantFailure),
}

impl EngineError {
    /// Fatal errors halt the game.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Invariant(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_and_severity() {
        let err: EngineError = IllegalAction::LandAlreadyPlayed {
            player: PlayerId::from_index(0),
        }
        .into();
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "illegal action: player#0 has already played a land this turn"
        );

        let err: EngineError = InvariantFailure::DependencyCycle {
            layer: Layer::Type,
            dump: "a -> b -> a".to_string(),
        }
        .into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("layer 4"));
    }
}
