//! Rules module for game mechanics.
//!
//! This module contains the rules logic for combat and state-based actions.

pub mod combat;
pub mod state_based;

pub use combat::{AttackerInfo, CombatState, can_attack, can_block, has_vigilance};
pub use state_based::{
    LoseReason, SbaOutcome, StateBasedAction, apply_legend_rule_choice, apply_state_based_actions,
    check_and_apply_sbas, check_and_apply_sbas_with, check_state_based_actions,
};
