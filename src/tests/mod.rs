//! Shared test support and end-to-end games.

mod duel;
mod properties;
