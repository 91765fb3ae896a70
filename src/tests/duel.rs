//! A scripted two-player game for end-to-end tests.
//!
//! ```ignore
//! let mut duel = Duel::new();
//! let bolt = duel.hand(ALICE, fixtures::lightning_bolt());
//! duel.mana(ALICE, ManaSymbol::Red, 1);
//! let mut engine = duel.engine();
//! engine.apply(Command::cast(ALICE, bolt, vec![Target::Player(BOB)])).unwrap();
//! pass_until_resolved(&mut engine);
//! ```

#![allow(dead_code)]

use crate::cards::CardDefinition;
use crate::config::GameConfig;
use crate::decision::{DecisionAnswer, PendingDecision};
use crate::game_loop::{Command, Engine, EngineState};
use crate::game_state::{GameState, Phase};
use crate::ids::{ObjectId, PlayerId};
use crate::mana::ManaSymbol;
use crate::zone::Zone;

pub const ALICE: PlayerId = PlayerId(0);
pub const BOB: PlayerId = PlayerId(1);

/// Builder for a game sitting in Alice's first main phase with priority.
pub struct Duel {
    pub game: GameState,
}

/// Route engine logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Duel {
    pub fn new() -> Self {
        init_tracing();
        let mut game = GameState::new(GameConfig::default()).unwrap();
        game.turn.phase = Phase::FirstMain;
        game.turn.step = None;
        game.turn.priority_player = Some(ALICE);
        Self { game }
    }

    pub fn hand(&mut self, player: PlayerId, def: CardDefinition) -> ObjectId {
        self.game.add_card(&def, player, Zone::Hand).unwrap()
    }

    pub fn battlefield(&mut self, player: PlayerId, def: CardDefinition) -> ObjectId {
        self.game.add_card(&def, player, Zone::Battlefield).unwrap()
    }

    pub fn mana(&mut self, player: PlayerId, symbol: ManaSymbol, amount: u32) {
        self.game
            .store
            .player_mut(player)
            .unwrap()
            .mana_pool
            .add(symbol, amount);
    }

    pub fn damage(&mut self, id: ObjectId, amount: u32) {
        self.game.store.mark_damage(id, id, amount).unwrap();
    }

    pub fn engine(self) -> Engine {
        Engine::new(self.game)
    }
}

/// Whoever holds priority passes.
pub fn pass(engine: &mut Engine) -> EngineState {
    let holder = engine
        .game()
        .turn
        .priority_player
        .expect("someone should hold priority");
    engine.apply(Command::pass(holder)).unwrap()
}

/// Pass until the top of the stack resolves.
pub fn pass_until_resolved(engine: &mut Engine) -> EngineState {
    let top = top_of_stack(engine);
    let mut state = engine.state();
    for _ in 0..8 {
        state = pass(engine);
        if top_of_stack(engine) != top || state != EngineState::StackNonEmpty {
            break;
        }
    }
    state
}

fn top_of_stack(engine: &Engine) -> Option<ObjectId> {
    engine.game().stack.last().map(|entry| entry.id)
}

/// Pass until the turn number changes.
pub fn pass_to_next_turn(engine: &mut Engine) {
    let turn = engine.game().turn.turn_number;
    for _ in 0..64 {
        if engine.game().turn.turn_number != turn {
            return;
        }
        pass(engine);
    }
    panic!("turn {turn} never ended");
}

pub fn decision(engine: &Engine) -> PendingDecision {
    engine
        .pending_decision()
        .cloned()
        .expect("a decision should be pending")
}

pub fn answer(engine: &mut Engine, answer: DecisionAnswer) -> EngineState {
    let pending = decision(engine);
    engine
        .apply(Command::SubmitDecision {
            player: pending.player,
            id: pending.id,
            answer,
        })
        .unwrap()
}
