//! # Simulator interface
//!
//! The battle simulator is a collaborator of the optimizer, not part of
//! it: anything implementing [`Simulator`] can serve as the evaluation
//! oracle. Implementations must be pure functions of their inputs plus the
//! rng stream and must not share mutable state between calls; the worker
//! pool calls them concurrently from every worker.
use crate::card::{Card, Skill};
use crate::catalog::Catalog;
use crate::deck::{Deck, DeckStrategy};
use rand::prelude::*;
use rand::rngs::SmallRng;

/// Battleground effect names a configuration may reference
pub const KNOWN_EFFECTS: &[&str] = &[
  "bloodlust",
  "bulwark",
  "corrosion",
  "revenge",
  "stasis",
  "warcry",
];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
  /// Attacker acts first
  Fight,
  /// Defender acts first
  Surge,
}

impl Default for GameMode {
  fn default() -> Self {
    Self::Fight
  }
}

/// One battleground effect with its optional magnitude
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleEffect {
  pub name: String,
  #[serde(default)]
  pub value: u32,
}

/// Static battle parameters shared by every simulated battle of a run
#[derive(Debug, Default, Clone)]
pub struct BattleConfig {
  pub game_mode: GameMode,
  pub turn_limit: u32,
  pub effects: Vec<BattleEffect>,
  /// Skills granted to the attacker by the battleground
  pub your_skills: Vec<Skill>,
  /// Skills granted to the defender by the battleground
  pub enemy_skills: Vec<Skill>,
}

impl BattleConfig {
  pub fn new(game_mode: GameMode) -> Self {
    BattleConfig {
      game_mode,
      turn_limit: 50,
      ..BattleConfig::default()
    }
  }
}

/// How one simulated battle ended
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BattleOutcome {
  Win,
  Draw,
  Loss,
}

/// One simulated battle's result: the win/draw/loss flag and the point
/// value the active optimization mode assigns to it
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Outcome {
  pub outcome: BattleOutcome,
  pub points: u64,
}

impl Outcome {
  pub fn win(points: u64) -> Self {
    Outcome {
      outcome: BattleOutcome::Win,
      points,
    }
  }

  pub fn draw(points: u64) -> Self {
    Outcome {
      outcome: BattleOutcome::Draw,
      points,
    }
  }

  pub fn loss(points: u64) -> Self {
    Outcome {
      outcome: BattleOutcome::Loss,
      points,
    }
  }
}

/// A deck resolved against the catalog: card references instead of ids.
/// Each worker builds its own views from its private deck clones at the
/// start of a task.
#[derive(Debug, Clone)]
pub struct DeckView<'a> {
  pub commander: &'a Card,
  pub cards: Vec<&'a Card>,
  pub strategy: DeckStrategy,
}

impl<'a> DeckView<'a> {
  pub fn new(deck: &Deck, catalog: &'a Catalog) -> Self {
    DeckView {
      commander: catalog.card(deck.commander),
      cards: deck.cards.iter().map(|&id| catalog.card(id)).collect(),
      strategy: deck.strategy,
    }
  }

  /// Draws a battle hand: a fresh ordering of the deck. Random-strategy
  /// decks are shuffled; ordered strategies keep their sequence.
  pub fn draw(&self, rng: &mut SmallRng) -> Hand<'a> {
    let mut cards = self.cards.clone();
    if self.strategy == DeckStrategy::Random {
      cards.shuffle(rng);
    }
    Hand {
      commander: self.commander,
      cards,
      strategy: self.strategy,
    }
  }
}

/// The per-battle private draw of a deck handed to the simulator
#[derive(Debug, Clone)]
pub struct Hand<'a> {
  pub commander: &'a Card,
  pub cards: Vec<&'a Card>,
  pub strategy: DeckStrategy,
}

/// The external battle oracle. `simulate` runs one randomized playout and
/// reports its outcome; determinism given (inputs, rng state) is part of
/// the contract, as is side-effect isolation.
pub trait Simulator: Send + Sync {
  fn simulate(
    &self,
    attacker: &Hand,
    defender: &Hand,
    config: &BattleConfig,
    rng: &mut SmallRng,
  ) -> Outcome;
}
