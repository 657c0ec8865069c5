//! # Run configuration
//!
//! One immutable struct holds every knob of an optimization run. It is
//! built once (by the CLI or a test) and threaded through the optimizer,
//! the cost model, and the scorer; nothing reads ambient global state.
use crate::score::OptimizationMode;

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
  pub mode: OptimizationMode,
  pub min_deck_len: usize,
  pub max_deck_len: usize,
  /// Leading deck slots the mutator must not touch
  pub frozen_cards: usize,
  /// Acquisition budget in build points
  pub budget: u32,
  /// Enforce the owned-card ledger when resolving deck costs
  pub use_ownership: bool,
  /// Stop improving once the incumbent reaches this score; defaults to
  /// the mode's maximum possible score
  pub target_score: Option<f64>,
  /// A challenger must beat the incumbent by more than this
  pub min_increment: f64,
  pub confidence_level: f64,
  /// Only ever use candidate cards at their most-upgraded form
  pub use_top_level_card: bool,
  /// Minimum fusion tier for candidate cards; > 0 also switches the cost
  /// resolver to the endgame unlimited-base-card assumption
  pub fused_card_level: u32,
  /// Aggregate opponents by weighted harmonic mean instead of arithmetic
  pub harmonic_mean: bool,
  /// Run seed; zero picks one from the clock
  pub seed: u64,
  pub num_workers: usize,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    OptimizerConfig {
      mode: OptimizationMode::Winrate,
      min_deck_len: 1,
      max_deck_len: 10,
      frozen_cards: 0,
      budget: 0,
      use_ownership: true,
      target_score: None,
      min_increment: 0.0,
      confidence_level: 0.99,
      use_top_level_card: false,
      fused_card_level: 0,
      harmonic_mean: false,
      seed: 0,
      num_workers: 4,
    }
  }
}
