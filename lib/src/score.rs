//! # Statistical scorer
//!
//! Turns accumulated battle outcomes into a point estimate with
//! Clopper-Pearson confidence bounds, combining multiple weighted defense
//! decks by weighted arithmetic or weighted harmonic aggregation.
use crate::requirement::Quest;
use crate::sim::{BattleOutcome, Outcome};
use crate::stats::{proportion_lower_bound, proportion_upper_bound};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMode {
  /// Maximize win rate
  Winrate,
  /// Maximize win rate plus stall rate (defending decks)
  Defense,
  /// Maximize average raid damage
  Raid,
  Brawl,
  BrawlDefense,
  Campaign,
  War,
  /// Maximize quest score plus win score
  Quest,
}

impl OptimizationMode {
  /// Highest point value one battle can produce in this mode. Quest mode
  /// is configured at runtime; see [`ScoreParams::new`].
  pub fn max_possible_score(self) -> f64 {
    match self {
      Self::Raid => 250.0,
      _ => 100.0,
    }
  }
}

impl Default for OptimizationMode {
  fn default() -> Self {
    Self::Winrate
  }
}

/// Immutable scoring parameters threaded through the scorer, the worker
/// pool's early-stop check, and the optimizer
#[derive(Debug, Copy, Clone)]
pub struct ScoreParams {
  pub mode: OptimizationMode,
  pub max_possible: f64,
  pub confidence_level: f64,
  pub harmonic_mean: bool,
}

impl ScoreParams {
  pub fn new(mode: OptimizationMode, confidence_level: f64, harmonic_mean: bool, quest: &Quest) -> Self {
    let max_possible = if mode == OptimizationMode::Quest {
      quest.max_possible_score()
    } else {
      mode.max_possible_score()
    };
    ScoreParams {
      mode,
      max_possible,
      confidence_level,
      harmonic_mean,
    }
  }
}

/// Per-opponent running totals; a commutative fold over battle outcomes
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleStats {
  pub wins: u64,
  pub draws: u64,
  pub losses: u64,
  pub points: u64,
}

impl BattleStats {
  pub fn record(&mut self, outcome: &Outcome) {
    match outcome.outcome {
      BattleOutcome::Win => self.wins += 1,
      BattleOutcome::Draw => self.draws += 1,
      BattleOutcome::Loss => self.losses += 1,
    }
    self.points += outcome.points;
  }
}

/// The memoized unit of evaluation: per-opponent totals plus the sample
/// count they were accumulated over. Sample counts only ever grow; a deck
/// is never re-simulated from zero once cached.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EvaluatedResults {
  pub stats: Vec<BattleStats>,
  pub n_sims: u64,
}

impl EvaluatedResults {
  pub fn zero(num_defense_decks: usize) -> Self {
    EvaluatedResults {
      stats: vec![BattleStats::default(); num_defense_decks],
      n_sims: 0,
    }
  }
}

/// Derived summary of an [`EvaluatedResults`]; never stored
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct FinalScore {
  pub wins: f64,
  pub draws: f64,
  pub losses: f64,
  pub points: f64,
  pub points_lower_bound: f64,
  pub points_upper_bound: f64,
  pub n_sims: u64,
}

/// Combines per-opponent totals into a [`FinalScore`].
///
/// Win/draw/loss fractions are factor-weighted averages. The point
/// estimate and its bounds use the weighted arithmetic mean, or the
/// weighted harmonic mean when configured (which lets the worst-performing
/// opponent dominate). Bounds treat each opponent's `points /
/// max_possible` as a fractional success count over `n_sims` trials.
pub fn compute_score(results: &EvaluatedResults, factors: &[f64], params: &ScoreParams) -> FinalScore {
  let mut fin = FinalScore {
    n_sims: results.n_sims,
    ..FinalScore::default()
  };
  if results.n_sims == 0 {
    return fin;
  }
  let n = results.n_sims as f64;
  let alpha = 1.0 - params.confidence_level;
  for (index, stats) in results.stats.iter().enumerate() {
    let factor = factors[index];
    fin.wins += stats.wins as f64 * factor;
    fin.draws += stats.draws as f64 * factor;
    fin.losses += stats.losses as f64 * factor;
    let points = stats.points as f64;
    let lower_bound =
      proportion_lower_bound(n, points / params.max_possible, alpha) * params.max_possible;
    let upper_bound =
      proportion_upper_bound(n, points / params.max_possible, alpha) * params.max_possible;
    if params.harmonic_mean {
      fin.points += factor / points;
      fin.points_lower_bound += factor / lower_bound;
      fin.points_upper_bound += factor / upper_bound;
    } else {
      fin.points += points * factor;
      fin.points_lower_bound += lower_bound * factor;
      fin.points_upper_bound += upper_bound * factor;
    }
  }
  let factor_sum: f64 = factors.iter().sum();
  fin.wins /= factor_sum * n;
  fin.draws /= factor_sum * n;
  fin.losses /= factor_sum * n;
  if params.harmonic_mean {
    fin.points = factor_sum / (n * fin.points);
    fin.points_lower_bound = factor_sum / fin.points_lower_bound;
    fin.points_upper_bound = factor_sum / fin.points_upper_bound;
  } else {
    fin.points /= factor_sum * n;
    fin.points_lower_bound /= factor_sum;
    fin.points_upper_bound /= factor_sum;
  }
  fin
}
