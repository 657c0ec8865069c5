//! # Simulation worker pool
//!
//! A fixed set of OS threads created once per optimization run and reused
//! for every candidate deck. The driver publishes one task at a time (an
//! attack deck, a sample budget, and optionally an incumbent score to beat)
//! through a two-phase barrier rendezvous: workers block until the task is
//! published, sample in lockstep against their private deck clones, and
//! rendezvous again before the driver reads the aggregate.
//!
//! The early-stop flag is a one-way `AtomicBool` read with relaxed
//! ordering: a worker that misses the transition by one sample wastes that
//! sample and nothing else.
use crate::catalog::Catalog;
use crate::deck::Deck;
use crate::score::{EvaluatedResults, FinalScore, ScoreParams};
use crate::sim::{BattleConfig, DeckView, Simulator};
use crate::stats::proportion_upper_bound;
use rand::prelude::*;
use rand::rngs::SmallRng;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

/// The task slot the driver publishes and the workers drain
#[derive(Default)]
struct Task {
  attack: Deck,
  /// Additional samples assigned to each worker. The static split keeps
  /// every worker's rng stream independent of scheduling, so a fixed
  /// (seed, worker count) reproduces bit-identical aggregates.
  quotas: Vec<u64>,
  results: EvaluatedResults,
  /// Incumbent point score to beat; `Some` turns on early stopping
  compare_points: Option<f64>,
}

struct Shared<S> {
  catalog: Arc<Catalog>,
  simulator: S,
  defense: Vec<Deck>,
  factors: Vec<f64>,
  config: BattleConfig,
  score: ScoreParams,
  min_increment: f64,
  barrier: Barrier,
  task: Mutex<Task>,
  stop: AtomicBool,
  destroy: AtomicBool,
}

/// Parallel statistical evaluation harness for one attack deck against a
/// weighted set of defense decks
pub struct SimulatorPool<S: Simulator + 'static> {
  shared: Arc<Shared<S>>,
  workers: Vec<thread::JoinHandle<()>>,
  num_workers: usize,
}

impl<S: Simulator + 'static> SimulatorPool<S> {
  /// Spawns `num_workers` threads, seeding worker `i` with `seed + i`.
  /// A zero seed picks one from the clock.
  #[allow(clippy::too_many_arguments)]
  pub fn new(
    num_workers: usize,
    catalog: Arc<Catalog>,
    simulator: S,
    defense: Vec<Deck>,
    factors: Vec<f64>,
    config: BattleConfig,
    score: ScoreParams,
    min_increment: f64,
    seed: u64,
  ) -> Self {
    assert!(num_workers >= 1);
    assert_eq!(defense.len(), factors.len());
    let seed = if seed != 0 {
      seed
    } else {
      // Knuth multiplicative hash over the clock
      SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
        .wrapping_mul(2_654_435_761)
    };
    let shared = Arc::new(Shared {
      catalog,
      simulator,
      defense,
      factors,
      config,
      score,
      min_increment,
      barrier: Barrier::new(num_workers + 1),
      task: Mutex::new(Task::default()),
      stop: AtomicBool::new(false),
      destroy: AtomicBool::new(false),
    });
    let mut workers = Vec::with_capacity(num_workers);
    for worker_id in 0..num_workers {
      let shared = Arc::clone(&shared);
      let rng = SmallRng::seed_from_u64(seed.wrapping_add(worker_id as u64));
      workers.push(thread::spawn(move || worker_loop(shared, worker_id, rng)));
    }
    SimulatorPool {
      shared,
      workers,
      num_workers,
    }
  }

  pub fn num_workers(&self) -> usize {
    self.num_workers
  }

  pub fn num_defense_decks(&self) -> usize {
    self.shared.defense.len()
  }

  pub fn factors(&self) -> &[f64] {
    &self.shared.factors
  }

  /// Tops `results` up to `num_iterations` samples of `attack`. Already
  /// accumulated samples are kept; a cached result at or beyond the target
  /// is returned untouched.
  pub fn evaluate(&self, attack: &Deck, num_iterations: u64, results: &mut EvaluatedResults) {
    self.run_task(attack, num_iterations, results, None);
  }

  /// Like [`evaluate`](Self::evaluate), but stops the whole pool early
  /// once the challenger's upper confidence bound can no longer reach
  /// `best.points` plus the configured minimum increment.
  ///
  /// The bound is computed from a single factor-weighted scalar even with
  /// multiple defense decks. Stop points and sample counts are observable
  /// behavior; tightening the bound changes both.
  pub fn compare(
    &self,
    attack: &Deck,
    num_iterations: u64,
    results: &mut EvaluatedResults,
    best: &FinalScore,
  ) {
    self.run_task(attack, num_iterations, results, Some(best.points));
  }

  fn run_task(
    &self,
    attack: &Deck,
    num_iterations: u64,
    results: &mut EvaluatedResults,
    compare_points: Option<f64>,
  ) {
    if num_iterations <= results.n_sims {
      return;
    }
    debug_assert_eq!(results.stats.len(), self.shared.defense.len());
    let additional = num_iterations - results.n_sims;
    {
      let mut task = self.shared.task.lock().expect("simulation worker panicked");
      task.attack = attack.clone();
      task.quotas = split_quota(additional, self.num_workers);
      task.results = mem::take(results);
      task.compare_points = compare_points;
    }
    self.shared.stop.store(false, Ordering::SeqCst);
    // unlock all the workers, then wait for them
    self.shared.barrier.wait();
    self.shared.barrier.wait();
    let mut task = self.shared.task.lock().expect("simulation worker panicked");
    *results = mem::take(&mut task.results);
  }
}

impl<S: Simulator + 'static> Drop for SimulatorPool<S> {
  fn drop(&mut self) {
    self.shared.destroy.store(true, Ordering::SeqCst);
    self.shared.barrier.wait();
    for handle in self.workers.drain(..) {
      let _ = handle.join();
    }
  }
}

fn split_quota(total: u64, num_workers: usize) -> Vec<u64> {
  let base = total / num_workers as u64;
  let remainder = total % num_workers as u64;
  (0..num_workers as u64)
    .map(|i| base + (i < remainder) as u64)
    .collect()
}

fn worker_loop<S: Simulator>(shared: Arc<Shared<S>>, worker_id: usize, mut rng: SmallRng) {
  loop {
    shared.barrier.wait();
    if shared.destroy.load(Ordering::SeqCst) {
      return;
    }
    // private clones of the decks under test for this task
    let (attack, quota, compare_points) = {
      let task = shared.task.lock().expect("pool driver panicked");
      (
        task.attack.clone(),
        task.quotas[worker_id],
        task.compare_points,
      )
    };
    let defense: Vec<Deck> = shared.defense.clone();
    let attack_view = DeckView::new(&attack, &shared.catalog);
    let defense_views: Vec<DeckView> = defense
      .iter()
      .map(|deck| DeckView::new(deck, &shared.catalog))
      .collect();
    let comparing = compare_points.is_some();
    let mut remaining = quota;
    while remaining > 0 {
      if comparing && shared.stop.load(Ordering::Relaxed) {
        break;
      }
      remaining -= 1;
      // one sample: a fresh pair of hands against every defense deck
      let mut outcomes = Vec::with_capacity(defense_views.len());
      for defense_view in &defense_views {
        let attacker = attack_view.draw(&mut rng);
        let defender = defense_view.draw(&mut rng);
        outcomes.push(
          shared
            .simulator
            .simulate(&attacker, &defender, &shared.config, &mut rng),
        );
      }
      let (points_local, total_local) = {
        let mut task = shared.task.lock().expect("pool driver panicked");
        for (index, outcome) in outcomes.iter().enumerate() {
          task.results.stats[index].record(outcome);
        }
        task.results.n_sims += 1;
        let points: Vec<u64> = task.results.stats.iter().map(|s| s.points).collect();
        (points, task.results.n_sims)
      };
      if worker_id == 0 && total_local > 1 {
        if let Some(best_points) = compare_points {
          if cannot_beat(&shared, &points_local, total_local, best_points) {
            shared.stop.store(true, Ordering::Relaxed);
          }
        }
      }
    }
    shared.barrier.wait();
  }
}

/// True once the challenger's upper confidence bound falls short of the
/// incumbent score plus the minimum increment. Multiple defense decks are
/// collapsed to one factor-weighted discrete point total first.
fn cannot_beat<S>(shared: &Shared<S>, points: &[u64], total: u64, best_points: f64) -> bool {
  let score_accum = if points.len() > 1 {
    let factor_sum: f64 = shared.factors.iter().sum();
    let weighted: f64 = points
      .iter()
      .zip(shared.factors.iter())
      .map(|(&p, &f)| p as f64 * f)
      .sum();
    (weighted / factor_sum).floor()
  } else {
    points[0] as f64
  };
  let alpha = 1.0 - shared.score.confidence_level;
  let upper = proportion_upper_bound(total as f64, score_accum / shared.score.max_possible, alpha)
    * shared.score.max_possible;
  upper < best_points + shared.min_increment
}

#[cfg(test)]
mod tests {
  use crate::card::*;
  use crate::catalog::Catalog;
  use crate::deck::Deck;
  use crate::pool::*;
  use crate::requirement::Quest;
  use crate::score::{compute_score, EvaluatedResults, FinalScore, OptimizationMode, ScoreParams};
  use crate::sim::{BattleConfig, GameMode, Hand, Outcome, Simulator};
  use rand::prelude::*;
  use rand::rngs::SmallRng;
  use std::sync::Arc;

  /// Wins whenever the rng roll clears the threshold
  struct FixedOdds {
    win_chance: f64,
  }

  impl Simulator for FixedOdds {
    fn simulate(
      &self,
      _attacker: &Hand,
      _defender: &Hand,
      _config: &BattleConfig,
      rng: &mut SmallRng,
    ) -> Outcome {
      if rng.gen::<f64>() < self.win_chance {
        Outcome::win(100)
      } else {
        Outcome::loss(0)
      }
    }
  }

  fn catalog() -> Arc<Catalog> {
    Arc::new(
      Catalog::from_cards(vec![
        Card {
          id: 10,
          name: "Warlord Kest".to_string(),
          card_type: CardType::Commander,
          health: 40,
          ..Card::default()
        },
        Card {
          id: 1,
          name: "Ridge Sentry".to_string(),
          attack: 2,
          health: 3,
          ..Card::default()
        },
      ])
      .unwrap(),
    )
  }

  fn score_params() -> ScoreParams {
    ScoreParams::new(OptimizationMode::Winrate, 0.99, false, &Quest::default())
  }

  fn pool(num_workers: usize, win_chance: f64, seed: u64) -> SimulatorPool<FixedOdds> {
    SimulatorPool::new(
      num_workers,
      catalog(),
      FixedOdds { win_chance },
      vec![Deck::new(10, vec![1, 1])],
      vec![1.0],
      BattleConfig::new(GameMode::Fight),
      score_params(),
      0.0,
      seed,
    )
  }

  #[test]
  fn split_quota_distributes_remainder() {
    assert_eq!(split_quota(10, 4), vec![3, 3, 2, 2]);
    assert_eq!(split_quota(2, 4), vec![1, 1, 0, 0]);
    assert_eq!(split_quota(8, 1), vec![8]);
  }

  #[test]
  fn evaluate_tops_up_and_skips_cached_results() {
    let pool = pool(2, 0.5, 11);
    let deck = Deck::new(10, vec![1, 1]);
    let mut results = EvaluatedResults::zero(1);
    pool.evaluate(&deck, 50, &mut results);
    assert_eq!(results.n_sims, 50);
    let halfway = results.clone();
    pool.evaluate(&deck, 100, &mut results);
    assert_eq!(results.n_sims, 100);
    // the first 50 samples were kept, not redrawn
    assert!(results.stats[0].wins >= halfway.stats[0].wins);
    let snapshot = results.clone();
    pool.evaluate(&deck, 80, &mut results);
    assert_eq!(results, snapshot);
  }

  #[test]
  fn aggregates_are_deterministic_for_fixed_seed_and_workers() {
    let deck = Deck::new(10, vec![1, 1]);
    let mut first = EvaluatedResults::zero(1);
    let mut second = EvaluatedResults::zero(1);
    {
      let pool = pool(3, 0.4, 99);
      pool.evaluate(&deck, 120, &mut first);
    }
    {
      let pool = pool(3, 0.4, 99);
      pool.evaluate(&deck, 120, &mut second);
    }
    assert_eq!(first, second);
    assert!(first.stats[0].wins > 0);
    assert!(first.stats[0].losses > 0);
  }

  #[test]
  fn compare_stops_a_hopeless_challenger_early() {
    let pool = pool(2, 0.0, 5);
    let deck = Deck::new(10, vec![1, 1]);
    let incumbent = FinalScore {
      points: 90.0,
      n_sims: 1000,
      ..FinalScore::default()
    };
    let mut results = EvaluatedResults::zero(1);
    pool.compare(&deck, 100_000, &mut results, &incumbent);
    assert!(results.n_sims >= 2);
    assert!(
      results.n_sims < 1000,
      "expected early stop, ran {} samples",
      results.n_sims
    );
    assert_eq!(results.stats[0].wins, 0);
  }

  #[test]
  fn compare_runs_to_budget_when_the_race_is_close() {
    let pool = pool(2, 0.95, 21);
    let deck = Deck::new(10, vec![1, 1]);
    let incumbent = FinalScore {
      points: 50.0,
      n_sims: 200,
      ..FinalScore::default()
    };
    let mut results = EvaluatedResults::zero(1);
    pool.compare(&deck, 200, &mut results, &incumbent);
    // a strong challenger is never cut off
    assert_eq!(results.n_sims, 200);
    let score = compute_score(&results, pool.factors(), &score_params());
    assert!(score.points > 50.0);
  }

  #[test]
  fn weighted_defense_decks_each_accumulate() {
    let pool = SimulatorPool::new(
      2,
      catalog(),
      FixedOdds { win_chance: 1.0 },
      vec![Deck::new(10, vec![1]), Deck::new(10, vec![1, 1])],
      vec![0.25, 0.75],
      BattleConfig::new(GameMode::Fight),
      score_params(),
      0.0,
      42,
    );
    let deck = Deck::new(10, vec![1, 1]);
    let mut results = EvaluatedResults::zero(2);
    pool.evaluate(&deck, 40, &mut results);
    assert_eq!(results.n_sims, 40);
    assert_eq!(results.stats[0].wins, 40);
    assert_eq!(results.stats[1].wins, 40);
    let score = compute_score(&results, pool.factors(), &score_params());
    assert!((score.wins - 1.0).abs() < 1e-12);
  }
}
