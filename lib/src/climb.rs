//! # Hill-climbing deck search
//!
//! Greedy local search over deck compositions, driven by the worker pool
//! as its fitness oracle. Two variants share the same acceptance machinery:
//! the unordered climb sweeps one slot at a time (compositions are
//! multisets), the ordered climb additionally sweeps every insertion
//! position. The requirement gap dominates the score lexicographically:
//! no score improvement is accepted while it would leave the gap worse.
use crate::card::CardId;
use crate::catalog::Catalog;
use crate::config::OptimizerConfig;
use crate::cost::{claim_cards, CostModel};
use crate::deck::Deck;
use crate::ledger::OwnedCards;
use crate::mutate::{adjust_deck, SlotCard};
use crate::pool::SimulatorPool;
use crate::requirement::{check_requirement, Quest, Requirement};
use crate::score::{
  compute_score, EvaluatedResults, FinalScore, OptimizationMode, ScoreParams,
};
use crate::sim::Simulator;
use rand::prelude::*;
use rand::rngs::SmallRng;
use std::cmp;
use std::collections::HashMap;

/// The answer of a climb: the best deck found plus the bookkeeping a
/// caller needs to report the run
#[derive(Debug, Clone)]
pub struct ClimbResult {
  pub deck: Deck,
  pub score: FinalScore,
  /// Remaining requirement gap; > 0 means the requirement was
  /// unsatisfiable within the budget
  pub gap: u32,
  pub deck_cost: u32,
  pub num_evaluated_decks: usize,
  pub simulations: u64,
  pub skipped_simulations: u64,
}

/// Single-threaded search driver; all parallelism stays inside the pool.
/// Owns the ledger (grown by the initial forced claim) and its own sweep
/// rng so workers never share deck or rng state with the search.
pub struct Optimizer<'a, S: Simulator + 'static> {
  config: &'a OptimizerConfig,
  catalog: &'a Catalog,
  pool: &'a SimulatorPool<S>,
  ledger: OwnedCards,
  requirement: Requirement,
  quest: Quest,
  score_params: ScoreParams,
  rng: SmallRng,
}

impl<'a, S: Simulator + 'static> Optimizer<'a, S> {
  pub fn new(
    config: &'a OptimizerConfig,
    catalog: &'a Catalog,
    pool: &'a SimulatorPool<S>,
    ledger: OwnedCards,
    requirement: Requirement,
    quest: Quest,
  ) -> Self {
    let score_params = ScoreParams::new(
      config.mode,
      config.confidence_level,
      config.harmonic_mean,
      &quest,
    );
    let rng = SmallRng::seed_from_u64(config.seed);
    Optimizer {
      config,
      catalog,
      pool,
      ledger,
      requirement,
      quest,
      score_params,
      rng,
    }
  }

  pub fn score_params(&self) -> &ScoreParams {
    &self.score_params
  }

  pub fn ledger(&self) -> &OwnedCards {
    &self.ledger
  }

  /// Claims the starting deck into the ledger, trims it to the maximum
  /// length, and returns the effective budget (raised to the starting
  /// deck's cost when necessary).
  fn prepare(&mut self, deck: &mut Deck) -> u32 {
    let cfg = self.config;
    if cfg.use_ownership {
      claim_cards(
        &mut self.ledger,
        self.catalog,
        cfg.fused_card_level,
        cfg.budget,
        &[deck.commander],
      );
      claim_cards(
        &mut self.ledger,
        self.catalog,
        cfg.fused_card_level,
        cfg.budget,
        &deck.cards,
      );
    }
    if deck.cards.len() > cfg.max_deck_len {
      warn!("Too many cards in your deck. Trimmed.");
      deck.shrink(cfg.max_deck_len);
    }
    let model = CostModel {
      catalog: self.catalog,
      ledger: &self.ledger,
      use_ownership: cfg.use_ownership,
      endgame_level: cfg.fused_card_level,
    };
    let deck_cost = model.deck_cost(deck, cfg.budget).unwrap_or(0);
    cmp::max(cfg.budget, deck_cost)
  }

  /// Unordered climb: one slot sweep per pass, compositions treated as
  /// multisets. The right variant for random-strategy decks.
  pub fn climb(
    &mut self,
    num_min_iterations: u64,
    num_iterations: u64,
    d1: &mut Deck,
  ) -> ClimbResult {
    let budget = self.prepare(d1);
    let cfg = self.config;
    let catalog = self.catalog;
    let pool = self.pool;
    let score_params = self.score_params;
    let requirement = &self.requirement;
    let quest = &self.quest;
    let ledger = &self.ledger;
    let rng = &mut self.rng;
    let model = CostModel {
      catalog,
      ledger,
      use_ownership: cfg.use_ownership,
      endgame_level: cfg.fused_card_level,
    };
    let factors = pool.factors().to_vec();
    let num_defense = pool.num_defense_decks();
    let frozen = cmp::min(cfg.frozen_cards, d1.cards.len());
    let target_score = cfg.target_score.unwrap_or(score_params.max_possible);

    let zero = EvaluatedResults::zero(num_defense);
    let mut evaluated: HashMap<String, EvaluatedResults> = HashMap::new();
    let mut best_deck_key = d1.hash();
    let mut results = zero.clone();
    pool.evaluate(d1, num_min_iterations, &mut results);
    evaluated.insert(best_deck_key.clone(), results.clone());
    info!("{}", format_score_info(&results, &factors, &score_params));
    let mut best_score = compute_score(&results, &factors, &score_params);

    let mut non_commander_cards: Vec<Option<CardId>> = catalog
      .player_assaults
      .iter()
      .chain(catalog.player_structures.iter())
      .map(|&id| Some(id))
      .collect();
    non_commander_cards.push(None);

    let mut best_commander = d1.commander;
    let mut best_cards = d1.cards.clone();
    let mut deck_cost = model.deck_cost(d1, budget).unwrap_or(0);
    info!(
      "{}",
      format_deck_inline(deck_cost, &best_score, d1, catalog, cfg)
    );
    let mut best_gap = check_requirement(d1, requirement, quest, catalog);
    let mut deck_has_been_improved = true;
    let mut skipped_simulations: u64 = 0;
    let mut cards_out: Vec<SlotCard> = Vec::new();
    let mut cards_in: Vec<SlotCard> = Vec::new();
    let mut slot_i = 0usize;
    let mut dead_slot = 0usize;

    loop {
      if deck_has_been_improved {
        dead_slot = slot_i;
        deck_has_been_improved = false;
      } else if slot_i == dead_slot || best_score.points - target_score > -1e-9 {
        if best_score.n_sims >= num_iterations || best_gap > 0 {
          break;
        }
        // Dead pass: sharpen the incumbent's estimate before resuming
        let mut prev_results = evaluated
          .get(&best_deck_key)
          .cloned()
          .unwrap_or_else(|| zero.clone());
        skipped_simulations += prev_results.n_sims;
        let refine_to = cmp::min(prev_results.n_sims.saturating_mul(10), num_iterations);
        pool.evaluate(d1, refine_to, &mut prev_results);
        best_score = compute_score(&prev_results, &factors, &score_params);
        info!(
          "Results refined: {}",
          format_score_info(&prev_results, &factors, &score_params)
        );
        evaluated.insert(best_deck_key.clone(), prev_results);
        dead_slot = slot_i;
      }
      if best_score.points - target_score <= -1e-9 {
        if !requirement.requires(best_commander) {
          for &commander_candidate in &catalog.player_commanders {
            if catalog.card(commander_candidate).name == catalog.card(best_commander).name {
              continue;
            }
            d1.cards = best_cards.clone();
            cards_out.clear();
            cards_out.push((None, best_commander));
            d1.commander = commander_candidate;
            let adjusted = adjust_deck(
              d1,
              None,
              None,
              None,
              budget,
              frozen,
              cfg.use_top_level_card,
              &model,
              rng,
              &mut cards_out,
              &mut cards_in,
            );
            let new_cost = match adjusted {
              Some(cost) => cost,
              None => continue,
            };
            let new_gap = check_requirement(d1, requirement, quest, catalog);
            if new_gap > 0 && new_gap >= best_gap {
              continue;
            }
            let cur_deck_key = d1.hash();
            let existed = evaluated.contains_key(&cur_deck_key);
            let mut prev_results = evaluated
              .get(&cur_deck_key)
              .cloned()
              .unwrap_or_else(|| zero.clone());
            if existed {
              skipped_simulations += prev_results.n_sims;
            }
            pool.compare(d1, best_score.n_sims, &mut prev_results, &best_score);
            let current_score = compute_score(&prev_results, &factors, &score_params);
            evaluated.insert(cur_deck_key.clone(), prev_results.clone());
            if new_gap < best_gap
              || current_score.points > best_score.points + cfg.min_increment
            {
              deck_cost = new_cost;
              info!(
                "Deck improved: {}: {} -> {}: {}",
                cur_deck_key,
                format_slot_cards(&cards_out, catalog),
                format_slot_cards(&cards_in, catalog),
                format_score_info(&prev_results, &factors, &score_params)
              );
              best_gap = new_gap;
              best_score = current_score;
              best_deck_key = cur_deck_key;
              best_commander = d1.commander;
              best_cards = d1.cards.clone();
              deck_has_been_improved = true;
              info!(
                "{}",
                format_deck_inline(deck_cost, &best_score, d1, catalog, cfg)
              );
            }
          }
          d1.commander = best_commander;
          d1.cards = best_cards.clone();
        }
        non_commander_cards.shuffle(rng);
        for &card_candidate in &non_commander_cards {
          if let Some(id) = card_candidate {
            let card = catalog.card(id);
            let filtered = card.fusion_level < cfg.fused_card_level
              || (cfg.use_top_level_card && card.level < catalog.card(card.top_level_id).level);
            if filtered && !d1.allowed_candidates.contains(&id) {
              continue;
            }
            if d1.disallowed_candidates.contains(&id) {
              continue;
            }
          }
          d1.commander = best_commander;
          d1.cards = best_cards.clone();
          let noop = match card_candidate {
            Some(id) => {
              slot_i < best_cards.len()
                && catalog.card(id).name == catalog.card(best_cards[slot_i]).name
            }
            None => slot_i == best_cards.len(),
          };
          if noop {
            continue;
          }
          cards_out.clear();
          if slot_i < d1.cards.len() {
            cards_out.push((None, d1.cards[slot_i]));
            d1.cards.remove(slot_i);
          }
          let adjusted = adjust_deck(
            d1,
            Some(slot_i),
            Some(slot_i),
            card_candidate.map(|id| catalog.card(id)),
            budget,
            frozen,
            cfg.use_top_level_card,
            &model,
            rng,
            &mut cards_out,
            &mut cards_in,
          );
          let new_cost = match adjusted {
            Some(cost) if d1.cards.len() >= cfg.min_deck_len => cost,
            _ => continue,
          };
          let new_gap = check_requirement(d1, requirement, quest, catalog);
          if new_gap > 0 && new_gap >= best_gap {
            continue;
          }
          let cur_deck_key = d1.hash();
          let existed = evaluated.contains_key(&cur_deck_key);
          let mut prev_results = evaluated
            .get(&cur_deck_key)
            .cloned()
            .unwrap_or_else(|| zero.clone());
          if existed {
            skipped_simulations += prev_results.n_sims;
          }
          pool.compare(d1, best_score.n_sims, &mut prev_results, &best_score);
          let current_score = compute_score(&prev_results, &factors, &score_params);
          evaluated.insert(cur_deck_key.clone(), prev_results.clone());
          if new_gap < best_gap || current_score.points > best_score.points + cfg.min_increment {
            deck_cost = new_cost;
            info!(
              "Deck improved: {}: {} -> {}: {}",
              cur_deck_key,
              format_slot_cards(&cards_out, catalog),
              format_slot_cards(&cards_in, catalog),
              format_score_info(&prev_results, &factors, &score_params)
            );
            best_gap = new_gap;
            best_score = current_score;
            best_deck_key = cur_deck_key;
            best_commander = d1.commander;
            best_cards = d1.cards.clone();
            deck_has_been_improved = true;
            info!(
              "{}",
              format_deck_inline(deck_cost, &best_score, d1, catalog, cfg)
            );
          }
          if best_score.points - target_score > -1e-9 {
            break;
          }
        }
        d1.commander = best_commander;
        d1.cards = best_cards.clone();
      }
      slot_i = (slot_i + 1) % cmp::min(cfg.max_deck_len, best_cards.len() + 1);
    }
    self.finish(d1, best_score, best_gap, budget, &evaluated, skipped_simulations)
  }

  /// Ordered climb: sweeps every (from slot, to slot) pair so cards can
  /// move between positions, not just swap in place. The right variant
  /// for ordered and exact-ordered decks.
  pub fn climb_ordered(
    &mut self,
    num_min_iterations: u64,
    num_iterations: u64,
    d1: &mut Deck,
  ) -> ClimbResult {
    let budget = self.prepare(d1);
    let cfg = self.config;
    let catalog = self.catalog;
    let pool = self.pool;
    let score_params = self.score_params;
    let requirement = &self.requirement;
    let quest = &self.quest;
    let ledger = &self.ledger;
    let rng = &mut self.rng;
    let model = CostModel {
      catalog,
      ledger,
      use_ownership: cfg.use_ownership,
      endgame_level: cfg.fused_card_level,
    };
    let factors = pool.factors().to_vec();
    let num_defense = pool.num_defense_decks();
    let frozen = cmp::min(cfg.frozen_cards, d1.cards.len());
    let target_score = cfg.target_score.unwrap_or(score_params.max_possible);

    let zero = EvaluatedResults::zero(num_defense);
    let mut evaluated: HashMap<String, EvaluatedResults> = HashMap::new();
    let mut best_deck_key = d1.hash();
    let mut results = zero.clone();
    pool.evaluate(d1, num_min_iterations, &mut results);
    evaluated.insert(best_deck_key.clone(), results.clone());
    info!("{}", format_score_info(&results, &factors, &score_params));
    let mut best_score = compute_score(&results, &factors, &score_params);

    let mut non_commander_cards: Vec<Option<CardId>> = catalog
      .player_assaults
      .iter()
      .chain(catalog.player_structures.iter())
      .map(|&id| Some(id))
      .collect();
    non_commander_cards.push(None);

    let mut best_commander = d1.commander;
    let mut best_cards = d1.cards.clone();
    let mut deck_cost = model.deck_cost(d1, budget).unwrap_or(0);
    info!(
      "{}",
      format_deck_inline(deck_cost, &best_score, d1, catalog, cfg)
    );
    let mut best_gap = check_requirement(d1, requirement, quest, catalog);
    let mut deck_has_been_improved = true;
    let mut skipped_simulations: u64 = 0;
    let mut cards_out: Vec<SlotCard> = Vec::new();
    let mut cards_in: Vec<SlotCard> = Vec::new();
    let mut from_slot = frozen;
    let mut dead_slot = frozen;

    loop {
      if from_slot >= frozen {
        if deck_has_been_improved {
          dead_slot = from_slot;
          deck_has_been_improved = false;
        } else if from_slot == dead_slot || best_score.points - target_score > -1e-9 {
          if best_score.n_sims >= num_iterations || best_gap > 0 {
            break;
          }
          let mut prev_results = evaluated
            .get(&best_deck_key)
            .cloned()
            .unwrap_or_else(|| zero.clone());
          skipped_simulations += prev_results.n_sims;
          let refine_to = cmp::min(prev_results.n_sims.saturating_mul(10), num_iterations);
          pool.evaluate(d1, refine_to, &mut prev_results);
          best_score = compute_score(&prev_results, &factors, &score_params);
          info!(
            "Results refined: {}",
            format_score_info(&prev_results, &factors, &score_params)
          );
          evaluated.insert(best_deck_key.clone(), prev_results);
          dead_slot = from_slot;
        }
        if best_score.points - target_score <= -1e-9 {
          if !requirement.requires(best_commander) {
            for &commander_candidate in &catalog.player_commanders {
              if best_score.points - target_score > -1e-9 {
                break;
              }
              if catalog.card(commander_candidate).name == catalog.card(best_commander).name {
                continue;
              }
              d1.cards = best_cards.clone();
              cards_out.clear();
              cards_out.push((None, best_commander));
              d1.commander = commander_candidate;
              let adjusted = adjust_deck(
                d1,
                None,
                None,
                None,
                budget,
                frozen,
                cfg.use_top_level_card,
                &model,
                rng,
                &mut cards_out,
                &mut cards_in,
              );
              let new_cost = match adjusted {
                Some(cost) => cost,
                None => continue,
              };
              let new_gap = check_requirement(d1, requirement, quest, catalog);
              if new_gap > 0 && new_gap >= best_gap {
                continue;
              }
              let cur_deck_key = d1.hash();
              let existed = evaluated.contains_key(&cur_deck_key);
              let mut prev_results = evaluated
                .get(&cur_deck_key)
                .cloned()
                .unwrap_or_else(|| zero.clone());
              if existed {
                skipped_simulations += prev_results.n_sims;
              }
              pool.compare(d1, best_score.n_sims, &mut prev_results, &best_score);
              let current_score = compute_score(&prev_results, &factors, &score_params);
              evaluated.insert(cur_deck_key.clone(), prev_results.clone());
              if new_gap < best_gap
                || current_score.points > best_score.points + cfg.min_increment
              {
                deck_cost = new_cost;
                info!(
                  "Deck improved: {}: {} -> {}: {}",
                  cur_deck_key,
                  format_slot_cards(&cards_out, catalog),
                  format_slot_cards(&cards_in, catalog),
                  format_score_info(&prev_results, &factors, &score_params)
                );
                best_gap = new_gap;
                best_score = current_score;
                best_deck_key = cur_deck_key;
                best_commander = d1.commander;
                best_cards = d1.cards.clone();
                deck_has_been_improved = true;
                info!(
                  "{}",
                  format_deck_inline(deck_cost, &best_score, d1, catalog, cfg)
                );
              }
            }
            d1.commander = best_commander;
            d1.cards = best_cards.clone();
          }
          non_commander_cards.shuffle(rng);
          'candidates: for &card_candidate in &non_commander_cards {
            if let Some(id) = card_candidate {
              let card = catalog.card(id);
              let filtered = card.fusion_level < cfg.fused_card_level
                || (cfg.use_top_level_card
                  && card.level < catalog.card(card.top_level_id).level);
              if filtered && !d1.allowed_candidates.contains(&id) {
                continue;
              }
              if d1.disallowed_candidates.contains(&id) {
                continue;
              }
            }
            let to_slot_start = if card_candidate.is_some() {
              frozen
            } else {
              best_cards.len().saturating_sub(1)
            };
            let to_slot_end =
              best_cards.len() + (from_slot >= best_cards.len()) as usize;
            for to_slot in to_slot_start..to_slot_end {
              d1.commander = best_commander;
              d1.cards = best_cards.clone();
              let noop = match card_candidate {
                Some(id) => {
                  from_slot < best_cards.len()
                    && from_slot == to_slot
                    && catalog.card(id).name == catalog.card(best_cards[to_slot]).name
                }
                None => from_slot == best_cards.len(),
              };
              if noop {
                continue;
              }
              cards_out.clear();
              if from_slot < d1.cards.len() {
                cards_out.push((Some(from_slot), d1.cards[from_slot]));
                d1.cards.remove(from_slot);
              }
              let adjusted = adjust_deck(
                d1,
                Some(from_slot),
                Some(to_slot),
                card_candidate.map(|id| catalog.card(id)),
                budget,
                frozen,
                cfg.use_top_level_card,
                &model,
                rng,
                &mut cards_out,
                &mut cards_in,
              );
              let new_cost = match adjusted {
                Some(cost) if d1.cards.len() >= cfg.min_deck_len => cost,
                _ => continue,
              };
              let new_gap = check_requirement(d1, requirement, quest, catalog);
              if new_gap > 0 && new_gap >= best_gap {
                continue;
              }
              let cur_deck_key = d1.hash();
              let existed = evaluated.contains_key(&cur_deck_key);
              let mut prev_results = evaluated
                .get(&cur_deck_key)
                .cloned()
                .unwrap_or_else(|| zero.clone());
              if existed {
                skipped_simulations += prev_results.n_sims;
              }
              pool.compare(d1, best_score.n_sims, &mut prev_results, &best_score);
              let current_score = compute_score(&prev_results, &factors, &score_params);
              evaluated.insert(cur_deck_key.clone(), prev_results.clone());
              if new_gap < best_gap
                || current_score.points > best_score.points + cfg.min_increment
              {
                deck_cost = new_cost;
                info!(
                  "Deck improved: {}: {} -> {}: {}",
                  cur_deck_key,
                  format_slot_cards(&cards_out, catalog),
                  format_slot_cards(&cards_in, catalog),
                  format_score_info(&prev_results, &factors, &score_params)
                );
                best_gap = new_gap;
                best_score = current_score;
                best_deck_key = cur_deck_key;
                best_commander = d1.commander;
                best_cards = d1.cards.clone();
                deck_has_been_improved = true;
                info!(
                  "{}",
                  format_deck_inline(deck_cost, &best_score, d1, catalog, cfg)
                );
              }
            }
            if best_score.points - target_score > -1e-9 {
              break 'candidates;
            }
          }
          d1.commander = best_commander;
          d1.cards = best_cards.clone();
        }
      }
      from_slot = (from_slot + 1) % cmp::min(cfg.max_deck_len, d1.cards.len() + 1);
    }
    self.finish(d1, best_score, best_gap, budget, &evaluated, skipped_simulations)
  }

  fn finish(
    &self,
    d1: &Deck,
    best_score: FinalScore,
    best_gap: u32,
    budget: u32,
    evaluated: &HashMap<String, EvaluatedResults>,
    skipped_simulations: u64,
  ) -> ClimbResult {
    let model = CostModel {
      catalog: self.catalog,
      ledger: &self.ledger,
      use_ownership: self.config.use_ownership,
      endgame_level: self.config.fused_card_level,
    };
    let simulations: u64 = evaluated.values().map(|e| e.n_sims).sum();
    info!(
      "Evaluated {} decks ({} + {} simulations).",
      evaluated.len(),
      simulations,
      skipped_simulations
    );
    let deck_cost = model.deck_cost(d1, budget).unwrap_or(0);
    info!(
      "Optimized Deck: {}",
      format_deck_inline(deck_cost, &best_score, d1, self.catalog, self.config)
    );
    ClimbResult {
      deck: d1.clone(),
      score: best_score,
      gap: best_gap,
      deck_cost,
      num_evaluated_decks: evaluated.len(),
      simulations,
      skipped_simulations,
    }
  }
}

/// `"<points> (<per-opponent tallies> / <samples>)"` progress line
pub fn format_score_info(
  results: &EvaluatedResults,
  factors: &[f64],
  params: &ScoreParams,
) -> String {
  let fin = compute_score(results, factors, params);
  let mut tallies = String::new();
  for stats in &results.stats {
    match params.mode {
      OptimizationMode::Winrate | OptimizationMode::Defense => {
        tallies.push_str(&format!("{} ", stats.points / 100));
      }
      _ => tallies.push_str(&format!("{} ", stats.points)),
    }
  }
  format!("{:.4} ({}/ {})", fin.points, tallies, results.n_sims)
}

/// One-line deck report: size, cost, mode-specific rates, score, cards
pub fn format_deck_inline(
  deck_cost: u32,
  score: &FinalScore,
  deck: &Deck,
  catalog: &Catalog,
  config: &OptimizerConfig,
) -> String {
  let mut out = format!("{} units: ", deck.cards.len());
  if config.budget > 0 {
    out.push_str(&format!("${} ", deck_cost));
  }
  match config.mode {
    OptimizationMode::Winrate => {}
    OptimizationMode::Defense => {
      out.push_str(&format!("({:.2}% stall) ", score.draws * 100.0));
    }
    _ => {
      out.push_str(&format!("({:.2}% win) ", score.wins * 100.0));
    }
  }
  out.push_str(&format!("{:.4}: {}", score.points, deck.description(catalog)));
  out
}

/// Renders a card delta side, `-void-` when empty
pub fn format_slot_cards(list: &[SlotCard], catalog: &Catalog) -> String {
  if list.is_empty() {
    return "-void-".to_string();
  }
  let rendered: Vec<String> = list
    .iter()
    .map(|&(slot, id)| {
      let card = catalog.card(id);
      match slot {
        Some(position) => format!("{} {}", position, card),
        None => card.to_string(),
      }
    })
    .collect();
  rendered.join(", ")
}
