extern crate env_logger;
#[macro_use]
extern crate log;
extern crate warlord;

use std::env;
use std::fmt;
use std::path::Path;
use std::process;
use std::sync::Arc;

use warlord::card::{CardId, CardType, Faction};
use warlord::catalog::{Catalog, CatalogError};
use warlord::climb::{format_deck_inline, Optimizer};
use warlord::config::OptimizerConfig;
use warlord::deck::{Deck, DeckError, DeckLibrary, DeckStrategy};
use warlord::ledger::OwnedCards;
use warlord::pool::SimulatorPool;
use warlord::requirement::{Quest, QuestType, Requirement};
use warlord::score::{compute_score, EvaluatedResults, OptimizationMode, ScoreParams};
use warlord::sim::{BattleConfig, BattleEffect, GameMode, KNOWN_EFFECTS};
use warlord::skirmish::SkirmishSimulator;

#[derive(Debug)]
enum Error {
  Usage(String),
  Catalog(CatalogError),
  Deck(DeckError),
  Io(std::io::Error),
}

impl From<CatalogError> for Error {
  fn from(error: CatalogError) -> Self {
    Self::Catalog(error)
  }
}

impl From<DeckError> for Error {
  fn from(error: DeckError) -> Self {
    Self::Deck(error)
  }
}

impl From<std::io::Error> for Error {
  fn from(error: std::io::Error) -> Self {
    Self::Io(error)
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Usage(msg) => write!(f, "{}", msg),
      Self::Catalog(e) => write!(f, "{}", e),
      Self::Deck(e) => write!(f, "{}", e),
      Self::Io(e) => write!(f, "{}", e),
    }
  }
}

#[derive(Debug, Copy, Clone)]
enum Operation {
  Simulate(u64),
  Climb(u64, u64),
  Reorder(u64),
}

fn usage() {
  println!(
    "warlord - deck optimizer
usage: warlord Your_Deck Enemy_Deck [Flags] [Operations]

Your_Deck:
  the name of a deck from the custom decks file, or an inline deck list
  such as \"Warlord Kest, Ridge Sentry #2, Bastion Gate\".

Enemy_Deck:
  semicolon separated list of defense decks with optional weights:
  deck1[:factor1];deck2[:factor2];...

Flags:
  catalog <file>: card catalog to load (.json or .bin.gz cache).
  decks <file>: custom decks file.
  -e \"<effect>\": set a battleground effect; may be repeated.
  -r / ordered: play the attack deck in order instead of randomly.
  exact-ordered: play the attack deck in exact order.
  -s / surge: the defender acts first.
  -t <num>: number of worker threads, default 4.
  win / defense / raid / brawl / pvp / gw: scoring mode packages.
Flags for climb:
  -c / keep-commander: don't try to optimize the commander.
  -L <min> <max>: restrict deck size between <min> and <max>.
  -F <num>: freeze the first <num> cards of the deck.
  -o: restrict to the owned cards listed in data/ownedcards.txt.
  -o=<file>: restrict to the owned cards listed in <file>.
  -o-: do not restrict to owned cards.
  fund <num>: invest up to <num> build points to upgrade cards.
  endgame <num>: use top-level cards of fusion tier <num> and up.
  target <num>: stop as soon as the score reaches <num>.
  mis <num>: minimum score increment to accept an improvement.
  cl <num>: confidence level for bounds and early stopping.
  +ci: show confidence intervals.
  +hm: aggregate opponents with the harmonic mean.
  seed <num>: fix the run seed.
  quest \"<spec>\": add a quest constraint (e.g. \"su 5 scorch\").
  allow-candidates / disallow-candidates <list>: candidate card filters.
  disallow-recipes <list>: never downgrade through these cards.

Operations:
  sim <num>: simulate <num> battles to evaluate a deck.
  climb <num>: hill-climb using up to <num> battles per deck.
  climbex <min> <max>: hill-climb with distinct initial/total budgets.
  reorder <num>: optimize the order of the given deck."
  );
}

fn parse_number<T: std::str::FromStr>(args: &[String], index: usize, what: &str) -> Result<T, Error> {
  args
    .get(index)
    .and_then(|s| s.parse::<T>().ok())
    .ok_or_else(|| Error::Usage(format!("Expect a number after {}", what)))
}

fn parse_effect(spec: &str) -> Result<BattleEffect, Error> {
  let mut tokens = spec.split_whitespace();
  let name = tokens
    .next()
    .ok_or_else(|| Error::Usage(format!("Empty effect \"{}\"", spec)))?
    .to_lowercase();
  if !KNOWN_EFFECTS.contains(&name.as_str()) {
    return Err(Error::Usage(format!(
      "Unrecognized effect \"{}\". Available effects: {}",
      spec,
      KNOWN_EFFECTS.join(", ")
    )));
  }
  let value = match tokens.next() {
    Some(raw) => raw
      .parse::<u32>()
      .map_err(|_| Error::Usage(format!("Expect a number in effect \"{}\"", spec)))?,
    None => 0,
  };
  Ok(BattleEffect { name, value })
}

fn parse_faction(name: &str) -> Option<Faction> {
  match name {
    "vanguard" => Some(Faction::Vanguard),
    "corsair" => Some(Faction::Corsair),
    "swarm" => Some(Faction::Swarm),
    "synthetic" => Some(Faction::Synthetic),
    "zealot" => Some(Faction::Zealot),
    "ancient" => Some(Faction::Ancient),
    _ => None,
  }
}

fn parse_quest(catalog: &Catalog, spec: &str) -> Result<Quest, Error> {
  let tokens: Vec<&str> = spec.split_whitespace().collect();
  if tokens.len() < 3 {
    return Err(Error::Usage(format!(
      "Bad quest \"{}\": expect one of: su n skill; sd n skill; cu n faction/type; ck n faction/type; cs n card",
      spec
    )));
  }
  let quest_value = tokens[1]
    .parse::<u32>()
    .map_err(|_| Error::Usage(format!("Expect a number in quest \"{}\"", spec)))?;
  let key = tokens[2].to_lowercase();
  let quest_type = match tokens[0] {
    "su" => QuestType::SkillUse(key),
    "sd" => QuestType::SkillDamage(key),
    "cu" | "ck" => {
      let use_kind = tokens[0] == "cu";
      if key == "assault" || key == "structure" {
        let card_type = if key == "assault" {
          CardType::Assault
        } else {
          CardType::Structure
        };
        if use_kind {
          QuestType::TypeCardUse(card_type)
        } else {
          QuestType::TypeCardKill(card_type)
        }
      } else if let Some(faction) = parse_faction(&key) {
        if use_kind {
          QuestType::FactionAssaultCardUse(faction)
        } else {
          QuestType::FactionAssaultCardKill(faction)
        }
      } else {
        return Err(Error::Usage(format!(
          "Expect assault, structure or faction in quest \"{}\"",
          spec
        )));
      }
    }
    "cs" => {
      let card = catalog
        .resolve_name(&key)
        .ok_or_else(|| Error::Usage(format!("Expect a card in quest \"{}\"", spec)))?;
      QuestType::CardSurvival(card.id)
    }
    _ => {
      return Err(Error::Usage(format!("Cannot recognize quest type in \"{}\"", spec)));
    }
  };
  let mut quest = Quest {
    quest_type,
    quest_value,
    quest_score: quest_value,
    ..Quest::default()
  };
  for token in &tokens[3..] {
    if *token == "each" {
      quest.must_fulfill = true;
      quest.quest_score = 100;
    } else if *token == "win" {
      quest.must_win = true;
    } else if let Some(raw) = token.strip_prefix("q=") {
      quest.quest_score = raw
        .parse::<u32>()
        .map_err(|_| Error::Usage(format!("Expect a number in quest \"{}\"", spec)))?;
    } else if let Some(raw) = token.strip_prefix("w=") {
      quest.win_score = raw
        .parse::<u32>()
        .map_err(|_| Error::Usage(format!("Expect a number in quest \"{}\"", spec)))?;
    } else {
      return Err(Error::Usage(format!("Cannot recognize {} in quest \"{}\"", token, spec)));
    }
  }
  Ok(quest)
}

fn parse_card_list(catalog: &Catalog, list: &str, what: &str) -> Result<Vec<CardId>, Error> {
  let mut ids = Vec::new();
  for name in list.split(',') {
    let name = name.trim();
    if name.is_empty() {
      continue;
    }
    let card = catalog
      .resolve_name(name)
      .ok_or_else(|| Error::Usage(format!("Unknown card \"{}\" in {}", name, what)))?;
    ids.push(card.id);
  }
  Ok(ids)
}

fn print_results(
  results: &EvaluatedResults,
  factors: &[f64],
  params: &ScoreParams,
  show_ci: bool,
) {
  let fin = compute_score(results, factors, params);
  let tally = |extract: fn(&warlord::score::BattleStats) -> u64| -> String {
    results
      .stats
      .iter()
      .map(|s| extract(s).to_string())
      .collect::<Vec<_>>()
      .join(" ")
  };
  println!(
    "win%: {:.4} ({} / {})",
    fin.wins * 100.0,
    tally(|s| s.wins),
    results.n_sims
  );
  println!(
    "stall%: {:.4} ({} / {})",
    fin.draws * 100.0,
    tally(|s| s.draws),
    results.n_sims
  );
  println!(
    "loss%: {:.4} ({} / {})",
    fin.losses * 100.0,
    tally(|s| s.losses),
    results.n_sims
  );
  println!(
    "score: {:.4} ({} / {})",
    fin.points,
    tally(|s| s.points),
    results.n_sims
  );
  if show_ci {
    println!("ci: {:.4} - {:.4}", fin.points_lower_bound, fin.points_upper_bound);
  }
}

fn print_climb_summary(result: &warlord::climb::ClimbResult, show_ci: bool) {
  println!(
    "Evaluated {} decks ({} + {} simulations).",
    result.num_evaluated_decks, result.simulations, result.skipped_simulations
  );
  if result.gap > 0 {
    println!("Requirement gap {} could not be closed.", result.gap);
  }
  if show_ci {
    println!(
      "ci: {:.4} - {:.4}",
      result.score.points_lower_bound, result.score.points_upper_bound
    );
  }
}

fn main() {
  let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .format_timestamp(None)
    .try_init();
  if let Err(error) = run() {
    eprintln!("Error: {}", error);
    process::exit(1);
  }
}

fn run() -> Result<(), Error> {
  let args: Vec<String> = env::args().collect();
  if args.len() <= 2 {
    usage();
    return Ok(());
  }

  let mut cfg = OptimizerConfig::default();
  let mut game_mode = GameMode::Fight;
  let mut mode_set = false;
  let mut turn_limit = 50u32;
  let mut your_strategy = DeckStrategy::Random;
  let mut enemy_strategy = DeckStrategy::Random;
  let mut keep_commander = false;
  let mut show_ci = false;
  let mut effects: Vec<String> = Vec::new();
  let mut quest_spec: Option<String> = None;
  let mut catalog_path = "data/cards.json".to_string();
  let mut decks_path: Option<String> = None;
  let mut owned_paths: Vec<String> = Vec::new();
  let mut allow_candidates: Option<String> = None;
  let mut disallow_candidates: Option<String> = None;
  let mut disallow_recipes: Option<String> = None;
  let mut operations: Vec<Operation> = Vec::new();
  let mut do_optimization = false;

  let mut index = 3;
  while index < args.len() {
    let arg = args[index].as_str();
    match arg {
      "fight" => game_mode = GameMode::Fight,
      "-s" | "surge" => game_mode = GameMode::Surge,
      "win" => {
        cfg.mode = OptimizationMode::Winrate;
        mode_set = true;
      }
      "defense" => {
        cfg.mode = OptimizationMode::Defense;
        mode_set = true;
      }
      "raid" => {
        cfg.mode = OptimizationMode::Raid;
        mode_set = true;
      }
      "campaign" => {
        game_mode = GameMode::Surge;
        cfg.mode = OptimizationMode::Campaign;
        mode_set = true;
      }
      "campaign-nosurge" => {
        game_mode = GameMode::Fight;
        cfg.mode = OptimizationMode::Campaign;
        mode_set = true;
      }
      "pvp" => {
        game_mode = GameMode::Fight;
        cfg.mode = OptimizationMode::Winrate;
        mode_set = true;
      }
      "pvp-defense" => {
        game_mode = GameMode::Surge;
        cfg.mode = OptimizationMode::Defense;
        mode_set = true;
      }
      "brawl" => {
        game_mode = GameMode::Surge;
        cfg.mode = OptimizationMode::Brawl;
        mode_set = true;
      }
      "brawl-defense" => {
        game_mode = GameMode::Fight;
        cfg.mode = OptimizationMode::BrawlDefense;
        mode_set = true;
      }
      "gw" => {
        game_mode = GameMode::Surge;
        cfg.mode = OptimizationMode::Winrate;
        mode_set = true;
      }
      "gw-defense" => {
        game_mode = GameMode::Fight;
        cfg.mode = OptimizationMode::Defense;
        mode_set = true;
      }
      "keep-commander" | "-c" => keep_commander = true,
      "effect" | "-e" => {
        effects.push(
          args
            .get(index + 1)
            .ok_or_else(|| Error::Usage("Expect an effect after -e".to_string()))?
            .clone(),
        );
        index += 1;
      }
      "freeze" | "-F" => {
        cfg.frozen_cards = parse_number(&args, index + 1, "-F")?;
        index += 1;
      }
      "-L" => {
        cfg.min_deck_len = parse_number(&args, index + 1, "-L")?;
        cfg.max_deck_len = parse_number(&args, index + 2, "-L")?;
        index += 2;
      }
      "-o-" => cfg.use_ownership = false,
      "-o" => owned_paths.push("data/ownedcards.txt".to_string()),
      "fund" => {
        cfg.budget = parse_number(&args, index + 1, "fund")?;
        index += 1;
      }
      "random" => your_strategy = DeckStrategy::Random,
      "-r" | "ordered" => your_strategy = DeckStrategy::Ordered,
      "exact-ordered" => your_strategy = DeckStrategy::ExactOrdered,
      "enemy:ordered" => enemy_strategy = DeckStrategy::Ordered,
      "enemy:exact-ordered" => enemy_strategy = DeckStrategy::ExactOrdered,
      "endgame" => {
        cfg.use_top_level_card = true;
        cfg.fused_card_level = parse_number(&args, index + 1, "endgame")?;
        index += 1;
      }
      "quest" => {
        quest_spec = Some(
          args
            .get(index + 1)
            .ok_or_else(|| Error::Usage("Expect a quest spec after quest".to_string()))?
            .clone(),
        );
        index += 1;
      }
      "threads" | "-t" => {
        cfg.num_workers = parse_number(&args, index + 1, "-t")?;
        index += 1;
      }
      "target" => {
        cfg.target_score = Some(parse_number(&args, index + 1, "target")?);
        index += 1;
      }
      "turnlimit" => {
        turn_limit = parse_number(&args, index + 1, "turnlimit")?;
        index += 1;
      }
      "mis" => {
        cfg.min_increment = parse_number(&args, index + 1, "mis")?;
        index += 1;
      }
      "cl" => {
        cfg.confidence_level = parse_number(&args, index + 1, "cl")?;
        index += 1;
      }
      "+ci" => show_ci = true,
      "+hm" => cfg.harmonic_mean = true,
      "seed" => {
        cfg.seed = parse_number(&args, index + 1, "seed")?;
        index += 1;
      }
      "allow-candidates" => {
        allow_candidates = args.get(index + 1).cloned();
        index += 1;
      }
      "disallow-candidates" => {
        disallow_candidates = args.get(index + 1).cloned();
        index += 1;
      }
      "disallow-recipes" => {
        disallow_recipes = args.get(index + 1).cloned();
        index += 1;
      }
      "catalog" => {
        catalog_path = args
          .get(index + 1)
          .ok_or_else(|| Error::Usage("Expect a file after catalog".to_string()))?
          .clone();
        index += 1;
      }
      "decks" => {
        decks_path = args.get(index + 1).cloned();
        index += 1;
      }
      "sim" => {
        let n: u64 = parse_number(&args, index + 1, "sim")?;
        if n < 10 {
          cfg.num_workers = 1;
        }
        operations.push(Operation::Simulate(n));
        index += 1;
      }
      "climb" => {
        let n: u64 = parse_number(&args, index + 1, "climb")?;
        if n < 10 {
          cfg.num_workers = 1;
        }
        operations.push(Operation::Climb(n, n));
        do_optimization = true;
        index += 1;
      }
      "climbex" => {
        let min: u64 = parse_number(&args, index + 1, "climbex")?;
        let max: u64 = parse_number(&args, index + 2, "climbex")?;
        if max < 10 {
          cfg.num_workers = 1;
        }
        operations.push(Operation::Climb(min, max));
        do_optimization = true;
        index += 2;
      }
      "reorder" => {
        let n: u64 = parse_number(&args, index + 1, "reorder")?;
        operations.push(Operation::Reorder(n));
        index += 1;
      }
      _ => {
        if let Some(path) = arg.strip_prefix("-o=") {
          owned_paths.push(path.to_string());
        } else {
          return Err(Error::Usage(format!("Unknown option {}", arg)));
        }
      }
    }
    index += 1;
  }

  // All external configuration is validated here, before any simulation.
  let mut catalog = if catalog_path.ends_with(".json") {
    Catalog::from_json_file(&catalog_path)?
  } else {
    Catalog::from_cache_file(&catalog_path)?
  };
  if let Some(list) = &disallow_recipes {
    let ids = parse_card_list(&catalog, list, "disallow-recipes")?;
    catalog.disallow_recipes(&ids);
  }
  let library = match &decks_path {
    Some(path) => DeckLibrary::from_str(&catalog, &std::fs::read_to_string(path)?)?,
    None => DeckLibrary::default(),
  };

  let mut your_deck = library.resolve(&catalog, &args[1])?;
  your_deck.strategy = your_strategy;
  if let Some(list) = &allow_candidates {
    for id in parse_card_list(&catalog, list, "allow-candidates")? {
      your_deck.allowed_candidates.insert(id);
    }
  }
  if let Some(list) = &disallow_candidates {
    for id in parse_card_list(&catalog, list, "disallow-candidates")? {
      your_deck.disallowed_candidates.insert(id);
    }
  }

  let mut enemy_decks: Vec<Deck> = Vec::new();
  let mut factors: Vec<f64> = Vec::new();
  for spec in args[2].split(';') {
    let spec = spec.trim();
    if spec.is_empty() {
      continue;
    }
    let (deck_spec, factor) = match spec.rfind(':') {
      Some(pos) => match spec[pos + 1..].parse::<f64>() {
        Ok(factor) => (&spec[..pos], factor),
        Err(_) => (spec, 1.0),
      },
      None => (spec, 1.0),
    };
    let mut deck = library.resolve(&catalog, deck_spec)?;
    deck.strategy = enemy_strategy;
    enemy_decks.push(deck);
    factors.push(factor);
  }
  if enemy_decks.is_empty() {
    return Err(Error::Usage("No defense deck given".to_string()));
  }

  let quest = match &quest_spec {
    Some(spec) => {
      let quest = parse_quest(&catalog, spec)?;
      cfg.mode = OptimizationMode::Quest;
      mode_set = true;
      quest
    }
    None => Quest::default(),
  };
  if !mode_set {
    cfg.mode = OptimizationMode::Winrate;
  }

  let mut requirement = Requirement::default();
  if keep_commander {
    requirement.require(your_deck.commander, 1);
  }
  for &slot in &your_deck.marks {
    if let Some(&id) = your_deck.cards.get(slot) {
      requirement.require(id, 1);
    }
  }

  let mut ledger = OwnedCards::new();
  if do_optimization && cfg.use_ownership {
    if owned_paths.is_empty() && Path::new("data/ownedcards.txt").exists() {
      owned_paths.push("data/ownedcards.txt".to_string());
    }
    for path in &owned_paths {
      let parsed = OwnedCards::from_str(&catalog, &std::fs::read_to_string(path)?)?;
      for (&id, &count) in parsed.iter() {
        ledger.add(id, count);
      }
    }
  }

  let mut battle_config = BattleConfig::new(game_mode);
  battle_config.turn_limit = turn_limit;
  for effect in &effects {
    battle_config.effects.push(parse_effect(effect)?);
  }

  let score_params = ScoreParams::new(cfg.mode, cfg.confidence_level, cfg.harmonic_mean, &quest);
  let catalog = Arc::new(catalog);

  info!("Your Deck: {}", your_deck.description(&catalog));
  for (deck, factor) in enemy_decks.iter().zip(factors.iter()) {
    info!("Enemy's Deck:{}: {}", factor, deck.description(&catalog));
  }

  let pool = SimulatorPool::new(
    cfg.num_workers,
    Arc::clone(&catalog),
    SkirmishSimulator::new(cfg.mode),
    enemy_decks,
    factors,
    battle_config,
    score_params,
    cfg.min_increment,
    cfg.seed,
  );

  for operation in operations {
    match operation {
      Operation::Simulate(n) => {
        let mut results = EvaluatedResults::zero(pool.num_defense_decks());
        pool.evaluate(&your_deck, n, &mut results);
        print_results(&results, pool.factors(), &score_params, show_ci);
      }
      Operation::Climb(min_iterations, total_iterations) => {
        let mut optimizer = Optimizer::new(
          &cfg,
          &catalog,
          &pool,
          ledger.clone(),
          requirement.clone(),
          quest.clone(),
        );
        let result = if your_deck.strategy == DeckStrategy::Random {
          optimizer.climb(min_iterations, total_iterations, &mut your_deck)
        } else {
          optimizer.climb_ordered(min_iterations, total_iterations, &mut your_deck)
        };
        println!(
          "Optimized Deck: {}",
          format_deck_inline(result.deck_cost, &result.score, &result.deck, &catalog, &cfg)
        );
        print_climb_summary(&result, show_ci);
      }
      Operation::Reorder(n) => {
        // Reordering is an ordered climb over the deck's own cards with
        // nothing to spend and the deck length pinned.
        let mut reorder_cfg = cfg.clone();
        reorder_cfg.budget = 0;
        reorder_cfg.use_ownership = true;
        if reorder_cfg.min_deck_len == 1 && reorder_cfg.max_deck_len == 10 {
          reorder_cfg.min_deck_len = your_deck.cards.len();
          reorder_cfg.max_deck_len = your_deck.cards.len();
        }
        your_deck.strategy = DeckStrategy::Ordered;
        let mut optimizer = Optimizer::new(
          &reorder_cfg,
          &catalog,
          &pool,
          OwnedCards::new(),
          requirement.clone(),
          quest.clone(),
        );
        let result = optimizer.climb_ordered(n, n, &mut your_deck);
        println!(
          "Optimized Deck: {}",
          format_deck_inline(
            result.deck_cost,
            &result.score,
            &result.deck,
            &catalog,
            &reorder_cfg
          )
        );
        print_climb_summary(&result, show_ci);
      }
    }
  }
  Ok(())
}
