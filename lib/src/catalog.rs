//! # Card catalog
//!
//! The catalog is the read-only library of every card the optimizer may
//! reference. It is loaded once at startup, indexed, and then shared
//! (immutably) with the worker pool for the lifetime of a run.
use crate::card::{Card, CardId};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

#[derive(Debug)]
pub enum CatalogError {
  Io(std::io::Error),
  Json(serde_json::Error),
  Bincode(bincode::Error),
  DuplicateId(CardId),
  RecipeCycle(CardId),
}

impl fmt::Display for CatalogError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Io(e) => write!(f, "catalog io error: {}", e),
      Self::Json(e) => write!(f, "catalog json error: {}", e),
      Self::Bincode(e) => write!(f, "catalog cache error: {}", e),
      Self::DuplicateId(id) => write!(f, "duplicate card id {}", id),
      Self::RecipeCycle(id) => write!(f, "recipe cycle through card id {}", id),
    }
  }
}

impl std::error::Error for CatalogError {}

impl From<std::io::Error> for CatalogError {
  fn from(error: std::io::Error) -> Self {
    Self::Io(error)
  }
}

impl From<serde_json::Error> for CatalogError {
  fn from(error: serde_json::Error) -> Self {
    Self::Json(error)
  }
}

impl From<bincode::Error> for CatalogError {
  fn from(error: bincode::Error) -> Self {
    Self::Bincode(error)
  }
}

/// On-disk JSON shape: `{"cards": [...]}`
#[derive(Serialize, Deserialize)]
struct CatalogFile {
  cards: Vec<Card>,
}

/// A Catalog owns every card record and the lookup indexes over them.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
  cards: Vec<Card>,
  by_id: HashMap<CardId, usize>,
  by_name: HashMap<String, Vec<CardId>>,
  /// Commander candidates for the optimizer
  pub player_commanders: Vec<CardId>,
  /// Assault candidates for the optimizer
  pub player_assaults: Vec<CardId>,
  /// Structure candidates for the optimizer
  pub player_structures: Vec<CardId>,
}

impl Catalog {
  /// Builds a catalog from raw card records: indexes them, groups
  /// same-name upgrade lines, and resolves every card's top-level form.
  pub fn from_cards(cards: Vec<Card>) -> Result<Self, CatalogError> {
    let mut catalog = Catalog {
      cards,
      ..Catalog::default()
    };
    catalog.organize()?;
    Ok(catalog)
  }

  pub fn from_json_str(s: &str) -> Result<Self, CatalogError> {
    let file: CatalogFile = serde_json::from_str(s)?;
    Self::from_cards(file.cards)
  }

  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;
    Self::from_json_str(&contents)
  }

  /// Loads a catalog from the gzipped bincode cache format
  pub fn from_cache_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
    let mut raw = Vec::new();
    File::open(path)?.read_to_end(&mut raw)?;
    let mut gz = GzDecoder::new(&raw[..]);
    let mut buf: Vec<u8> = Vec::new();
    gz.read_to_end(&mut buf)?;
    let cards: Vec<Card> = bincode::deserialize(&buf)?;
    Self::from_cards(cards)
  }

  /// Writes the gzipped bincode cache next to a JSON catalog for faster
  /// subsequent startups
  pub fn write_cache_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CatalogError> {
    let buf = bincode::serialize(&self.cards)?;
    let file = File::create(path)?;
    let mut gz = GzEncoder::new(file, Compression::default());
    gz.write_all(&buf)?;
    gz.finish()?;
    Ok(())
  }

  /// Looks up a card by id
  pub fn get(&self, id: CardId) -> Option<&Card> {
    self.by_id.get(&id).map(|&idx| &self.cards[idx])
  }

  /// Looks up a card by id.
  ///
  /// Panics if the id is unknown; callers must only pass ids that came out
  /// of this catalog (deck parsing validates ids up front).
  pub fn card(&self, id: CardId) -> &Card {
    self
      .get(id)
      .unwrap_or_else(|| panic!("card id {} is not in the catalog", id))
  }

  /// Resolves a card name to a card.
  ///
  /// A plain name picks the most-upgraded form of that name. A `-N` suffix
  /// picks the N-th form (1-based) in upgrade order, so `"Ridge Sentry-1"`
  /// is the base version of the card.
  pub fn resolve_name(&self, spec: &str) -> Option<&Card> {
    let spec = spec.trim();
    let lookup = |name: &str| self.by_name.get(&name.to_lowercase());
    if let Some(ids) = lookup(spec) {
      return ids.last().map(|&id| self.card(id));
    }
    // "-N" level suffix
    if let Some(dash) = spec.rfind('-') {
      if let Ok(nth) = spec[dash + 1..].parse::<usize>() {
        if let Some(ids) = lookup(&spec[..dash]) {
          return ids.get(nth.saturating_sub(1)).map(|&id| self.card(id));
        }
      }
    }
    None
  }

  /// Erases the recipes of the given cards, removing them from all
  /// downgrade searches. Must be called before the catalog is shared with
  /// a worker pool.
  pub fn disallow_recipes(&mut self, ids: &[CardId]) {
    for &id in ids {
      if let Some(&idx) = self.by_id.get(&id) {
        self.cards[idx].recipe.clear();
      }
    }
  }

  pub fn len(&self) -> usize {
    self.cards.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cards.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Card> {
    self.cards.iter()
  }

  fn organize(&mut self) -> Result<(), CatalogError> {
    self.by_id.clear();
    self.by_name.clear();
    for (idx, card) in self.cards.iter().enumerate() {
      if self.by_id.insert(card.id, idx).is_some() {
        return Err(CatalogError::DuplicateId(card.id));
      }
      self
        .by_name
        .entry(card.name.to_lowercase())
        .or_insert_with(Vec::new)
        .push(card.id);
    }
    // Upgrade order within a name group: by fusion tier, then level
    let by_id = &self.by_id;
    let cards = &self.cards;
    for ids in self.by_name.values_mut() {
      ids.sort_by_key(|id| {
        let c = &cards[by_id[id]];
        (c.fusion_level, c.level, c.id)
      });
    }
    self.resolve_top_levels()?;
    self.player_commanders = self.pool(Card::is_commander);
    self.player_assaults = self.pool(Card::is_assault);
    self.player_structures = self.pool(Card::is_structure);
    Ok(())
  }

  fn pool(&self, pred: fn(&Card) -> bool) -> Vec<CardId> {
    let mut ids: Vec<CardId> = self.cards.iter().filter(|c| pred(c)).map(|c| c.id).collect();
    ids.sort_unstable();
    ids
  }

  /// A card's parent is the same-name card whose recipe consumes it; the
  /// top-level form is the root of that parent chain.
  fn resolve_top_levels(&mut self) -> Result<(), CatalogError> {
    let mut parent: HashMap<CardId, CardId> = HashMap::new();
    for card in &self.cards {
      for &(ingredient, _) in &card.recipe {
        let same_name = self
          .by_id
          .get(&ingredient)
          .map(|&idx| self.cards[idx].name == card.name)
          .unwrap_or(false);
        if same_name {
          parent.insert(ingredient, card.id);
        }
      }
    }
    let mut tops: Vec<(usize, CardId)> = Vec::with_capacity(self.cards.len());
    for (idx, card) in self.cards.iter().enumerate() {
      let mut top = card.id;
      let mut hops = 0;
      while let Some(&up) = parent.get(&top) {
        top = up;
        hops += 1;
        if hops > self.cards.len() {
          return Err(CatalogError::RecipeCycle(card.id));
        }
      }
      tops.push((idx, top));
    }
    for (idx, top) in tops {
      self.cards[idx].top_level_id = top;
    }
    Ok(())
  }
}
