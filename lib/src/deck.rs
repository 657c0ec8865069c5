//! # Deck model and deck list codec
//!
use crate::card::{CardId, CardType};
use crate::catalog::Catalog;
use regex::Regex;
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub struct DeckError(pub String);

impl std::fmt::Display for DeckError {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl std::error::Error for DeckError {}

/// How the card sequence is consumed during a battle
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckStrategy {
  /// Cards are drawn in random order; the sequence is a multiset
  Random,
  /// Cards are drawn in list order through the normal draw rules
  Ordered,
  /// Cards are played exactly in list order
  ExactOrdered,
}

impl Default for DeckStrategy {
  fn default() -> Self {
    Self::Random
  }
}

impl DeckStrategy {
  pub fn is_ordered(self) -> bool {
    self != Self::Random
  }
}

/// Deck is the unit the optimizer mutates: a commander plus a card
/// sequence. Cloning a deck yields fully independent storage; the worker
/// pool clones one per worker before every task.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Deck {
  pub commander: CardId,
  pub cards: Vec<CardId>,
  pub strategy: DeckStrategy,
  /// Card ids the mutator may introduce even when a fusion policy would
  /// otherwise filter them out
  #[serde(default)]
  pub allowed_candidates: HashSet<CardId>,
  /// Card ids the mutator must never introduce
  #[serde(default)]
  pub disallowed_candidates: HashSet<CardId>,
  /// Slots marked `!` (must keep) in the source deck list
  #[serde(default)]
  pub marks: HashSet<usize>,
}

impl Deck {
  pub fn new(commander: CardId, cards: Vec<CardId>) -> Self {
    Deck {
      commander,
      cards,
      ..Deck::default()
    }
  }

  /// Parses a deck list of the form
  /// `"Commander, Card #2, Other Card!, [17]"`.
  ///
  /// Components are card names (optionally with a `-N` level suffix) or
  /// bracketed ids; `#N` repeats a card and `!` marks its slots as
  /// must-keep. The first component must be a commander, the rest must not.
  pub fn from_list(catalog: &Catalog, list: &str) -> Result<Self, DeckError> {
    lazy_static! {
      static ref COMPONENT_REGEX: Regex =
        Regex::new(r"^(?P<name>\[\d+\]|[^#!]+?)\s*(?:#\s*(?P<count>\d+))?\s*(?P<mark>!)?$")
          .expect("Failed to compile COMPONENT_REGEX regex");
    }
    let mut deck = Deck::default();
    let mut first = true;
    for component in list.split(',') {
      let component = component.trim();
      if component.is_empty() {
        continue;
      }
      let caps = COMPONENT_REGEX
        .captures(component)
        .ok_or_else(|| DeckError(format!("Cannot parse deck component: {}", component)))?;
      let name = caps["name"].trim();
      let count = caps
        .name("count")
        .map(|m| m.as_str().parse::<usize>().unwrap_or(1))
        .unwrap_or(1);
      let marked = caps.name("mark").is_some();
      let card = if name.starts_with('[') {
        let id = name[1..name.len() - 1]
          .parse::<CardId>()
          .map_err(|_| DeckError(format!("Bad card id: {}", name)))?;
        catalog
          .get(id)
          .ok_or_else(|| DeckError(format!("Unknown card id: {}", id)))?
      } else {
        catalog
          .resolve_name(name)
          .ok_or_else(|| DeckError(format!("Unknown card: {}", name)))?
      };
      if first {
        if card.card_type != CardType::Commander {
          return Err(DeckError(format!("{} is not a commander", card.name)));
        }
        deck.commander = card.id;
        first = false;
      } else {
        if card.card_type == CardType::Commander {
          return Err(DeckError(format!("{} is a commander, not a deck card", card.name)));
        }
        for _ in 0..count {
          if marked {
            deck.marks.insert(deck.cards.len());
          }
          deck.cards.push(card.id);
        }
      }
    }
    if first {
      return Err(DeckError(format!("Empty deck list: {}", list)));
    }
    Ok(deck)
  }

  /// Canonical hash of the deck composition, the memoization key for
  /// evaluated results. Random-strategy decks hash as a multiset: the card
  /// sequence is sorted first, so reorderings of the same composition
  /// share one key. Ordered strategies preserve the sequence.
  pub fn hash(&self) -> String {
    let mut ids = self.cards.clone();
    if self.strategy == DeckStrategy::Random {
      ids.sort_unstable();
    }
    let mut out = self.commander.to_string();
    for id in ids {
      out.push(',');
      out.push_str(&id.to_string());
    }
    out
  }

  /// Drops cards beyond `max_len`
  pub fn shrink(&mut self, max_len: usize) {
    self.cards.truncate(max_len);
  }

  /// Human-readable composition: commander followed by grouped card names
  pub fn description(&self, catalog: &Catalog) -> String {
    let mut out = catalog.card(self.commander).name.clone();
    let mut ids = self.cards.clone();
    if self.strategy == DeckStrategy::Random {
      ids.sort_unstable();
    }
    let mut last_name = String::new();
    let mut num_repeat = 0;
    for id in &ids {
      let name = &catalog.card(*id).name;
      if *name == last_name {
        num_repeat += 1;
      } else {
        if num_repeat > 1 {
          out.push_str(&format!(" #{}", num_repeat));
        }
        out.push_str(", ");
        out.push_str(name);
        last_name = name.clone();
        num_repeat = 1;
      }
    }
    if num_repeat > 1 {
      out.push_str(&format!(" #{}", num_repeat));
    }
    out
  }
}

/// A named collection of decks parsed from a custom-decks file with
/// `Name: deck list` lines
#[derive(Debug, Default)]
pub struct DeckLibrary {
  pub decks: HashMap<String, Deck>,
}

impl DeckLibrary {
  pub fn from_str(catalog: &Catalog, contents: &str) -> Result<Self, DeckError> {
    let mut library = DeckLibrary::default();
    for line in contents.lines() {
      let trimmed = line.trim();
      if trimmed.is_empty() || trimmed.starts_with("//") {
        continue;
      }
      let colon = trimmed
        .find(':')
        .ok_or_else(|| DeckError(format!("Expected `Name: deck list` line: {}", line)))?;
      let name = trimmed[..colon].trim().to_string();
      let deck = Deck::from_list(catalog, &trimmed[colon + 1..])?;
      library.decks.insert(name.to_lowercase(), deck);
    }
    Ok(library)
  }

  pub fn get(&self, name: &str) -> Option<&Deck> {
    self.decks.get(&name.to_lowercase())
  }

  /// Resolves a deck reference: a library name first, then an inline list
  pub fn resolve(&self, catalog: &Catalog, spec: &str) -> Result<Deck, DeckError> {
    if let Some(deck) = self.get(spec.trim()) {
      return Ok(deck.clone());
    }
    Deck::from_list(catalog, spec)
  }
}
