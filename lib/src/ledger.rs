//! # Owned-card ledger
//!
//! Tracks how many copies of each card the player owns. The ledger is the
//! resolver's inventory constraint: it is filled before an optimization run
//! starts (file load plus forced claims for the starting deck) and treated
//! as read-only for the rest of the run.
use crate::card::CardId;
use crate::catalog::Catalog;
use crate::deck::DeckError;
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct OwnedCards {
  counts: HashMap<CardId, u32>,
}

impl OwnedCards {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parses an owned-cards list with `N Card Name` lines. Later lines for
  /// the same card accumulate.
  pub fn from_str(catalog: &Catalog, contents: &str) -> Result<Self, DeckError> {
    lazy_static! {
      static ref OWNED_LINE_REGEX: Regex = Regex::new(r"^\s*(?P<count>\d+)\s+(?P<name>.+?)\s*$")
        .expect("Failed to compile OWNED_LINE_REGEX regex");
    }
    let mut ledger = OwnedCards::new();
    for line in contents.lines() {
      let trimmed = line.trim();
      if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('#') {
        continue;
      }
      let caps = OWNED_LINE_REGEX
        .captures(trimmed)
        .ok_or_else(|| DeckError(format!("Cannot parse owned-cards line: {}", line)))?;
      let count = caps["count"]
        .parse::<u32>()
        .map_err(|_| DeckError(format!("Bad count in owned-cards line: {}", line)))?;
      let card = catalog
        .resolve_name(&caps["name"])
        .ok_or_else(|| DeckError(format!("Unknown card in owned-cards line: {}", line)))?;
      ledger.add(card.id, count);
    }
    Ok(ledger)
  }

  pub fn owned(&self, id: CardId) -> u32 {
    self.counts.get(&id).copied().unwrap_or(0)
  }

  pub fn add(&mut self, id: CardId, count: u32) {
    *self.counts.entry(id).or_insert(0) += count;
  }

  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&CardId, &u32)> {
    self.counts.iter()
  }
}

#[cfg(test)]
mod tests {
  use crate::card::*;
  use crate::catalog::Catalog;
  use crate::ledger::*;

  fn catalog() -> Catalog {
    Catalog::from_cards(vec![
      Card {
        id: 1,
        name: "Ridge Sentry".to_string(),
        ..Card::default()
      },
      Card {
        id: 2,
        name: "Bastion Gate".to_string(),
        card_type: CardType::Structure,
        ..Card::default()
      },
    ])
    .unwrap()
  }

  #[test]
  fn parse_owned_lines() {
    let catalog = catalog();
    let ledger = OwnedCards::from_str(
      &catalog,
      "# my cards\n3 Ridge Sentry\n1 Bastion Gate\n2 Ridge Sentry\n",
    )
    .unwrap();
    assert_eq!(ledger.owned(1), 5);
    assert_eq!(ledger.owned(2), 1);
    assert_eq!(ledger.owned(99), 0);
  }

  #[test]
  fn parse_rejects_unknown_cards() {
    let catalog = catalog();
    assert!(OwnedCards::from_str(&catalog, "2 Phantom Card\n").is_err());
  }
}
