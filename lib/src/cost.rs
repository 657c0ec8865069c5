//! # Deck cost resolver
//!
//! Decides the cheapest way to realize a card multiset from the owned-card
//! ledger, downgrading cards through their recipes when the requested form
//! is not owned. The acquisition budget only ever pays for upgrading
//! ownable base cards back up; it never buys cards with no ownable
//! decomposition.
use crate::card::CardId;
use crate::catalog::Catalog;
use crate::deck::Deck;
use crate::ledger::OwnedCards;
use std::collections::{HashMap, HashSet};

/// Immutable view of everything the resolver needs: the catalog for recipe
/// graphs, the ledger for inventory, and the resolution policy knobs.
pub struct CostModel<'a> {
  pub catalog: &'a Catalog,
  pub ledger: &'a OwnedCards,
  /// When false, every deck costs zero (ownership is not enforced)
  pub use_ownership: bool,
  /// Endgame fusion tier; > 0 turns on the unlimited base-card assumption
  pub endgame_level: u32,
}

impl<'a> CostModel<'a> {
  /// Accumulates `cards` into the requirement map `need` and greedily
  /// downgrades unmet cards through their recipes, returning the
  /// incremental build cost of the downgrades.
  ///
  /// The working set is an explicit stack with most-recently-added-first
  /// visitation; a card re-enters the stack whenever a later resolution
  /// raises its required quantity again. A zero budget disables downgrading
  /// entirely.
  pub fn required_before_upgrade<I>(
    &self,
    cards: I,
    need: &mut HashMap<CardId, u32>,
    budget: u32,
  ) -> u32
  where
    I: IntoIterator<Item = CardId>,
  {
    let mut stack: Vec<CardId> = Vec::new();
    let mut queued: HashSet<CardId> = HashSet::new();
    for id in cards {
      *need.entry(id).or_insert(0) += 1;
      if queued.insert(id) {
        stack.push(id);
      }
    }
    let mut cost = 0u32;
    while budget > 0 {
      let id = match stack.pop() {
        Some(id) => id,
        None => break,
      };
      queued.remove(&id);
      let card = self.catalog.card(id);
      let required = need.get(&id).copied().unwrap_or(0);
      let owned = self.ledger.owned(id);
      let endgame_unlimited = self.endgame_level > 0 && card.unlimited_under_endgame();
      if endgame_unlimited || (owned < required && card.has_recipe()) {
        let num_under = required.saturating_sub(owned);
        if num_under == 0 {
          continue;
        }
        need.insert(id, owned);
        cost = cost.saturating_add(num_under.saturating_mul(card.cost));
        for &(ingredient, quantity) in &card.recipe {
          *need.entry(ingredient).or_insert(0) += num_under * quantity;
          if queued.insert(ingredient) {
            stack.push(ingredient);
          }
        }
      }
    }
    cost
  }

  /// Resolves the full deck (commander plus cards) against the ledger.
  /// Returns `None` when even the fully downgraded deck exceeds the
  /// ledger, i.e. the deck cannot be realized at any price.
  pub fn deck_cost(&self, deck: &Deck, budget: u32) -> Option<u32> {
    if !self.use_ownership {
      return Some(0);
    }
    let mut need: HashMap<CardId, u32> = HashMap::new();
    let mut cost = self.required_before_upgrade(Some(deck.commander), &mut need, budget);
    cost = cost.saturating_add(self.required_before_upgrade(
      deck.cards.iter().copied(),
      &mut need,
      budget,
    ));
    for (&id, &required) in &need {
      if required > self.ledger.owned(id) {
        return None;
      }
    }
    Some(cost)
  }
}

/// Grows the ledger until `card_list` (resolved through the same downgrade
/// search) is fully owned, warning once per shortfall. Used to force-claim
/// the starting deck before a run.
pub fn claim_cards(
  ledger: &mut OwnedCards,
  catalog: &Catalog,
  endgame_level: u32,
  budget: u32,
  card_list: &[CardId],
) {
  let mut need: HashMap<CardId, u32> = HashMap::new();
  {
    let model = CostModel {
      catalog,
      ledger,
      use_ownership: true,
      endgame_level,
    };
    model.required_before_upgrade(card_list.iter().copied(), &mut need, budget);
  }
  let mut shortfalls: Vec<(CardId, u32)> = need
    .into_iter()
    .filter_map(|(id, required)| {
      let claim = required.saturating_sub(ledger.owned(id));
      if claim > 0 {
        Some((id, claim))
      } else {
        None
      }
    })
    .collect();
  shortfalls.sort_unstable();
  for (id, claim) in shortfalls {
    warn!(
      "Need extra {} {} to build your initial deck: adding to owned card list.",
      claim,
      catalog.card(id).name
    );
    ledger.add(id, claim);
  }
}
