//! # Deck requirements and quest constraints
//!
//! A requirement is the dominating search objective: the optimizer never
//! trades an open requirement gap for raw score. The gap counts missing
//! must-keep cards plus the unmet potential of an active quest constraint.
use crate::card::{CardId, CardType, Faction};
use crate::catalog::Catalog;
use crate::deck::Deck;
use std::collections::HashMap;

/// Minimum required copies per card in the final deck
#[derive(Debug, Default, Clone)]
pub struct Requirement {
  pub num_cards: HashMap<CardId, u32>,
}

impl Requirement {
  pub fn require(&mut self, id: CardId, count: u32) {
    *self.num_cards.entry(id).or_insert(0) += count;
  }

  pub fn requires(&self, id: CardId) -> bool {
    self.num_cards.contains_key(&id)
  }

  pub fn is_empty(&self) -> bool {
    self.num_cards.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestType {
  None,
  /// Use a given skill; the deck must carry a card with the skill
  SkillUse(String),
  /// Deal damage with a given skill; same deck-side requirement
  SkillDamage(String),
  /// Play assault cards of a faction
  FactionAssaultCardUse(Faction),
  /// Play cards of a type
  TypeCardUse(CardType),
  /// Kill assault cards of a faction; satisfiable by any deck
  FactionAssaultCardKill(Faction),
  /// Kill cards of a type; satisfiable by any deck
  TypeCardKill(CardType),
  /// Keep a specific card alive
  CardSurvival(CardId),
}

impl Default for QuestType {
  fn default() -> Self {
    Self::None
  }
}

/// An optional quest constraint layered onto the optimization run. The
/// quest's score contribution is produced by the simulator; the optimizer
/// only tracks whether the deck can satisfy the quest at all.
#[derive(Debug, Clone)]
pub struct Quest {
  pub quest_type: QuestType,
  /// Target progress count (e.g. "use the skill 5 times")
  pub quest_value: u32,
  /// Score awarded for full quest progress
  pub quest_score: u32,
  /// Score awarded for winning the battle
  pub win_score: u32,
  /// Every point of progress must be reached, not just one
  pub must_fulfill: bool,
  /// Quest progress only counts in won battles
  pub must_win: bool,
}

impl Default for Quest {
  fn default() -> Self {
    Quest {
      quest_type: QuestType::None,
      quest_value: 0,
      quest_score: 0,
      win_score: 100,
      must_fulfill: false,
      must_win: false,
    }
  }
}

impl Quest {
  pub fn is_active(&self) -> bool {
    self.quest_type != QuestType::None
  }

  /// Upper bound on one battle's score while this quest is active
  pub fn max_possible_score(&self) -> f64 {
    (self.quest_score + self.win_score) as f64
  }
}

/// Computes the requirement gap of `deck`: the number of missing must-keep
/// copies plus the unmet quest potential. Zero means every constraint can
/// be satisfied by this deck.
pub fn check_requirement(
  deck: &Deck,
  requirement: &Requirement,
  quest: &Quest,
  catalog: &Catalog,
) -> u32 {
  let mut gap = 0;
  if !requirement.num_cards.is_empty() {
    let mut num_cards: HashMap<CardId, u32> = HashMap::new();
    num_cards.insert(deck.commander, 1);
    for &id in &deck.cards {
      *num_cards.entry(id).or_insert(0) += 1;
    }
    for (&id, &required) in &requirement.num_cards {
      let present = num_cards.get(&id).copied().unwrap_or(0);
      gap += required.saturating_sub(present);
    }
  }
  if quest.is_active() {
    let mut potential = 0u32;
    match &quest.quest_type {
      QuestType::SkillUse(skill) | QuestType::SkillDamage(skill) => {
        if catalog.card(deck.commander).has_skill(skill) {
          potential = quest.quest_value;
        }
      }
      QuestType::FactionAssaultCardKill(_) | QuestType::TypeCardKill(_) => {
        potential = quest.quest_value;
      }
      _ => {}
    }
    let threshold = if quest.must_fulfill { quest.quest_value } else { 1 };
    for &id in &deck.cards {
      if potential >= threshold {
        break;
      }
      let card = catalog.card(id);
      match &quest.quest_type {
        QuestType::SkillUse(skill) | QuestType::SkillDamage(skill) => {
          if card.has_skill(skill) {
            potential = quest.quest_value;
          }
        }
        QuestType::FactionAssaultCardUse(faction) => {
          if card.faction == *faction && card.is_assault() {
            potential += 1;
          }
        }
        QuestType::TypeCardUse(card_type) => {
          if card.card_type == *card_type {
            potential += 1;
          }
        }
        _ => {}
      }
    }
    gap += threshold.saturating_sub(potential);
  }
  gap
}

#[cfg(test)]
mod tests {
  use crate::card::*;
  use crate::catalog::Catalog;
  use crate::deck::Deck;
  use crate::requirement::*;

  fn catalog() -> Catalog {
    Catalog::from_cards(vec![
      Card {
        id: 10,
        name: "Warlord Kest".to_string(),
        card_type: CardType::Commander,
        ..Card::default()
      },
      Card {
        id: 1,
        name: "Ridge Sentry".to_string(),
        faction: Faction::Vanguard,
        ..Card::default()
      },
      Card {
        id: 2,
        name: "Ember Witch".to_string(),
        faction: Faction::Corsair,
        skills: vec![Skill {
          name: "scorch".to_string(),
          x: 2,
          ..Skill::default()
        }],
        ..Card::default()
      },
    ])
    .unwrap()
  }

  #[test]
  fn gap_counts_missing_required_copies() {
    let catalog = catalog();
    let mut requirement = Requirement::default();
    requirement.require(1, 2);
    let quest = Quest::default();
    let deck = Deck::new(10, vec![1]);
    assert_eq!(check_requirement(&deck, &requirement, &quest, &catalog), 1);
    let deck = Deck::new(10, vec![1, 1]);
    assert_eq!(check_requirement(&deck, &requirement, &quest, &catalog), 0);
  }

  #[test]
  fn commander_counts_as_one_copy() {
    let catalog = catalog();
    let mut requirement = Requirement::default();
    requirement.require(10, 1);
    let quest = Quest::default();
    let deck = Deck::new(10, vec![]);
    assert_eq!(check_requirement(&deck, &requirement, &quest, &catalog), 0);
  }

  #[test]
  fn skill_use_quest_needs_a_carrier() {
    let catalog = catalog();
    let requirement = Requirement::default();
    let quest = Quest {
      quest_type: QuestType::SkillUse("scorch".to_string()),
      quest_value: 5,
      quest_score: 5,
      ..Quest::default()
    };
    let without = Deck::new(10, vec![1, 1]);
    assert_eq!(check_requirement(&without, &requirement, &quest, &catalog), 1);
    let with = Deck::new(10, vec![1, 2]);
    assert_eq!(check_requirement(&with, &requirement, &quest, &catalog), 0);
  }

  #[test]
  fn faction_use_quest_with_must_fulfill_counts_cards() {
    let catalog = catalog();
    let requirement = Requirement::default();
    let quest = Quest {
      quest_type: QuestType::FactionAssaultCardUse(Faction::Vanguard),
      quest_value: 3,
      quest_score: 100,
      must_fulfill: true,
      ..Quest::default()
    };
    let deck = Deck::new(10, vec![1, 2]);
    assert_eq!(check_requirement(&deck, &requirement, &quest, &catalog), 2);
    let deck = Deck::new(10, vec![1, 1, 1]);
    assert_eq!(check_requirement(&deck, &requirement, &quest, &catalog), 0);
  }

  #[test]
  fn kill_quests_are_always_satisfiable() {
    let catalog = catalog();
    let requirement = Requirement::default();
    let quest = Quest {
      quest_type: QuestType::TypeCardKill(CardType::Assault),
      quest_value: 4,
      quest_score: 100,
      ..Quest::default()
    };
    let deck = Deck::new(10, vec![]);
    assert_eq!(check_requirement(&deck, &requirement, &quest, &catalog), 0);
  }
}
