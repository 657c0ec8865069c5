//! # Internal card representation
//!
use std::fmt;

/// Numeric card identifier, unique within a catalog
pub type CardId = u32;

/// Id of the base card set. Common and rare level-1 cards of this set are
/// treated as available in unlimited supply when an endgame fusion policy
/// is active.
pub const STANDARD_SET: u32 = 1000;

/// Card represents one immutable entry of the card catalog.
///
/// Cards are never mutated after the catalog is loaded; decks and the
/// optimizer refer to them by `CardId` only.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
  /// Catalog id
  pub id: CardId,
  /// Display name; cards that are upgrades of each other share a name
  pub name: String,
  /// The card type
  #[serde(rename = "type")]
  pub card_type: CardType,
  /// Card faction
  #[serde(default)]
  pub faction: Faction,
  /// Build cost paid when this card is assembled from its recipe ingredients
  #[serde(default)]
  pub cost: u32,
  /// Base damage dealt when this card strikes
  #[serde(default)]
  pub attack: u32,
  /// Hit points
  #[serde(default)]
  pub health: u32,
  /// Turns this card waits on the board before it may strike
  #[serde(default)]
  pub delay: u32,
  /// Upgrade level within a fusion tier, starting at 1
  #[serde(default = "default_level")]
  pub level: u32,
  /// Fusion tier, 0 for unfused cards
  #[serde(default)]
  pub fusion_level: u32,
  /// Rarity, 1 (common) through 6
  #[serde(default = "default_rarity")]
  pub rarity: u32,
  /// Release set id
  #[serde(default)]
  pub set: u32,
  /// Skills carried by the card; consumed by simulators and quest checks
  #[serde(default)]
  pub skills: Vec<Skill>,
  /// Id of the most-upgraded form of this card. Zero in catalog sources;
  /// patched by `Catalog::organize` by walking recipe edges upward.
  #[serde(default)]
  pub top_level_id: CardId,
  /// Downgrade decomposition: (ingredient card, quantity) pairs
  #[serde(default)]
  pub recipe: Vec<(CardId, u32)>,
}

/// Skill represents one skill line on a card. The optimizer core treats
/// skills as opaque data; simulators and quest constraints interpret them.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
  pub name: String,
  /// Skill magnitude, 0 if not applicable
  #[serde(default)]
  pub x: u32,
  /// Number of targets, 0 if not applicable
  #[serde(default)]
  pub n: u32,
  /// True if the skill affects all valid targets
  #[serde(default)]
  pub all: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
  Commander,
  Assault,
  Structure,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
  None,
  Vanguard,
  Corsair,
  Swarm,
  Synthetic,
  Zealot,
  Ancient,
}

fn default_level() -> u32 {
  1
}

fn default_rarity() -> u32 {
  1
}

impl Card {
  pub fn is_commander(&self) -> bool {
    self.card_type == CardType::Commander
  }

  pub fn is_assault(&self) -> bool {
    self.card_type == CardType::Assault
  }

  pub fn is_structure(&self) -> bool {
    self.card_type == CardType::Structure
  }

  /// True if the card has a downgrade decomposition
  pub fn has_recipe(&self) -> bool {
    !self.recipe.is_empty()
  }

  /// True for cards assumed to be in unlimited supply under the endgame
  /// fusion policy: common/rare level-1 cards of the base set.
  pub fn unlimited_under_endgame(&self) -> bool {
    self.set == STANDARD_SET && self.rarity <= 2 && self.level == 1
  }

  pub fn has_skill(&self, name: &str) -> bool {
    self.skills.iter().any(|s| s.name == name)
  }
}

impl Default for CardType {
  fn default() -> Self {
    Self::Assault
  }
}

impl Default for Faction {
  fn default() -> Self {
    Self::None
  }
}

impl fmt::Display for Card {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "[{}] {}", self.id, self.name)
  }
}

#[cfg(test)]
mod tests {
  use crate::card::*;

  #[test]
  fn card_json_defaults() {
    let card: Card =
      serde_json::from_str(r#"{"id": 7, "name": "Ridge Sentry", "type": "assault"}"#).unwrap();
    assert_eq!(card.id, 7);
    assert_eq!(card.card_type, CardType::Assault);
    assert_eq!(card.faction, Faction::None);
    assert_eq!(card.level, 1);
    assert_eq!(card.rarity, 1);
    assert_eq!(card.top_level_id, 0);
    assert!(card.recipe.is_empty());
  }

  #[test]
  fn unlimited_under_endgame_needs_base_set_and_low_rarity() {
    let mut card = Card {
      id: 1,
      name: "Scrap Drone".to_string(),
      set: STANDARD_SET,
      rarity: 2,
      level: 1,
      ..Card::default()
    };
    assert!(card.unlimited_under_endgame());
    card.rarity = 3;
    assert!(!card.unlimited_under_endgame());
    card.rarity = 2;
    card.level = 2;
    assert!(!card.unlimited_under_endgame());
    card.level = 1;
    card.set = 2000;
    assert!(!card.unlimited_under_endgame());
  }
}
